//! Shopper session extractor.
//!
//! Wraps the tower-sessions `Session` with typed access to the cart,
//! wishlist, visitor token, and pending order.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use riptide_core::OrderId;

use crate::models::{PendingOrder, SessionCart, Wishlist, session_keys};

type SessionResult<T> = Result<T, tower_sessions::session::Error>;

/// The current shopper's session.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(shopper: Shopper) -> Result<Json<SessionCart>> {
///     Ok(Json(shopper.cart().await?))
/// }
/// ```
#[derive(Clone)]
pub struct Shopper(pub Session);

/// Rejection when the session layer is missing from the stack.
pub struct MissingSession;

impl IntoResponse for MissingSession {
    fn into_response(self) -> Response {
        tracing::error!("Session layer missing for shopper route");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<S> FromRequestParts<S> for Shopper
where
    S: Send + Sync,
{
    type Rejection = MissingSession;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(Self)
            .ok_or(MissingSession)
    }
}

impl Shopper {
    /// The cart, empty if none has been saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store can't be read.
    pub async fn cart(&self) -> SessionResult<SessionCart> {
        Ok(self
            .0
            .get::<SessionCart>(session_keys::CART)
            .await?
            .unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be written.
    pub async fn save_cart(&self, cart: &SessionCart) -> SessionResult<()> {
        self.0.insert(session_keys::CART, cart).await
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be written.
    pub async fn clear_cart(&self) -> SessionResult<()> {
        self.0.remove::<SessionCart>(session_keys::CART).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be read.
    pub async fn wishlist(&self) -> SessionResult<Wishlist> {
        Ok(self
            .0
            .get::<Wishlist>(session_keys::WISHLIST)
            .await?
            .unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be written.
    pub async fn save_wishlist(&self, wishlist: &Wishlist) -> SessionResult<()> {
        self.0.insert(session_keys::WISHLIST, wishlist).await
    }

    /// Anonymous token for this visitor, created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store can't be read or written.
    pub async fn visitor_id(&self) -> SessionResult<String> {
        if let Some(id) = self.0.get::<String>(session_keys::VISITOR_ID).await? {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.0.insert(session_keys::VISITOR_ID, &id).await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be read.
    pub async fn pending_order(&self) -> SessionResult<Option<OrderId>> {
        Ok(self
            .0
            .get::<PendingOrder>(session_keys::PENDING_ORDER)
            .await?
            .map(|p| p.order_id))
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be written.
    pub async fn set_pending_order(&self, order_id: OrderId) -> SessionResult<()> {
        self.0
            .insert(session_keys::PENDING_ORDER, PendingOrder { order_id })
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the session store can't be written.
    pub async fn clear_pending_order(&self) -> SessionResult<()> {
        self.0
            .remove::<PendingOrder>(session_keys::PENDING_ORDER)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use riptide_core::{ProductId, Size};
    use tower_sessions::MemoryStore;

    use super::*;

    fn shopper() -> Shopper {
        Shopper(Session::new(None, Arc::new(MemoryStore::default()), None))
    }

    #[tokio::test]
    async fn test_cart_defaults_to_empty_and_round_trips() {
        let shopper = shopper();
        assert!(shopper.cart().await.unwrap().is_empty());

        let mut cart = SessionCart::default();
        cart.add(ProductId::new(5), Size::parse("M").unwrap(), 2)
            .unwrap();
        shopper.save_cart(&cart).await.unwrap();
        assert_eq!(shopper.cart().await.unwrap(), cart);

        shopper.clear_cart().await.unwrap();
        assert!(shopper.cart().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_visitor_id_is_stable() {
        let shopper = shopper();
        let first = shopper.visitor_id().await.unwrap();
        let second = shopper.visitor_id().await.unwrap();
        assert_eq!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[tokio::test]
    async fn test_pending_order() {
        let shopper = shopper();
        assert!(shopper.pending_order().await.unwrap().is_none());

        let id = OrderId::generate();
        shopper.set_pending_order(id).await.unwrap();
        assert_eq!(shopper.pending_order().await.unwrap(), Some(id));

        shopper.clear_pending_order().await.unwrap();
        assert!(shopper.pending_order().await.unwrap().is_none());
    }
}
