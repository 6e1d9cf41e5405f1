//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::assistant::{AssistantClient, AssistantError};
use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::services::CheckoutService;
use crate::square::{SquareClient, SquareError};

/// Error building shared clients at startup.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("square client: {0}")]
    Square(#[from] SquareError),
    #[error("assistant client: {0}")]
    Assistant(#[from] AssistantError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: Catalog,
    square: SquareClient,
    assistant: Option<AssistantClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Square or assistant client can't be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let square = SquareClient::new(&config.square)?;
        let assistant = config
            .assistant
            .as_ref()
            .map(AssistantClient::new)
            .transpose()?;
        let catalog = Catalog::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                square,
                assistant,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached catalog reads.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn square(&self) -> &SquareClient {
        &self.inner.square
    }

    /// The shopping assistant, if an API key is configured.
    #[must_use]
    pub fn assistant(&self) -> Option<&AssistantClient> {
        self.inner.assistant.as_ref()
    }

    /// Checkout service bound to this state's pool and Square client.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.inner.pool, &self.inner.square)
    }
}
