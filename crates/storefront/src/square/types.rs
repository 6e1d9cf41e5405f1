//! Request and response shapes for the Square REST endpoints we call.
//!
//! Only the fields the checkout flow reads are modelled; Square adds fields
//! freely, so nothing here uses `deny_unknown_fields`.

use serde::{Deserialize, Serialize};

/// Amount in the currency's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareMoney {
    pub amount: i64,
    pub currency: String,
}

// =============================================================================
// Payment links
// =============================================================================

/// Body of `POST /v2/online-checkout/payment-links`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentLinkRequest {
    pub idempotency_key: String,
    pub order: NewSquareOrder,
    pub checkout_options: CheckoutOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_populated_data: Option<PrePopulatedData>,
}

/// Order created together with the payment link.
#[derive(Debug, Clone, Serialize)]
pub struct NewSquareOrder {
    pub location_id: String,
    /// Our order ID, echoed back on the Square order.
    pub reference_id: String,
    pub line_items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLineItem {
    pub name: String,
    /// Square takes quantities as decimal strings.
    pub quantity: String,
    pub base_price_money: SquareMoney,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOptions {
    pub redirect_url: String,
    pub ask_for_shipping_address: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrePopulatedData {
    pub buyer_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentLinkResponse {
    pub payment_link: PaymentLink,
}

/// A hosted checkout page.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub order_id: String,
    pub url: String,
    #[serde(default)]
    pub long_url: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveOrderResponse {
    pub order: SquareOrder,
}

/// Square order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SquareOrderState {
    Open,
    Completed,
    Canceled,
    Draft,
    #[serde(other)]
    Unknown,
}

/// An order as reported by Square.
#[derive(Debug, Clone, Deserialize)]
pub struct SquareOrder {
    pub id: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub state: SquareOrderState,
    pub total_money: SquareMoney,
    #[serde(default)]
    pub net_amount_due_money: Option<SquareMoney>,
    #[serde(default)]
    pub tenders: Vec<Tender>,
}

impl SquareOrder {
    /// Whether the buyer has paid for this order in full.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        if self.state == SquareOrderState::Completed {
            return true;
        }
        let nothing_due = self
            .net_amount_due_money
            .as_ref()
            .is_some_and(|due| due.amount == 0);
        !self.tenders.is_empty() && nothing_due
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tender {
    pub id: String,
    #[serde(rename = "type", default)]
    pub tender_type: Option<String>,
    #[serde(default)]
    pub amount_money: Option<SquareMoney>,
}

// =============================================================================
// Webhooks
// =============================================================================

/// Envelope of a webhook notification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub object: serde_json::Value,
}

/// The `payment` object inside payment webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub status: String,
}

impl WebhookEvent {
    /// The completed payment's Square order ID, if this event reports one.
    #[must_use]
    pub fn completed_payment_order_id(&self) -> Option<String> {
        if !matches!(self.event_type.as_str(), "payment.created" | "payment.updated") {
            return None;
        }
        let payment: WebhookPayment =
            serde_json::from_value(self.data.object.get("payment")?.clone()).ok()?;
        if payment.status != "COMPLETED" {
            return None;
        }
        payment.order_id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(json: &str) -> SquareOrder {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_open_order_with_tender_and_nothing_due_is_paid() {
        let o = order(
            r#"{
                "id": "sq-1",
                "state": "OPEN",
                "total_money": {"amount": 5655, "currency": "USD"},
                "net_amount_due_money": {"amount": 0, "currency": "USD"},
                "tenders": [{"id": "t-1", "type": "CARD", "amount_money": {"amount": 5655, "currency": "USD"}}]
            }"#,
        );
        assert!(o.is_paid());
    }

    #[test]
    fn test_open_order_without_tender_is_unpaid() {
        let o = order(
            r#"{
                "id": "sq-2",
                "state": "OPEN",
                "total_money": {"amount": 5655, "currency": "USD"},
                "net_amount_due_money": {"amount": 5655, "currency": "USD"}
            }"#,
        );
        assert!(!o.is_paid());
    }

    #[test]
    fn test_completed_order_is_paid() {
        let o = order(
            r#"{"id": "sq-3", "state": "COMPLETED", "total_money": {"amount": 100, "currency": "USD"}}"#,
        );
        assert!(o.is_paid());
    }

    #[test]
    fn test_unknown_state_tolerated() {
        let o = order(
            r#"{"id": "sq-4", "state": "SOMETHING_NEW", "total_money": {"amount": 1, "currency": "USD"}}"#,
        );
        assert_eq!(o.state, SquareOrderState::Unknown);
        assert!(!o.is_paid());
    }

    #[test]
    fn test_webhook_completed_payment() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "merchant_id": "M1",
                "type": "payment.updated",
                "event_id": "e-1",
                "data": {
                    "type": "payment",
                    "id": "p-1",
                    "object": {"payment": {"id": "p-1", "order_id": "sq-9", "status": "COMPLETED"}}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(event.completed_payment_order_id().as_deref(), Some("sq-9"));
    }

    #[test]
    fn test_webhook_ignores_pending_and_other_events() {
        let pending: WebhookEvent = serde_json::from_str(
            r#"{"type": "payment.created", "data": {"object": {"payment": {"id": "p", "order_id": "o", "status": "APPROVED"}}}}"#,
        )
        .unwrap();
        assert!(pending.completed_payment_order_id().is_none());

        let refund: WebhookEvent = serde_json::from_str(
            r#"{"type": "refund.created", "data": {"object": {}}}"#,
        )
        .unwrap();
        assert!(refund.completed_payment_order_id().is_none());
    }

    #[test]
    fn test_payment_link_request_shape() {
        let request = CreatePaymentLinkRequest {
            idempotency_key: "3f1c".to_string(),
            order: NewSquareOrder {
                location_id: "L1".to_string(),
                reference_id: "3f1c".to_string(),
                line_items: vec![NewLineItem {
                    name: "Marina One-Piece".to_string(),
                    quantity: "2".to_string(),
                    base_price_money: SquareMoney {
                        amount: 8800,
                        currency: "USD".to_string(),
                    },
                    note: Some("Size M".to_string()),
                }],
            },
            checkout_options: CheckoutOptions {
                redirect_url: "https://riptideswim.com/checkout/complete?order_id=3f1c".to_string(),
                ask_for_shipping_address: false,
            },
            pre_populated_data: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["order"]["line_items"][0]["quantity"], "2");
        assert_eq!(json["order"]["line_items"][0]["base_price_money"]["amount"], 8800);
        assert!(json.get("pre_populated_data").is_none());
    }
}
