use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::bearer_token;
use crate::api::validation;
use crate::core::security::secrets_match;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::webhook::{PurchaseWebhook, PurchaseWebhookResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/purchase", post(purchase))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurchaseAction {
    Activate,
    Deactivate,
    Ignore,
}

impl PurchaseAction {
    /// A missing status is treated as an approved purchase.
    fn from_status(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return PurchaseAction::Activate;
        };
        match status.trim().to_lowercase().as_str() {
            "" | "approved" | "paid" | "complete" | "completed" => PurchaseAction::Activate,
            "refunded" | "chargeback" | "canceled" | "cancelled" => PurchaseAction::Deactivate,
            _ => PurchaseAction::Ignore,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            PurchaseAction::Activate => "activated",
            PurchaseAction::Deactivate => "deactivated",
            PurchaseAction::Ignore => "ignored",
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

async fn purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PurchaseWebhookResponse>, ApiError> {
    let expected = state.settings().webhook().purchase_token.as_str();
    if expected.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "Purchase webhook is not configured".to_string(),
        ));
    }
    let authorized = bearer_token(&headers).is_some_and(|token| secrets_match(token, expected));
    if !authorized {
        tracing::warn!("Rejected purchase webhook with invalid token");
        return Err(ApiError::Unauthorized("Invalid webhook token"));
    }

    let payload: PurchaseWebhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    let email = validation::normalize_email(&payload.email)?;
    let action = PurchaseAction::from_status(payload.status.as_deref());

    metrics::counter!("purchase_webhooks_total", "action" => action.as_str()).increment(1);

    let is_active = match action {
        PurchaseAction::Activate => true,
        PurchaseAction::Deactivate => false,
        PurchaseAction::Ignore => {
            tracing::info!(status = ?payload.status, "Ignoring purchase webhook status");
            return Ok(Json(PurchaseWebhookResponse { email, action: action.as_str(), is_active: None }));
        }
    };

    let purchaser = repositories::purchasers::upsert(
        state.db(),
        repositories::purchasers::UpsertPurchaser {
            email: &email,
            full_name: non_empty(&payload.full_name),
            product: non_empty(&payload.product),
            transaction_id: non_empty(&payload.transaction_id),
            is_active,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store purchase"))?;

    tracing::info!(action = action.as_str(), "Purchase webhook applied");

    Ok(Json(PurchaseWebhookResponse {
        email: purchaser.email,
        action: action.as_str(),
        is_active: Some(purchaser.is_active),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_actions() {
        for status in ["approved", "PAID", "complete", "Completed "] {
            assert_eq!(PurchaseAction::from_status(Some(status)), PurchaseAction::Activate);
        }
        for status in ["refunded", "chargeback", "canceled", "Cancelled"] {
            assert_eq!(PurchaseAction::from_status(Some(status)), PurchaseAction::Deactivate);
        }
        assert_eq!(PurchaseAction::from_status(None), PurchaseAction::Activate);
        assert_eq!(PurchaseAction::from_status(Some("waiting_payment")), PurchaseAction::Ignore);
    }

    #[test]
    fn optional_fields_ignore_blanks() {
        assert_eq!(non_empty(&Some("  ".to_string())), None);
        assert_eq!(non_empty(&Some(" Plano Anual ".to_string())), Some("Plano Anual"));
        assert_eq!(non_empty(&None), None);
    }
}
