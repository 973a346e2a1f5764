use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct PurchaseWebhook {
    #[serde(alias = "customer_email", alias = "buyer_email")]
    pub(crate) email: String,
    #[serde(default, alias = "name", alias = "customer_name")]
    pub(crate) full_name: Option<String>,
    #[serde(default, alias = "product_name")]
    pub(crate) product: Option<String>,
    #[serde(default, alias = "transaction", alias = "order_id")]
    pub(crate) transaction_id: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PurchaseWebhookResponse {
    pub(crate) email: String,
    /// `activated`, `deactivated` or `ignored`.
    pub(crate) action: &'static str,
    pub(crate) is_active: Option<bool>,
}
