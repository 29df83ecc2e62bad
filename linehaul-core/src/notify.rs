use crate::CoreResult;
use async_trait::async_trait;

/// Outbound notification seam for successful billing. Sending an invoice is a
/// side effect, not an invariant: implementations may fail without rolling
/// back the billing state change that triggered them.
#[async_trait]
pub trait BillingNotifier: Send + Sync {
    async fn send_invoice(&self, order_id: &str, contact_email: &str) -> CoreResult<()>;
}
