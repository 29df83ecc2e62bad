use async_trait::async_trait;
use linehaul_core::notify::BillingNotifier;
use linehaul_core::CoreResult;

use crate::models::InvoiceNotice;

/// Deliver the notifications a bill run produced. Failures are logged and
/// swallowed; the bills they belong to already stand.
pub async fn send_invoices(notifier: &dyn BillingNotifier, notices: &[InvoiceNotice]) {
    for notice in notices {
        if let Err(err) = notifier
            .send_invoice(&notice.order_ref, &notice.contact_email)
            .await
        {
            tracing::warn!(order_ref = %notice.order_ref, error = %err,
                "invoice notification failed");
        }
    }
}

/// Notifier that records the invoice in the log stream instead of sending
/// anything. Useful as a default and for environments without an outbound
/// mail path.
pub struct LoggingNotifier;

#[async_trait]
impl BillingNotifier for LoggingNotifier {
    async fn send_invoice(&self, order_id: &str, contact_email: &str) -> CoreResult<()> {
        tracing::info!(order_id, contact_email, "invoice issued");
        Ok(())
    }
}
