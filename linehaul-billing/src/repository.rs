use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::manager::BillingError;
use crate::models::{
    AdditionalCharge, BillRunSummary, BillingException, BillingQueueRow, CustomerContact,
};

/// Persistence seam for the billing workflow. Backends wrap a billing
/// manager together with its dispatch manager and scope each operation as
/// one transaction.
#[async_trait]
pub trait BillingRepository: Send + Sync {
    async fn transfer_orders(&self) -> Result<Vec<String>, BillingError>;

    async fn bill_orders(&self) -> Result<BillRunSummary, BillingError>;

    async fn re_bill_order(&self, order_ref: &str) -> Result<BillingQueueRow, BillingError>;

    async fn add_additional_charge(
        &self,
        order_id: Uuid,
        description: &str,
        unit_amount: Decimal,
        units: u32,
    ) -> Result<AdditionalCharge, BillingError>;

    async fn set_billing_profile(
        &self,
        customer_id: Uuid,
        required_documents: Vec<String>,
    ) -> Result<(), BillingError>;

    async fn add_billing_contact(
        &self,
        customer_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<CustomerContact, BillingError>;

    async fn exceptions_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<BillingException>, BillingError>;
}
