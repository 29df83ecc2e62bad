use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillType {
    Invoice,
    Credit,
    Debit,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingExceptionType {
    Paperwork,
    Charge,
    Credit,
    Other,
}

/// A row in the billing queue. The charge figures are copied from the order
/// at transfer time so the queue reflects what dispatch handed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingQueueRow {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Human-facing order reference ("S1", ...).
    pub order_ref: String,
    pub customer_id: Uuid,
    pub bill_type: BillType,
    pub sub_total: Option<Decimal>,
    pub freight_charge_amount: Option<Decimal>,
    pub other_charge_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Permanent record of a completed bill, named after the run that produced
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingHistory {
    pub id: Uuid,
    /// Bill run batch name ("B1", ...).
    pub batch_name: String,
    pub order_id: Uuid,
    pub order_ref: String,
    pub customer_id: Uuid,
    pub bill_type: BillType,
    pub sub_total: Option<Decimal>,
    pub billed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingException {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_ref: String,
    pub exception_type: BillingExceptionType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Per-customer billing requirements: the paperwork classes an order must
/// carry before it can be billed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerBillingProfile {
    pub customer_id: Uuid,
    pub required_documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub email: String,
    pub is_billing: bool,
}

/// An accessorial charge applied to an order after rating. The total is the
/// per-unit amount times the unit count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub id: Uuid,
    pub order_id: Uuid,
    pub description: String,
    pub unit_amount: Decimal,
    pub units: u32,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one bill run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillRunSummary {
    /// Batch name minted for this run, present only when something billed.
    pub batch_name: Option<String>,
    /// Order references billed in this run.
    pub billed: Vec<String>,
    /// Order references held back with at least one new exception.
    pub held: Vec<String>,
    /// Order references skipped because no billing profile or contact was on
    /// file.
    pub skipped: Vec<String>,
}

/// An invoice notification owed for a billed order. Delivery happens after
/// the billing state change commits; it is never part of the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceNotice {
    pub order_ref: String,
    pub contact_email: String,
}

/// A completed bill run: the summary plus the notifications the caller owes.
#[derive(Debug, Clone)]
pub struct BillRun {
    pub summary: BillRunSummary,
    pub notices: Vec<InvoiceNotice>,
}
