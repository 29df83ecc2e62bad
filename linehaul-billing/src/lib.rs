pub mod manager;
pub mod models;
pub mod notify;
pub mod repository;

pub use manager::{BillingError, BillingManager};
pub use models::{
    AdditionalCharge, BillRun, BillRunSummary, BillType, BillingException, BillingExceptionType,
    BillingHistory, BillingQueueRow, CustomerBillingProfile, CustomerContact, InvoiceNotice,
};
pub use notify::{send_invoices, LoggingNotifier};
pub use repository::BillingRepository;
