use std::collections::HashMap;

use chrono::Utc;
use linehaul_core::sequence::SequenceGenerator;
use rust_decimal::Decimal;
use uuid::Uuid;

use linehaul_dispatch::manager::{DispatchError, DispatchManager};
use linehaul_dispatch::models::{Order, Status};

use crate::models::{
    AdditionalCharge, BillRun, BillRunSummary, BillType, BillingException, BillingExceptionType,
    BillingHistory, BillingQueueRow, CustomerBillingProfile, CustomerContact, InvoiceNotice,
};

/// Runs the billing workflow for one organization: transfer eligible orders
/// into the queue, bill the queue against per-customer paperwork
/// requirements, and handle re-bills and accessorial charges.
///
/// The manager owns billing state only. Order flags stay in dispatch and are
/// changed through the dispatch manager passed into each operation, so the
/// two sides never disagree about who holds the truth.
pub struct BillingManager {
    queue: HashMap<Uuid, BillingQueueRow>,
    history: Vec<BillingHistory>,
    exceptions: Vec<BillingException>,
    profiles: HashMap<Uuid, CustomerBillingProfile>,
    contacts: Vec<CustomerContact>,
    charges: Vec<AdditionalCharge>,
    batch_names: SequenceGenerator,
}

impl BillingManager {
    pub fn new() -> Self {
        Self {
            queue: HashMap::new(),
            history: Vec::new(),
            exceptions: Vec::new(),
            profiles: HashMap::new(),
            contacts: Vec::new(),
            charges: Vec::new(),
            batch_names: SequenceGenerator::new("B"),
        }
    }

    // ── Customer setup ───────────────────────────────────────────────────

    pub fn set_billing_profile(&mut self, customer_id: Uuid, required_documents: Vec<&str>) {
        let profile = CustomerBillingProfile {
            customer_id,
            required_documents: required_documents
                .into_iter()
                .map(|d| d.to_uppercase())
                .collect(),
        };
        self.profiles.insert(customer_id, profile);
    }

    pub fn add_contact(
        &mut self,
        customer_id: Uuid,
        name: &str,
        email: &str,
        is_billing: bool,
    ) -> CustomerContact {
        let contact = CustomerContact {
            id: Uuid::new_v4(),
            customer_id,
            name: name.to_string(),
            email: email.to_string(),
            is_billing,
        };
        self.contacts.push(contact.clone());
        contact
    }

    // ── Transfer ─────────────────────────────────────────────────────────

    /// Move every eligible order into the billing queue. An order is
    /// eligible when it is completed, marked ready to bill, not yet billed,
    /// and not already transferred. Returns the references transferred.
    pub fn transfer_orders(
        &mut self,
        dispatch: &mut DispatchManager,
    ) -> Result<Vec<String>, BillingError> {
        let eligible: Vec<(Uuid, Order)> = dispatch
            .orders()
            .filter(|o| {
                o.status == Status::Completed
                    && o.ready_to_bill
                    && !o.billed
                    && !o.transferred_to_billing
            })
            .map(|o| (o.id, o.clone()))
            .collect();

        let mut transferred = Vec::with_capacity(eligible.len());
        for (order_id, order) in eligible {
            self.enqueue(&order, BillType::Invoice);
            dispatch.mark_transferred(order_id)?;
            tracing::info!(order_ref = %order.order_id, "order transferred to billing");
            transferred.push(order.order_id);
        }
        transferred.sort();
        Ok(transferred)
    }

    fn enqueue(&mut self, order: &Order, bill_type: BillType) {
        let row = BillingQueueRow {
            id: Uuid::new_v4(),
            order_id: order.id,
            order_ref: order.order_id.clone(),
            customer_id: order.customer_id,
            bill_type,
            sub_total: order.sub_total,
            freight_charge_amount: order.freight_charge_amount,
            other_charge_amount: order.other_charge_amount,
            created_at: Utc::now(),
        };
        self.queue.insert(row.id, row);
    }

    // ── Bill run ─────────────────────────────────────────────────────────

    /// Bill every row in the queue, in transfer order.
    ///
    /// A row bills when the customer has a billing profile, a billing
    /// contact, and the order carries every required paperwork class. Billed
    /// rows leave the queue and land in history under this run's batch name,
    /// which is minted on the first billed row so a fruitless run burns no
    /// batch number. A row with missing paperwork stays queued and raises
    /// one exception per missing class; a customer with no profile or
    /// contact on file holds its rows without exceptions.
    ///
    /// Invoice notifications are returned, not sent: the caller delivers
    /// them once the state change is committed, outside any lock it holds.
    pub fn bill_orders(
        &mut self,
        dispatch: &mut DispatchManager,
    ) -> Result<BillRun, BillingError> {
        let mut batch_name: Option<String> = None;
        let mut summary = BillRunSummary {
            batch_name: None,
            billed: Vec::new(),
            held: Vec::new(),
            skipped: Vec::new(),
        };
        let mut notices = Vec::new();

        let mut rows: Vec<BillingQueueRow> = self.queue.values().cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        for row in rows {
            let Some(order) = dispatch.order(&row.order_id).cloned() else {
                tracing::warn!(order_ref = %row.order_ref, "queued order no longer exists, dropping row");
                self.queue.remove(&row.id);
                continue;
            };

            let Some(profile) = self.profiles.get(&row.customer_id).cloned() else {
                tracing::warn!(order_ref = %row.order_ref, customer_id = %row.customer_id,
                    "no billing profile on file, holding order");
                summary.skipped.push(row.order_ref.clone());
                continue;
            };
            let Some(contact) = self
                .contacts
                .iter()
                .find(|c| c.customer_id == row.customer_id && c.is_billing)
                .cloned()
            else {
                tracing::warn!(order_ref = %row.order_ref, customer_id = %row.customer_id,
                    "no billing contact on file, holding order");
                summary.skipped.push(row.order_ref.clone());
                continue;
            };

            let missing: Vec<String> = profile
                .required_documents
                .iter()
                .filter(|d| !order.document_classes.contains(d))
                .cloned()
                .collect();
            if !missing.is_empty() {
                for class in missing {
                    self.raise_paperwork_exception(&order, &class);
                }
                summary.held.push(row.order_ref.clone());
                continue;
            }

            let batch = batch_name
                .get_or_insert_with(|| self.batch_names.next_id())
                .clone();
            dispatch.mark_billed(order.id)?;
            self.history.push(BillingHistory {
                id: Uuid::new_v4(),
                batch_name: batch.clone(),
                order_id: order.id,
                order_ref: row.order_ref.clone(),
                customer_id: row.customer_id,
                bill_type: row.bill_type,
                sub_total: row.sub_total,
                billed_at: Utc::now(),
            });
            self.queue.remove(&row.id);
            tracing::info!(order_ref = %row.order_ref, batch = %batch, "order billed");

            notices.push(InvoiceNotice {
                order_ref: row.order_ref.clone(),
                contact_email: contact.email,
            });
            summary.billed.push(row.order_ref);
        }

        summary.batch_name = batch_name;
        Ok(BillRun { summary, notices })
    }

    /// One exception per order and paperwork class, no matter how many runs
    /// the order sits through.
    fn raise_paperwork_exception(&mut self, order: &Order, document_class: &str) {
        let message = format!("Missing required document: {document_class}");
        let already_raised = self.exceptions.iter().any(|e| {
            e.order_id == order.id
                && e.exception_type == BillingExceptionType::Paperwork
                && e.message == message
        });
        if already_raised {
            return;
        }
        tracing::warn!(order_ref = %order.order_id, document_class, "paperwork exception raised");
        self.exceptions.push(BillingException {
            id: Uuid::new_v4(),
            order_id: order.id,
            order_ref: order.order_id.clone(),
            exception_type: BillingExceptionType::Paperwork,
            message,
            created_at: Utc::now(),
        });
    }

    // ── Re-bill ──────────────────────────────────────────────────────────

    /// Send a billed order back through billing as a credit. The order's
    /// billing flags are cleared before the new queue row exists, so a
    /// failure partway leaves the order unbilled rather than double-queued.
    pub fn re_bill_order(
        &mut self,
        dispatch: &mut DispatchManager,
        order_ref: &str,
    ) -> Result<BillingQueueRow, BillingError> {
        let order = dispatch
            .order_by_ref(order_ref)
            .cloned()
            .ok_or_else(|| BillingError::OrderNotFound(order_ref.to_string()))?;
        if !order.billed {
            return Err(BillingError::NotBilled(order_ref.to_string()));
        }
        if self.queue.values().any(|r| r.order_id == order.id) {
            return Err(BillingError::AlreadyQueued(order_ref.to_string()));
        }

        dispatch.reset_billing_flags(order.id)?;
        let order = dispatch.mark_transferred(order.id)?;
        self.enqueue(&order, BillType::Credit);
        tracing::info!(order_ref = %order.order_id, "order re-queued for billing");
        let row = self
            .queue
            .values()
            .find(|r| r.order_id == order.id)
            .expect("row inserted above")
            .clone();
        Ok(row)
    }

    // ── Accessorial charges ──────────────────────────────────────────────

    /// Record an accessorial charge and refresh the order's other-charge
    /// amount to the sum of all its charges.
    pub fn add_additional_charge(
        &mut self,
        dispatch: &mut DispatchManager,
        order_id: Uuid,
        description: &str,
        unit_amount: Decimal,
        units: u32,
    ) -> Result<AdditionalCharge, BillingError> {
        if dispatch.order(&order_id).is_none() {
            return Err(BillingError::OrderNotFound(order_id.to_string()));
        }
        let charge = AdditionalCharge {
            id: Uuid::new_v4(),
            order_id,
            description: description.to_string(),
            unit_amount,
            units,
            total: unit_amount * Decimal::from(units),
            created_at: Utc::now(),
        };
        self.charges.push(charge.clone());

        let total: Decimal = self
            .charges
            .iter()
            .filter(|c| c.order_id == order_id)
            .map(|c| c.total)
            .sum();
        dispatch.set_other_charge(order_id, total)?;
        Ok(charge)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn queue(&self) -> impl Iterator<Item = &BillingQueueRow> {
        self.queue.values()
    }

    pub fn queued_row(&self, order_id: &Uuid) -> Option<&BillingQueueRow> {
        self.queue.values().find(|r| r.order_id == *order_id)
    }

    pub fn history(&self) -> &[BillingHistory] {
        &self.history
    }

    pub fn exceptions(&self) -> &[BillingException] {
        &self.exceptions
    }

    pub fn exceptions_for_order(&self, order_id: &Uuid) -> Vec<&BillingException> {
        self.exceptions
            .iter()
            .filter(|e| e.order_id == *order_id)
            .collect()
    }

    pub fn charges_for_order(&self, order_id: &Uuid) -> Vec<&AdditionalCharge> {
        self.charges
            .iter()
            .filter(|c| c.order_id == *order_id)
            .collect()
    }
}

impl Default for BillingManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {0} has not been billed")]
    NotBilled(String),

    #[error("Order {0} is already in the billing queue")]
    AlreadyQueued(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
