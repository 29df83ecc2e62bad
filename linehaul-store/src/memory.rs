use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use linehaul_billing::manager::{BillingError, BillingManager};
use linehaul_billing::models::{
    AdditionalCharge, BillRunSummary, BillingException, BillingQueueRow, CustomerContact,
};
use linehaul_billing::notify::{send_invoices, LoggingNotifier};
use linehaul_billing::repository::BillingRepository;
use linehaul_core::notify::BillingNotifier;
use linehaul_dispatch::manager::{DispatchError, DispatchManager};
use linehaul_dispatch::models::{
    DispatchSettings, Movement, MovementAssignment, NewOrder, Order, ServiceIncident, Status,
    Stop, StopUpdate,
};
use linehaul_dispatch::repository::DispatchRepository;

struct StoreInner {
    dispatch: DispatchManager,
    billing: BillingManager,
}

/// In-memory backend for both repositories.
///
/// One lock guards dispatch and billing together, so every operation runs as
/// a single transaction over both sides: a rejected update releases the lock
/// with nothing written.
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
    notifier: Arc<dyn BillingNotifier>,
}

impl MemoryStore {
    pub fn new(settings: DispatchSettings, notifier: Arc<dyn BillingNotifier>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                dispatch: DispatchManager::new(settings),
                billing: BillingManager::new(),
            }),
            notifier,
        }
    }

    pub fn with_logging_notifier(settings: DispatchSettings) -> Self {
        Self::new(settings, Arc::new(LoggingNotifier))
    }

    /// Run a closure against the dispatch manager under the read lock.
    pub async fn with_dispatch<R>(&self, f: impl FnOnce(&DispatchManager) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard.dispatch)
    }

    /// Run a closure against the dispatch manager under the write lock.
    pub async fn with_dispatch_mut<R>(&self, f: impl FnOnce(&mut DispatchManager) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard.dispatch)
    }

    /// Run a closure against both managers under the write lock.
    pub async fn with_billing_mut<R>(
        &self,
        f: impl FnOnce(&mut BillingManager, &mut DispatchManager) -> R,
    ) -> R {
        let mut guard = self.inner.write().await;
        let StoreInner { dispatch, billing } = &mut *guard;
        f(billing, dispatch)
    }
}

#[async_trait]
impl DispatchRepository for MemoryStore {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order, DispatchError> {
        self.inner.write().await.dispatch.create_order(new_order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, DispatchError> {
        self.inner
            .read()
            .await
            .dispatch
            .order(&order_id)
            .cloned()
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))
    }

    async fn assign_movement(
        &self,
        movement_id: Uuid,
        assignment: MovementAssignment,
    ) -> Result<Movement, DispatchError> {
        self.inner
            .write()
            .await
            .dispatch
            .assign_movement(movement_id, assignment)
    }

    async fn set_movement_status(
        &self,
        movement_id: Uuid,
        status: Status,
    ) -> Result<Movement, DispatchError> {
        self.inner
            .write()
            .await
            .dispatch
            .set_movement_status(movement_id, status)
    }

    async fn update_stop(
        &self,
        stop_id: Uuid,
        update: StopUpdate,
    ) -> Result<Stop, DispatchError> {
        self.inner.write().await.dispatch.update_stop(stop_id, update)
    }

    async fn mark_ready_to_bill(&self, order_id: Uuid) -> Result<Order, DispatchError> {
        self.inner.write().await.dispatch.mark_ready_to_bill(order_id)
    }

    async fn cancel_order(&self, order_id: Uuid) -> Result<Order, DispatchError> {
        self.inner.write().await.dispatch.cancel_order(order_id)
    }

    async fn attach_document(
        &self,
        order_id: Uuid,
        document_class: &str,
    ) -> Result<Order, DispatchError> {
        self.inner
            .write()
            .await
            .dispatch
            .attach_document(order_id, document_class)
    }

    async fn incidents_for_stop(
        &self,
        stop_id: Uuid,
    ) -> Result<Vec<ServiceIncident>, DispatchError> {
        Ok(self
            .inner
            .read()
            .await
            .dispatch
            .incidents_for_stop(&stop_id)
            .into_iter()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BillingRepository for MemoryStore {
    async fn transfer_orders(&self) -> Result<Vec<String>, BillingError> {
        let mut guard = self.inner.write().await;
        let StoreInner { dispatch, billing } = &mut *guard;
        billing.transfer_orders(dispatch)
    }

    async fn bill_orders(&self) -> Result<BillRunSummary, BillingError> {
        let run = {
            let mut guard = self.inner.write().await;
            let StoreInner { dispatch, billing } = &mut *guard;
            billing.bill_orders(dispatch)?
        };
        // Notification I/O happens with the lock released; a slow notifier
        // cannot stall other store operations.
        send_invoices(self.notifier.as_ref(), &run.notices).await;
        Ok(run.summary)
    }

    async fn re_bill_order(&self, order_ref: &str) -> Result<BillingQueueRow, BillingError> {
        let mut guard = self.inner.write().await;
        let StoreInner { dispatch, billing } = &mut *guard;
        billing.re_bill_order(dispatch, order_ref)
    }

    async fn add_additional_charge(
        &self,
        order_id: Uuid,
        description: &str,
        unit_amount: Decimal,
        units: u32,
    ) -> Result<AdditionalCharge, BillingError> {
        let mut guard = self.inner.write().await;
        let StoreInner { dispatch, billing } = &mut *guard;
        billing.add_additional_charge(dispatch, order_id, description, unit_amount, units)
    }

    async fn set_billing_profile(
        &self,
        customer_id: Uuid,
        required_documents: Vec<String>,
    ) -> Result<(), BillingError> {
        let mut guard = self.inner.write().await;
        guard.billing.set_billing_profile(
            customer_id,
            required_documents.iter().map(String::as_str).collect(),
        );
        Ok(())
    }

    async fn add_billing_contact(
        &self,
        customer_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<CustomerContact, BillingError> {
        let mut guard = self.inner.write().await;
        Ok(guard.billing.add_contact(customer_id, name, email, true))
    }

    async fn exceptions_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<BillingException>, BillingError> {
        Ok(self
            .inner
            .read()
            .await
            .billing
            .exceptions_for_order(&order_id)
            .into_iter()
            .cloned()
            .collect())
    }
}
