use async_trait::async_trait;
use uuid::Uuid;

use crate::manager::DispatchError;
use crate::models::{
    MovementAssignment, NewOrder, Order, Movement, ServiceIncident, Status, Stop, StopUpdate,
};

/// Persistence seam for the dispatch lifecycle. Backends wrap a manager and
/// decide the transaction scope of each operation.
#[async_trait]
pub trait DispatchRepository: Send + Sync {
    async fn create_order(&self, new_order: NewOrder) -> Result<Order, DispatchError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Order, DispatchError>;

    async fn assign_movement(
        &self,
        movement_id: Uuid,
        assignment: MovementAssignment,
    ) -> Result<Movement, DispatchError>;

    async fn set_movement_status(
        &self,
        movement_id: Uuid,
        status: Status,
    ) -> Result<Movement, DispatchError>;

    async fn update_stop(&self, stop_id: Uuid, update: StopUpdate)
        -> Result<Stop, DispatchError>;

    async fn mark_ready_to_bill(&self, order_id: Uuid) -> Result<Order, DispatchError>;

    async fn cancel_order(&self, order_id: Uuid) -> Result<Order, DispatchError>;

    async fn attach_document(
        &self,
        order_id: Uuid,
        document_class: &str,
    ) -> Result<Order, DispatchError>;

    async fn incidents_for_stop(&self, stop_id: Uuid)
        -> Result<Vec<ServiceIncident>, DispatchError>;
}
