use std::collections::HashMap;

use chrono::{DateTime, Utc};
use linehaul_core::sequence::SequenceGenerator;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    DelayCode, DispatchSettings, Driver, Equipment, Location, Movement, NewOrder, Order,
    RateMethod, ServiceIncident, Status, Stop, StopType,
};

/// Manages the Order -> Movement -> Stop lifecycle for one organization.
///
/// All rows live in arenas keyed by ID; parents address their children by ID
/// rather than holding live references, so every operation mutates the graph
/// from a single place. One manager instance per organization, which makes
/// the order-ID sequence per-organization by construction.
pub struct DispatchManager {
    settings: DispatchSettings,
    orders: HashMap<Uuid, Order>,
    movements: HashMap<Uuid, Movement>,
    stops: HashMap<Uuid, Stop>,
    incidents: HashMap<Uuid, ServiceIncident>,
    drivers: HashMap<Uuid, Driver>,
    equipment: HashMap<Uuid, Equipment>,
    locations: HashMap<Uuid, Location>,
    delay_codes: HashMap<String, DelayCode>,
    order_ids: SequenceGenerator,
}

impl DispatchManager {
    pub fn new(settings: DispatchSettings) -> Self {
        Self {
            settings,
            orders: HashMap::new(),
            movements: HashMap::new(),
            stops: HashMap::new(),
            incidents: HashMap::new(),
            drivers: HashMap::new(),
            equipment: HashMap::new(),
            locations: HashMap::new(),
            delay_codes: HashMap::new(),
            order_ids: SequenceGenerator::new("S"),
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    // ── Reference registries ─────────────────────────────────────────────

    pub fn register_driver(&mut self, name: &str, equipment: Vec<Uuid>) -> Driver {
        let driver = Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
            equipment,
        };
        self.drivers.insert(driver.id, driver.clone());
        driver
    }

    pub fn register_equipment(&mut self, unit_code: &str) -> Equipment {
        let unit = Equipment {
            id: Uuid::new_v4(),
            unit_code: unit_code.to_string(),
        };
        self.equipment.insert(unit.id, unit.clone());
        unit
    }

    pub fn register_location(&mut self, name: &str, address_line: &str) -> Location {
        let location = Location {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address_line: address_line.to_string(),
        };
        self.locations.insert(location.id, location.clone());
        location
    }

    pub fn register_delay_code(&mut self, code: &str, description: &str) -> DelayCode {
        let delay_code = DelayCode {
            code: code.to_uppercase(),
            description: description.to_string(),
        };
        self.delay_codes
            .insert(delay_code.code.clone(), delay_code.clone());
        delay_code
    }

    // ── Order lifecycle ──────────────────────────────────────────────────

    /// Create an order together with its first movement and that movement's
    /// origin (pickup) and destination (delivery) stops.
    pub fn create_order(&mut self, new_order: NewOrder) -> Result<Order, DispatchError> {
        match new_order.rate_method {
            RateMethod::Flat if new_order.freight_charge_amount.is_none() => {
                return Err(DispatchError::MissingFreightCharge);
            }
            RateMethod::PerMile if new_order.mileage.is_none() => {
                return Err(DispatchError::MissingMileage);
            }
            _ => {}
        }
        if new_order.destination_appointment_time < new_order.origin_appointment_time {
            return Err(DispatchError::AppointmentsOutOfOrder);
        }

        let origin = self
            .locations
            .get(&new_order.origin_location)
            .ok_or(DispatchError::LocationNotFound(new_order.origin_location))?
            .clone();
        let destination = self
            .locations
            .get(&new_order.destination_location)
            .ok_or(DispatchError::LocationNotFound(
                new_order.destination_location,
            ))?
            .clone();

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            order_id: self.order_ids.next_id(),
            status: Status::Available,
            customer_id: new_order.customer_id,
            origin_location: origin.id,
            origin_address: origin.address_line.clone(),
            origin_appointment_time: new_order.origin_appointment_time,
            destination_location: destination.id,
            destination_address: destination.address_line.clone(),
            destination_appointment_time: new_order.destination_appointment_time,
            rate_method: new_order.rate_method,
            freight_charge_amount: new_order.freight_charge_amount,
            other_charge_amount: new_order.other_charge_amount,
            mileage: new_order.mileage,
            sub_total: None,
            pieces: None,
            weight: None,
            ready_to_bill: false,
            billed: false,
            transferred_to_billing: false,
            billing_transfer_date: None,
            bill_date: None,
            bol_number: new_order.bol_number,
            consignee_ref_num: new_order.consignee_ref_num,
            document_classes: Vec::new(),
            movements: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let mut movement = Movement::new(order.id);
        let origin_stop = self.build_stop(
            &movement,
            1,
            StopType::Pickup,
            &origin,
            new_order.origin_appointment_time,
        );
        let destination_stop = self.build_stop(
            &movement,
            2,
            StopType::Delivery,
            &destination,
            new_order.destination_appointment_time,
        );
        movement.stops = vec![origin_stop.id, destination_stop.id];
        order.movements.push(movement.id);

        tracing::info!(order_id = %order.order_id, movement_id = %movement.id, "order created");

        self.stops.insert(origin_stop.id, origin_stop);
        self.stops.insert(destination_stop.id, destination_stop);
        self.movements.insert(movement.id, movement);
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn build_stop(
        &self,
        movement: &Movement,
        sequence: u32,
        stop_type: StopType,
        location: &Location,
        appointment_time: DateTime<Utc>,
    ) -> Stop {
        let now = Utc::now();
        Stop {
            id: Uuid::new_v4(),
            movement_id: movement.id,
            sequence,
            stop_type,
            status: Status::Available,
            location_id: location.id,
            address_line: location.address_line.clone(),
            appointment_time,
            arrival_time: None,
            departure_time: None,
            pieces: 0,
            weight: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark a completed order as ready to bill, computing and persisting its
    /// sub-total. Re-running with unchanged inputs recomputes the same value.
    pub fn mark_ready_to_bill(&mut self, order_id: Uuid) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        if order.status != Status::Completed {
            return Err(DispatchError::NotCompleted {
                status: order.status,
            });
        }
        let sub_total = order.calculate_sub_total()?;

        let order = self.orders.get_mut(&order_id).expect("checked above");
        order.ready_to_bill = true;
        order.sub_total = Some(sub_total);
        order.updated_at = Utc::now();
        tracing::info!(order_id = %order.order_id, %sub_total, "order marked ready to bill");
        Ok(order.clone())
    }

    /// Cancel an order, cascading to every movement and stop that has not
    /// already completed. Completed orders cannot be cancelled.
    pub fn cancel_order(&mut self, order_id: Uuid) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        if order.status == Status::Completed {
            return Err(DispatchError::InvalidTransition {
                from: Status::Completed,
                to: Status::Cancelled,
            });
        }

        let movement_ids = order.movements.clone();
        for movement_id in movement_ids {
            if let Some(movement) = self.movements.get_mut(&movement_id) {
                let stop_ids = movement.stops.clone();
                if movement.status != Status::Completed {
                    movement.update_status(Status::Cancelled);
                }
                for stop_id in stop_ids {
                    if let Some(stop) = self.stops.get_mut(&stop_id) {
                        if stop.status != Status::Completed {
                            stop.status = Status::Cancelled;
                            stop.updated_at = Utc::now();
                        }
                    }
                }
            }
        }

        let order = self.orders.get_mut(&order_id).expect("checked above");
        order.update_status(Status::Cancelled);
        tracing::info!(order_id = %order.order_id, "order cancelled");
        Ok(order.clone())
    }

    /// Attach a paperwork classification to the order.
    pub fn attach_document(
        &mut self,
        order_id: Uuid,
        document_class: &str,
    ) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        let class = document_class.to_uppercase();
        if !order.document_classes.contains(&class) {
            order.document_classes.push(class);
            order.updated_at = Utc::now();
        }
        Ok(order.clone())
    }

    // ── Billing flag bookkeeping (driven by the billing workflow) ────────

    pub fn mark_transferred(&mut self, order_id: Uuid) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        order.transferred_to_billing = true;
        order.billing_transfer_date = Some(Utc::now());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    pub fn mark_billed(&mut self, order_id: Uuid) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        order.billed = true;
        order.bill_date = Some(Utc::now());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    /// Clear every billing flag so a billed order can flow through billing
    /// again.
    pub fn reset_billing_flags(&mut self, order_id: Uuid) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        order.billed = false;
        order.bill_date = None;
        order.transferred_to_billing = false;
        order.billing_transfer_date = None;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    pub fn set_other_charge(
        &mut self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<Order, DispatchError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(DispatchError::OrderNotFound(order_id.to_string()))?;
        order.other_charge_amount = Some(amount);
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    // ── Internal cascades ────────────────────────────────────────────────

    /// Forward the order to `status` as a consequence of a validated child
    /// save. Cascades only ever move forward, so no re-validation happens
    /// here.
    pub(crate) fn cascade_order_status(&mut self, order_id: Uuid, status: Status) {
        let Some(order) = self.orders.get_mut(&order_id) else {
            return;
        };
        if status.rank() <= order.status.rank() {
            return;
        }
        order.update_status(status);
        if status == Status::Completed {
            let order_ref = order.order_id.clone();
            self.fill_completion_totals(order_id);
            tracing::info!(order_id = %order_ref, "order completed");
        }
    }

    /// On completion, fill any unset pieces/weight total from the stops of
    /// all movements.
    fn fill_completion_totals(&mut self, order_id: Uuid) {
        let Some(order) = self.orders.get(&order_id) else {
            return;
        };
        if order.pieces.is_some() && order.weight.is_some() {
            return;
        }
        let mut pieces: u32 = 0;
        let mut weight: u32 = 0;
        for movement_id in &order.movements {
            if let Some(movement) = self.movements.get(movement_id) {
                for stop_id in &movement.stops {
                    if let Some(stop) = self.stops.get(stop_id) {
                        pieces = pieces.saturating_add(stop.pieces);
                        weight = weight.saturating_add(stop.weight);
                    }
                }
            }
        }
        let order = self.orders.get_mut(&order_id).expect("checked above");
        if order.pieces.is_none() {
            order.pieces = Some(pieces);
        }
        if order.weight.is_none() {
            order.weight = Some(weight);
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn order(&self, id: &Uuid) -> Option<&Order> {
        self.orders.get(id)
    }

    /// Look an order up by its human-facing reference ("S1", ...).
    pub fn order_by_ref(&self, order_ref: &str) -> Option<&Order> {
        self.orders.values().find(|o| o.order_id == order_ref)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn movement(&self, id: &Uuid) -> Option<&Movement> {
        self.movements.get(id)
    }

    pub(crate) fn movement_mut(&mut self, id: &Uuid) -> Option<&mut Movement> {
        self.movements.get_mut(id)
    }

    pub fn stop(&self, id: &Uuid) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub(crate) fn stop_mut(&mut self, id: &Uuid) -> Option<&mut Stop> {
        self.stops.get_mut(id)
    }

    pub(crate) fn insert_stop(&mut self, stop: Stop) {
        self.stops.insert(stop.id, stop);
    }

    pub(crate) fn insert_incident(&mut self, incident: ServiceIncident) {
        self.incidents.insert(incident.id, incident);
    }

    pub fn driver(&self, id: &Uuid) -> Option<&Driver> {
        self.drivers.get(id)
    }

    pub fn equipment_unit(&self, id: &Uuid) -> Option<&Equipment> {
        self.equipment.get(id)
    }

    pub fn delay_code(&self, code: &str) -> Option<&DelayCode> {
        self.delay_codes.get(code)
    }

    /// A movement's stops ordered by sequence.
    pub fn stops_for_movement(&self, movement_id: &Uuid) -> Vec<&Stop> {
        let Some(movement) = self.movements.get(movement_id) else {
            return Vec::new();
        };
        let mut stops: Vec<&Stop> = movement
            .stops
            .iter()
            .filter_map(|id| self.stops.get(id))
            .collect();
        stops.sort_by_key(|s| s.sequence);
        stops
    }

    pub fn incidents_for_stop(&self, stop_id: &Uuid) -> Vec<&ServiceIncident> {
        self.incidents
            .values()
            .filter(|i| i.stop_id == *stop_id)
            .collect()
    }

    pub fn incidents(&self) -> impl Iterator<Item = &ServiceIncident> {
        self.incidents.values()
    }
}

impl Default for DispatchManager {
    fn default() -> Self {
        Self::new(DispatchSettings::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Movement not found: {0}")]
    MovementNotFound(Uuid),

    #[error("Stop not found: {0}")]
    StopNotFound(Uuid),

    #[error("Driver not found: {0}")]
    DriverNotFound(Uuid),

    #[error("Equipment not found: {0}")]
    EquipmentNotFound(Uuid),

    #[error("Location not found: {0}")]
    LocationNotFound(Uuid),

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidTransition { from: Status, to: Status },

    #[error("Freight charge amount is required for the flat rating method")]
    MissingFreightCharge,

    #[error("Mileage is required for the per-mile rating method")]
    MissingMileage,

    #[error("Cannot mark an order ready to bill while its status is {status:?}")]
    NotCompleted { status: Status },

    #[error("Destination appointment cannot be before the origin appointment")]
    AppointmentsOutOfOrder,

    #[error("The primary driver and the secondary driver cannot be the same")]
    SameDriver,

    #[error("Movement cannot be in progress without an assigned driver")]
    MissingDriver,

    #[error("Movement cannot be in progress without assigned equipment")]
    MissingEquipment,

    #[error("Stop appointment time cannot be before the previous stop's appointment time")]
    AppointmentBeforePrevious,

    #[error("Stop appointment time cannot be after the next stop's appointment time")]
    AppointmentAfterNext,

    #[error("The previous stop must be completed before this stop can advance")]
    PreviousStopIncomplete,

    #[error("The next stop has already advanced past this stop")]
    NextStopAdvanced,

    #[error("Movement must have a driver and equipment before its stops can advance")]
    MovementNotEquipped,

    #[error("Stop arrival time must be set before the departure time")]
    DepartureWithoutArrival,

    #[error("Stop departure time cannot be before the arrival time")]
    DepartureBeforeArrival,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StopUpdate;
    use chrono::Duration;

    fn manager_with_locations() -> (DispatchManager, Location, Location) {
        let mut manager = DispatchManager::default();
        let origin = manager.register_location("Yard A", "100 First St");
        let destination = manager.register_location("Yard B", "200 Second St");
        (manager, origin, destination)
    }

    fn new_order(origin: &Location, destination: &Location) -> NewOrder {
        let t1 = Utc::now();
        NewOrder {
            customer_id: Uuid::new_v4(),
            origin_location: origin.id,
            origin_appointment_time: t1,
            destination_location: destination.id,
            destination_appointment_time: t1 + Duration::hours(6),
            rate_method: RateMethod::Flat,
            freight_charge_amount: Some(Decimal::new(100000, 2)),
            other_charge_amount: None,
            mileage: None,
            bol_number: None,
            consignee_ref_num: None,
        }
    }

    #[test]
    fn test_create_order_builds_movement_and_stops() {
        let (mut manager, origin, destination) = manager_with_locations();
        let request = new_order(&origin, &destination);
        let t1 = request.origin_appointment_time;
        let t2 = request.destination_appointment_time;

        let order = manager.create_order(request).unwrap();
        assert_eq!(order.order_id, "S1");
        assert_eq!(order.status, Status::Available);
        assert_eq!(order.origin_address, "100 First St");
        assert_eq!(order.movements.len(), 1);

        let stops = manager.stops_for_movement(&order.movements[0]);
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].sequence, 1);
        assert_eq!(stops[0].stop_type, StopType::Pickup);
        assert_eq!(stops[0].location_id, origin.id);
        assert_eq!(stops[0].appointment_time, t1);
        assert_eq!(stops[1].sequence, 2);
        assert_eq!(stops[1].stop_type, StopType::Delivery);
        assert_eq!(stops[1].location_id, destination.id);
        assert_eq!(stops[1].appointment_time, t2);
    }

    #[test]
    fn test_order_ids_are_sequential() {
        let (mut manager, origin, destination) = manager_with_locations();
        let first = manager.create_order(new_order(&origin, &destination)).unwrap();
        let second = manager.create_order(new_order(&origin, &destination)).unwrap();
        assert_eq!(first.order_id, "S1");
        assert_eq!(second.order_id, "S2");
    }

    #[test]
    fn test_create_order_rejects_flat_without_freight_charge() {
        let (mut manager, origin, destination) = manager_with_locations();
        let mut request = new_order(&origin, &destination);
        request.freight_charge_amount = None;
        assert!(matches!(
            manager.create_order(request),
            Err(DispatchError::MissingFreightCharge)
        ));
    }

    #[test]
    fn test_create_order_rejects_per_mile_without_mileage() {
        let (mut manager, origin, destination) = manager_with_locations();
        let mut request = new_order(&origin, &destination);
        request.rate_method = RateMethod::PerMile;
        request.mileage = None;
        assert!(matches!(
            manager.create_order(request),
            Err(DispatchError::MissingMileage)
        ));
    }

    #[test]
    fn test_create_order_rejects_reversed_appointments() {
        let (mut manager, origin, destination) = manager_with_locations();
        let mut request = new_order(&origin, &destination);
        request.destination_appointment_time =
            request.origin_appointment_time - Duration::hours(1);
        assert!(matches!(
            manager.create_order(request),
            Err(DispatchError::AppointmentsOutOfOrder)
        ));
    }

    #[test]
    fn test_mark_ready_to_bill_requires_completed_order() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        assert!(matches!(
            manager.mark_ready_to_bill(order.id),
            Err(DispatchError::NotCompleted {
                status: Status::Available
            })
        ));
    }

    #[test]
    fn test_mark_ready_to_bill_is_idempotent() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        manager.cascade_order_status(order.id, Status::Completed);

        let first = manager.mark_ready_to_bill(order.id).unwrap();
        let second = manager.mark_ready_to_bill(order.id).unwrap();
        assert_eq!(first.sub_total, Some(Decimal::new(100000, 2)));
        assert_eq!(first.sub_total, second.sub_total);
        assert!(second.ready_to_bill);
    }

    #[test]
    fn test_cancel_order_cascades_to_children() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        let movement_id = order.movements[0];

        let cancelled = manager.cancel_order(order.id).unwrap();
        assert_eq!(cancelled.status, Status::Cancelled);
        assert_eq!(
            manager.movement(&movement_id).unwrap().status,
            Status::Cancelled
        );
        for stop in manager.stops_for_movement(&movement_id) {
            assert_eq!(stop.status, Status::Cancelled);
        }
    }

    #[test]
    fn test_cancel_completed_order_is_rejected() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        manager.cascade_order_status(order.id, Status::Completed);
        assert!(matches!(
            manager.cancel_order(order.id),
            Err(DispatchError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_completion_fills_unset_totals_from_stops() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        let movement_id = order.movements[0];
        let stop_ids: Vec<Uuid> = manager
            .stops_for_movement(&movement_id)
            .iter()
            .map(|s| s.id)
            .collect();
        for stop_id in &stop_ids {
            manager
                .update_stop(
                    *stop_id,
                    StopUpdate {
                        pieces: Some(10),
                        weight: Some(500),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        manager.cascade_order_status(order.id, Status::Completed);
        let order = manager.order(&order.id).unwrap();
        assert_eq!(order.pieces, Some(20));
        assert_eq!(order.weight, Some(1000));
    }

    #[test]
    fn test_completion_totals_saturate_instead_of_overflowing() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        let movement_id = order.movements[0];
        let stop_ids: Vec<Uuid> = manager
            .stops_for_movement(&movement_id)
            .iter()
            .map(|s| s.id)
            .collect();
        for stop_id in &stop_ids {
            manager
                .update_stop(
                    *stop_id,
                    StopUpdate {
                        pieces: Some(u32::MAX),
                        weight: Some(u32::MAX),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        manager.cascade_order_status(order.id, Status::Completed);
        let order = manager.order(&order.id).unwrap();
        assert_eq!(order.pieces, Some(u32::MAX));
        assert_eq!(order.weight, Some(u32::MAX));
    }

    #[test]
    fn test_attach_document_deduplicates() {
        let (mut manager, origin, destination) = manager_with_locations();
        let order = manager.create_order(new_order(&origin, &destination)).unwrap();
        manager.attach_document(order.id, "pod").unwrap();
        let order = manager.attach_document(order.id, "POD").unwrap();
        assert_eq!(order.document_classes, vec!["POD".to_string()]);
    }
}
