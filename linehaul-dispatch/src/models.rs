use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::manager::DispatchError;

/// Lifecycle status shared by orders, movements, and stops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Available,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    /// Position in the forward-only ordering. Cancelled is terminal and only
    /// reachable through order-level cancellation, never by a plain status set.
    pub fn rank(self) -> u8 {
        match self {
            Status::Available => 0,
            Status::InProgress => 1,
            Status::Completed => 2,
            Status::Cancelled => 3,
        }
    }

    pub fn is_advanced(self) -> bool {
        matches!(self, Status::InProgress | Status::Completed)
    }
}

/// Kind of waypoint within a movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopType {
    Pickup,
    SplitPickup,
    SplitDropOff,
    Delivery,
    DropOff,
}

/// How an order's sub-total is rated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateMethod {
    Flat,
    PerMile,
    PerStop,
    Pounds,
}

/// A customer shipment request. The single source of truth for billing flags
/// and the parent of every movement created to fulfill it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-facing reference, "S1", "S2", ... sequential per organization.
    pub order_id: String,
    pub status: Status,
    pub customer_id: Uuid,
    pub origin_location: Uuid,
    pub origin_address: String,
    pub origin_appointment_time: DateTime<Utc>,
    pub destination_location: Uuid,
    pub destination_address: String,
    pub destination_appointment_time: DateTime<Utc>,
    pub rate_method: RateMethod,
    pub freight_charge_amount: Option<Decimal>,
    pub other_charge_amount: Option<Decimal>,
    pub mileage: Option<Decimal>,
    pub sub_total: Option<Decimal>,
    pub pieces: Option<u32>,
    pub weight: Option<u32>,
    pub ready_to_bill: bool,
    pub billed: bool,
    pub transferred_to_billing: bool,
    pub billing_transfer_date: Option<DateTime<Utc>>,
    pub bill_date: Option<DateTime<Utc>>,
    pub bol_number: Option<String>,
    pub consignee_ref_num: Option<String>,
    /// Paperwork classifications attached to the order, compared against the
    /// customer's billing profile during a bill run.
    pub document_classes: Vec<String>,
    /// Owned child movements, addressed by ID.
    pub movements: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn update_status(&mut self, new_status: Status) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    /// Rate the order according to its rate method.
    ///
    /// Flat: freight + other charges. PerMile: freight x mileage + other
    /// charges. PerStop and Pounds have no dedicated formula and degrade to
    /// the flat calculation.
    pub fn calculate_sub_total(&self) -> Result<Decimal, DispatchError> {
        let other = self.other_charge_amount.unwrap_or_default();
        match self.rate_method {
            RateMethod::Flat => {
                let freight = self
                    .freight_charge_amount
                    .ok_or(DispatchError::MissingFreightCharge)?;
                Ok(freight + other)
            }
            RateMethod::PerMile => {
                let mileage = self.mileage.ok_or(DispatchError::MissingMileage)?;
                let freight = self.freight_charge_amount.unwrap_or_default();
                Ok(freight * mileage + other)
            }
            RateMethod::PerStop | RateMethod::Pounds => {
                tracing::warn!(
                    order_id = %self.order_id,
                    rate_method = ?self.rate_method,
                    "rate method has no dedicated formula, using flat calculation"
                );
                Ok(self.freight_charge_amount.unwrap_or_default() + other)
            }
        }
    }
}

/// Request payload for creating an order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub origin_location: Uuid,
    pub origin_appointment_time: DateTime<Utc>,
    pub destination_location: Uuid,
    pub destination_appointment_time: DateTime<Utc>,
    pub rate_method: RateMethod,
    pub freight_charge_amount: Option<Decimal>,
    pub other_charge_amount: Option<Decimal>,
    pub mileage: Option<Decimal>,
    pub bol_number: Option<String>,
    pub consignee_ref_num: Option<String>,
}

/// One driver/equipment assignment fulfilling part or all of an order.
/// Supports relay or team driving through a second assigned driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: Status,
    pub assigned_driver: Option<Uuid>,
    pub assigned_driver_2: Option<Uuid>,
    pub equipment: Option<Uuid>,
    /// Owned child stops in creation order.
    pub stops: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movement {
    pub fn new(order_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            status: Status::Available,
            assigned_driver: None,
            assigned_driver_2: None,
            equipment: None,
            stops: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, new_status: Status) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    pub fn is_equipped(&self) -> bool {
        self.assigned_driver.is_some() && self.equipment.is_some()
    }
}

/// Driver/equipment changes to apply to a movement.
#[derive(Debug, Clone, Deserialize)]
pub struct MovementAssignment {
    pub driver: Uuid,
    pub driver_2: Option<Uuid>,
    /// When absent, the primary driver's first associated equipment unit is
    /// used.
    pub equipment: Option<Uuid>,
}

/// An ordered waypoint within a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub id: Uuid,
    pub movement_id: Uuid,
    /// 1-based position within the movement.
    pub sequence: u32,
    pub stop_type: StopType,
    pub status: Status,
    pub location_id: Uuid,
    pub address_line: String,
    pub appointment_time: DateTime<Utc>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub pieces: u32,
    pub weight: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field updates for a stop. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopUpdate {
    pub status: Option<Status>,
    pub appointment_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub pieces: Option<u32>,
    pub weight: Option<u32>,
}

/// A recorded delay: the stop's arrival exceeded its scheduled appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceIncident {
    pub id: Uuid,
    pub movement_id: Uuid,
    pub stop_id: Uuid,
    pub delay_code: String,
    pub delay_reason: String,
    pub delay_seconds: i64,
    pub created_at: DateTime<Utc>,
}

/// Reference record for a driver and their associated equipment units, in
/// preference order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub equipment: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub unit_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub address_line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayCode {
    pub code: String,
    pub description: String,
}

/// Tunable dispatch behavior, built from configuration at process start and
/// passed to the manager's constructor.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Delay code stamped on auto-created service incidents.
    pub default_delay_code: String,
    /// Reason used when the default delay code is not in the registry.
    pub default_delay_description: String,
    pub delay_incidents_enabled: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_delay_code: "LATE".to_string(),
            default_delay_description: "Arrival after scheduled appointment".to_string(),
            delay_incidents_enabled: true,
        }
    }
}
