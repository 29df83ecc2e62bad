use chrono::Utc;
use uuid::Uuid;

use crate::manager::{DispatchError, DispatchManager};
use crate::models::{Movement, ServiceIncident, Status, Stop, StopUpdate};

impl DispatchManager {
    /// Apply a field update to a stop, enforcing sequencing invariants and
    /// firing the movement/order cascades.
    ///
    /// Status follows the recorded timestamps: an arrival forces at least
    /// `InProgress`, arrival plus departure forces `Completed`. Validation
    /// runs against the prospective stop before anything is committed, so a
    /// rejected update leaves no partial state behind. A late arrival files
    /// one service incident the first time the arrival is recorded.
    pub fn update_stop(&mut self, stop_id: Uuid, update: StopUpdate) -> Result<Stop, DispatchError> {
        let current = self
            .stop(&stop_id)
            .ok_or(DispatchError::StopNotFound(stop_id))?
            .clone();
        let movement = self
            .movement(&current.movement_id)
            .ok_or(DispatchError::MovementNotFound(current.movement_id))?
            .clone();

        // Cancelled is terminal. Rejecting before the timestamp derivation
        // keeps an arrival from quietly reviving a cancelled stop.
        if current.status == Status::Cancelled {
            return Err(DispatchError::InvalidTransition {
                from: Status::Cancelled,
                to: update.status.unwrap_or(Status::Cancelled),
            });
        }

        let mut next = current.clone();
        if let Some(t) = update.appointment_time {
            next.appointment_time = t;
        }
        if let Some(t) = update.arrival_time {
            next.arrival_time = Some(t);
        }
        if let Some(t) = update.departure_time {
            next.departure_time = Some(t);
        }
        if let Some(pieces) = update.pieces {
            next.pieces = pieces;
        }
        if let Some(weight) = update.weight {
            next.weight = weight;
        }
        if let Some(status) = update.status {
            next.status = status;
        }

        match (next.arrival_time.is_some(), next.departure_time.is_some()) {
            (true, true) => next.status = Status::Completed,
            (true, false) if next.status != Status::Completed => {
                next.status = Status::InProgress;
            }
            _ => {}
        }

        self.validate_stop(&current, &next, &movement)?;

        next.updated_at = Utc::now();
        let committed = next.clone();
        self.insert_stop(next);

        if committed.status.is_advanced() {
            let movement_done = committed.status == Status::Completed
                && self
                    .stops_for_movement(&movement.id)
                    .iter()
                    .all(|s| s.status == Status::Completed);
            if let Some(m) = self.movement_mut(&movement.id) {
                if movement_done {
                    if m.status != Status::Completed {
                        m.update_status(Status::Completed);
                        tracing::info!(movement_id = %movement.id, "movement completed");
                    }
                } else if m.status == Status::Available {
                    m.update_status(Status::InProgress);
                }
            }
            if movement_done {
                self.complete_order_if_done(movement.order_id);
            } else {
                self.cascade_order_status(movement.order_id, Status::InProgress);
            }
        }

        if current.arrival_time.is_none() {
            if let Some(arrival) = committed.arrival_time {
                if arrival > committed.appointment_time && self.settings().delay_incidents_enabled {
                    self.record_delay(&committed);
                }
            }
        }

        Ok(committed)
    }

    fn validate_stop(
        &self,
        current: &Stop,
        next: &Stop,
        movement: &Movement,
    ) -> Result<(), DispatchError> {
        // Stops are cancelled through order-level cancellation only.
        if next.status == Status::Cancelled && current.status != Status::Cancelled {
            return Err(DispatchError::InvalidTransition {
                from: current.status,
                to: Status::Cancelled,
            });
        }
        if next.status.rank() < current.status.rank() {
            return Err(DispatchError::InvalidTransition {
                from: current.status,
                to: next.status,
            });
        }

        let siblings = self.stops_for_movement(&movement.id);
        if next.sequence > 1 {
            if let Some(previous) = siblings.iter().find(|s| s.sequence == next.sequence - 1) {
                if next.appointment_time < previous.appointment_time {
                    return Err(DispatchError::AppointmentBeforePrevious);
                }
                if previous.status != Status::Completed && next.status.is_advanced() {
                    return Err(DispatchError::PreviousStopIncomplete);
                }
            }
        }
        if let Some(following) = siblings.iter().find(|s| s.sequence == next.sequence + 1) {
            if next.appointment_time > following.appointment_time {
                return Err(DispatchError::AppointmentAfterNext);
            }
            if next.status != Status::Completed && following.status.is_advanced() {
                return Err(DispatchError::NextStopAdvanced);
            }
        }

        if !movement.is_equipped()
            && (next.status.is_advanced()
                || next.arrival_time.is_some()
                || next.departure_time.is_some())
        {
            return Err(DispatchError::MovementNotEquipped);
        }

        if let Some(departure) = next.departure_time {
            let arrival = next
                .arrival_time
                .ok_or(DispatchError::DepartureWithoutArrival)?;
            if departure < arrival {
                return Err(DispatchError::DepartureBeforeArrival);
            }
        }
        Ok(())
    }

    /// File a service incident for an arrival past the appointment, using the
    /// configured default delay code.
    fn record_delay(&mut self, stop: &Stop) {
        let arrival = stop.arrival_time.expect("caller checked arrival");
        let delay = arrival - stop.appointment_time;
        let configured = self.settings().default_delay_code.clone();
        let (delay_code, delay_reason) = match self.delay_code(&configured) {
            Some(code) => (code.code.clone(), code.description.clone()),
            None => (
                configured,
                self.settings().default_delay_description.clone(),
            ),
        };

        tracing::warn!(
            stop_id = %stop.id,
            delay_seconds = delay.num_seconds(),
            %delay_code,
            "late arrival recorded"
        );
        self.insert_incident(ServiceIncident {
            id: Uuid::new_v4(),
            movement_id: stop.movement_id,
            stop_id: stop.id,
            delay_code,
            delay_reason,
            delay_seconds: delay.num_seconds(),
            created_at: Utc::now(),
        });
    }
}
