use chrono::Utc;
use uuid::Uuid;

use crate::manager::{DispatchError, DispatchManager};
use crate::models::{Movement, MovementAssignment, Status};

impl DispatchManager {
    /// Apply a driver/equipment assignment to a movement.
    ///
    /// The two drivers must differ. When no equipment is named, the primary
    /// driver's first associated equipment unit is used.
    pub fn assign_movement(
        &mut self,
        movement_id: Uuid,
        assignment: MovementAssignment,
    ) -> Result<Movement, DispatchError> {
        if self.movement(&movement_id).is_none() {
            return Err(DispatchError::MovementNotFound(movement_id));
        }
        if assignment.driver_2 == Some(assignment.driver) {
            return Err(DispatchError::SameDriver);
        }
        let driver = self
            .driver(&assignment.driver)
            .ok_or(DispatchError::DriverNotFound(assignment.driver))?
            .clone();
        if let Some(driver_2) = assignment.driver_2 {
            if self.driver(&driver_2).is_none() {
                return Err(DispatchError::DriverNotFound(driver_2));
            }
        }
        let equipment = match assignment.equipment {
            Some(id) => {
                if self.equipment_unit(&id).is_none() {
                    return Err(DispatchError::EquipmentNotFound(id));
                }
                Some(id)
            }
            None => driver.equipment.first().copied(),
        };

        let movement = self
            .movement_mut(&movement_id)
            .expect("existence checked above");
        movement.assigned_driver = Some(driver.id);
        movement.assigned_driver_2 = assignment.driver_2;
        movement.equipment = equipment;
        movement.updated_at = Utc::now();

        self.resequence_stops(movement_id);
        Ok(self.movement(&movement_id).expect("still present").clone())
    }

    /// Advance a movement's status, cascading to the parent order.
    ///
    /// Backward transitions are rejected. `InProgress` requires both a driver
    /// and equipment and marks the order in progress; `Completed` completes
    /// the order once no sibling movement remains in progress.
    pub fn set_movement_status(
        &mut self,
        movement_id: Uuid,
        status: Status,
    ) -> Result<Movement, DispatchError> {
        let movement = self
            .movement(&movement_id)
            .ok_or(DispatchError::MovementNotFound(movement_id))?;
        let from = movement.status;

        // Cancellation happens only through order-level cancellation.
        if status == Status::Cancelled || status.rank() < from.rank() {
            return Err(DispatchError::InvalidTransition { from, to: status });
        }
        if status == Status::InProgress {
            if movement.assigned_driver.is_none() {
                return Err(DispatchError::MissingDriver);
            }
            if movement.equipment.is_none() {
                return Err(DispatchError::MissingEquipment);
            }
        }

        let order_id = movement.order_id;
        let movement = self
            .movement_mut(&movement_id)
            .expect("existence checked above");
        movement.update_status(status);

        match status {
            Status::InProgress => self.cascade_order_status(order_id, Status::InProgress),
            Status::Completed => {
                tracing::info!(movement_id = %movement_id, "movement completed");
                self.complete_order_if_done(order_id);
            }
            _ => {}
        }

        self.resequence_stops(movement_id);
        Ok(self.movement(&movement_id).expect("still present").clone())
    }

    /// Complete the parent order unless a sibling movement is still in
    /// progress.
    pub(crate) fn complete_order_if_done(&mut self, order_id: Uuid) {
        let Some(order) = self.order(&order_id) else {
            return;
        };
        let any_in_progress = order.movements.iter().any(|id| {
            self.movement(id)
                .is_some_and(|m| m.status == Status::InProgress)
        });
        if !any_in_progress {
            self.cascade_order_status(order_id, Status::Completed);
        }
    }

    /// Restore the stop-sequence invariant after a movement save: if the
    /// sequence numbers are not a contiguous distinct 1..N set, re-assign
    /// them in creation order.
    pub(crate) fn resequence_stops(&mut self, movement_id: Uuid) {
        let Some(movement) = self.movement(&movement_id) else {
            return;
        };
        let stop_ids = movement.stops.clone();
        let mut seen = std::collections::HashSet::new();
        let contiguous = stop_ids
            .iter()
            .filter_map(|id| self.stop(id))
            .all(|stop| {
                stop.sequence >= 1
                    && stop.sequence as usize <= stop_ids.len()
                    && seen.insert(stop.sequence)
            });
        if contiguous && seen.len() == stop_ids.len() {
            return;
        }

        for (index, stop_id) in stop_ids.iter().enumerate() {
            if let Some(stop) = self.stop_mut(stop_id) {
                let sequence = (index + 1) as u32;
                if stop.sequence != sequence {
                    stop.sequence = sequence;
                    stop.updated_at = Utc::now();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DispatchSettings, NewOrder, RateMethod};
    use chrono::Duration;
    use rust_decimal::Decimal;

    struct Fixture {
        manager: DispatchManager,
        order_id: Uuid,
        movement_id: Uuid,
        driver: Uuid,
        driver_2: Uuid,
        equipment: Uuid,
    }

    fn fixture() -> Fixture {
        let mut manager = DispatchManager::new(DispatchSettings::default());
        let origin = manager.register_location("Yard A", "100 First St");
        let destination = manager.register_location("Yard B", "200 Second St");
        let unit = manager.register_equipment("TRK-100");
        let driver = manager.register_driver("R. Alvarez", vec![unit.id]);
        let driver_2 = manager.register_driver("M. Chen", vec![]);

        let t1 = Utc::now();
        let order = manager
            .create_order(NewOrder {
                customer_id: Uuid::new_v4(),
                origin_location: origin.id,
                origin_appointment_time: t1,
                destination_location: destination.id,
                destination_appointment_time: t1 + Duration::hours(4),
                rate_method: RateMethod::Flat,
                freight_charge_amount: Some(Decimal::new(50000, 2)),
                other_charge_amount: None,
                mileage: None,
                bol_number: None,
                consignee_ref_num: None,
            })
            .unwrap();

        Fixture {
            order_id: order.id,
            movement_id: order.movements[0],
            driver: driver.id,
            driver_2: driver_2.id,
            equipment: unit.id,
            manager,
        }
    }

    #[test]
    fn test_assignment_rejects_same_driver_twice() {
        let mut f = fixture();
        let result = f.manager.assign_movement(
            f.movement_id,
            MovementAssignment {
                driver: f.driver,
                driver_2: Some(f.driver),
                equipment: None,
            },
        );
        assert!(matches!(result, Err(DispatchError::SameDriver)));
    }

    #[test]
    fn test_assignment_auto_populates_equipment_from_driver() {
        let mut f = fixture();
        let movement = f
            .manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver,
                    driver_2: Some(f.driver_2),
                    equipment: None,
                },
            )
            .unwrap();
        assert_eq!(movement.equipment, Some(f.equipment));
    }

    #[test]
    fn test_assignment_keeps_explicit_equipment() {
        let mut f = fixture();
        let other_unit = f.manager.register_equipment("TRK-200");
        let movement = f
            .manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver,
                    driver_2: None,
                    equipment: Some(other_unit.id),
                },
            )
            .unwrap();
        assert_eq!(movement.equipment, Some(other_unit.id));
    }

    #[test]
    fn test_in_progress_requires_driver_and_equipment() {
        let mut f = fixture();
        assert!(matches!(
            f.manager.set_movement_status(f.movement_id, Status::InProgress),
            Err(DispatchError::MissingDriver)
        ));

        // A driver with no associated equipment leaves the movement without
        // a unit, which still blocks the transition.
        f.manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver_2,
                    driver_2: None,
                    equipment: None,
                },
            )
            .unwrap();
        assert!(matches!(
            f.manager.set_movement_status(f.movement_id, Status::InProgress),
            Err(DispatchError::MissingEquipment)
        ));
    }

    #[test]
    fn test_in_progress_propagates_to_order() {
        let mut f = fixture();
        f.manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver,
                    driver_2: None,
                    equipment: None,
                },
            )
            .unwrap();
        f.manager
            .set_movement_status(f.movement_id, Status::InProgress)
            .unwrap();
        assert_eq!(
            f.manager.order(&f.order_id).unwrap().status,
            Status::InProgress
        );
    }

    #[test]
    fn test_backward_transition_is_rejected() {
        let mut f = fixture();
        f.manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver,
                    driver_2: None,
                    equipment: None,
                },
            )
            .unwrap();
        f.manager
            .set_movement_status(f.movement_id, Status::InProgress)
            .unwrap();
        assert!(matches!(
            f.manager.set_movement_status(f.movement_id, Status::Available),
            Err(DispatchError::InvalidTransition {
                from: Status::InProgress,
                to: Status::Available
            })
        ));
    }

    #[test]
    fn test_completion_propagates_when_no_sibling_in_progress() {
        let mut f = fixture();
        f.manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver,
                    driver_2: None,
                    equipment: None,
                },
            )
            .unwrap();
        f.manager
            .set_movement_status(f.movement_id, Status::InProgress)
            .unwrap();
        f.manager
            .set_movement_status(f.movement_id, Status::Completed)
            .unwrap();
        assert_eq!(
            f.manager.order(&f.order_id).unwrap().status,
            Status::Completed
        );
    }

    #[test]
    fn test_resequencing_restores_contiguous_sequences() {
        let mut f = fixture();
        // Corrupt the sequences: both stops claim position 5.
        let stop_ids: Vec<Uuid> = f
            .manager
            .stops_for_movement(&f.movement_id)
            .iter()
            .map(|s| s.id)
            .collect();
        for stop_id in &stop_ids {
            f.manager.stop_mut(stop_id).unwrap().sequence = 5;
        }

        f.manager
            .assign_movement(
                f.movement_id,
                MovementAssignment {
                    driver: f.driver,
                    driver_2: None,
                    equipment: None,
                },
            )
            .unwrap();

        let sequences: Vec<u32> = f
            .manager
            .stops_for_movement(&f.movement_id)
            .iter()
            .map(|s| s.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }
}
