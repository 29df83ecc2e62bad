pub mod manager;
pub mod models;
pub mod movement;
pub mod repository;
pub mod stop;

pub use manager::{DispatchError, DispatchManager};
pub use models::{
    DispatchSettings, Movement, MovementAssignment, NewOrder, Order, RateMethod, ServiceIncident,
    Status, Stop, StopType, StopUpdate,
};
pub use repository::DispatchRepository;
