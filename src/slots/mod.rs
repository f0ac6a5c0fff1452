pub mod models;
pub mod routes;
pub mod schedule;

pub use models::{Slot, SlotState};
