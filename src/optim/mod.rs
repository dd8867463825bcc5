pub mod adam;
pub mod schedule;

pub use adam::{Adam, OptimizerState};
pub use schedule::{PlateauSchedule, ScheduleDecision};
