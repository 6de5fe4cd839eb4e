// Decision core: trailing threshold + position state machine
pub mod position;
pub mod threshold;

pub use position::{decide, initial_position, PositionStateMachine};
pub use threshold::{ThresholdState, ThresholdTracker};
