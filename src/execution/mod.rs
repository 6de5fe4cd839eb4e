// Monitoring loop and swap execution policy
pub mod journal;
pub mod monitor;
pub mod retry;

pub use journal::{SwapJournal, SWAP_LOG_TARGET};
pub use monitor::{start, CycleOutcome, MonitorState, PositionMonitor, Providers, SkipReason};
pub use retry::RetryPolicy;
