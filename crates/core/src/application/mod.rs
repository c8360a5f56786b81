// Application Layer - Use Cases and Sequencing

pub mod abort;
pub mod config;
pub mod constants;
pub mod executor;
pub mod motion;
pub mod pose_store;
pub mod runner;
pub mod sequencer;
pub mod side_context;

// Re-exports
pub use abort::{abort_channel, AbortHandle, AbortToken};
pub use config::{resolve, to_options};
pub use executor::{ExecutorPorts, GraspExecutor, GraspSettings};
pub use pose_store::{PlanInputs, PoseStore};
pub use runner::{RunOutcome, SequenceRunner};
pub use sequencer::{ExecutionCursor, HandEvent, Sequencer};
pub use side_context::SideContext;
