// Domain Layer - Poses, trajectories, plans and operating parameters

pub mod config;
pub mod error;
pub mod plan;
pub mod pose;
pub mod report;
pub mod side;
pub mod trajectory;

// Re-exports
pub use config::{OperatingConfig, Robot};
pub use error::DomainError;
pub use plan::{ExecutionPlan, Phase, PlanId, PlanStep, SequencerState};
pub use pose::{AxisAngle, CartesianPose, HomePose, Orientation, Position, Waypoint};
pub use report::WaypointReport;
pub use side::{ActiveSides, Side};
pub use trajectory::{Trajectory, TrajectoryFeed};
