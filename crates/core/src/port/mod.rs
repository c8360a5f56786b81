// Port Layer - Interfaces for devices and outbound diagnostics

pub mod error;
pub mod grasp_backend;
pub mod id_provider; // For deterministic testing
pub mod motion_backend;
pub mod report_sink;
pub mod time_provider;

// Re-exports
pub use error::BackendError;
pub use grasp_backend::{
    FingerSelector, GraspBackend, GraspBackendFactory, GraspModel, GraspParams, CLOSE_HAND,
    OPEN_HAND,
};
pub use id_provider::IdProvider;
pub use motion_backend::{ContextToken, MotionBackend, MotionBackendFactory};
pub use report_sink::{ReportSink, TracingReportSink};
pub use time_provider::TimeProvider;
