//! Shared wiring for the end-to-end tests: executor over instant simulated devices
#![allow(dead_code)]

use graspexec_core::application::{ExecutorPorts, GraspExecutor, GraspSettings};
use graspexec_core::domain::TrajectoryFeed;
use graspexec_core::port::id_provider::UuidProvider;
use graspexec_core::port::report_sink::mocks::CollectingReportSink;
use graspexec_core::port::time_provider::SystemTimeProvider;
use graspexec_core::port::GraspParams;
use graspexec_infra_sim::{SimGraspFactory, SimMotionFactory};
use serde_json::Value;
use std::sync::Arc;

pub struct SimRig {
    pub executor: GraspExecutor,
    pub motion: Arc<SimMotionFactory>,
    pub hands: Arc<SimGraspFactory>,
    pub reports: Arc<CollectingReportSink>,
}

/// Moves and hand actions complete without waiting
pub fn instant_motion() -> SimMotionFactory {
    SimMotionFactory::new().with_time_scale(0.0)
}

pub fn instant_hands() -> SimGraspFactory {
    SimGraspFactory::new().with_time_scale(0.0)
}

pub fn sim_rig(motion: SimMotionFactory, hands: SimGraspFactory, grasp: bool) -> SimRig {
    let motion = Arc::new(motion);
    let hands = Arc::new(hands);
    let reports = Arc::new(CollectingReportSink::new());

    let ports = ExecutorPorts {
        motion: motion.clone(),
        grasp: Some(hands.clone()),
        reports: reports.clone(),
        time_provider: Arc::new(SystemTimeProvider),
        id_provider: Arc::new(UuidProvider),
    };
    let settings = if grasp {
        GraspSettings {
            model_file_right: Some("grasp_model_right.ini".to_string()),
            model_file_left: Some("grasp_model_left.ini".to_string()),
            ..GraspSettings::enabled(GraspParams::default())
        }
    } else {
        GraspSettings::disabled()
    };

    SimRig {
        executor: GraspExecutor::new(ports, settings),
        motion,
        hands,
        reports,
    }
}

pub fn feed(value: Value) -> TrajectoryFeed {
    TrajectoryFeed::from_value(value).unwrap()
}
