// GraspExec Infrastructure - Simulated devices
// Implements: MotionBackendFactory, GraspBackendFactory

pub mod sim_controller;
pub mod sim_hand;

pub use sim_controller::{SimCartesianController, SimMotionFactory};
pub use sim_hand::{SimGraspFactory, SimGraspModel, SimHandActions};
