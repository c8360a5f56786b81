// Motion Backend Port
// Abstraction over one arm's Cartesian pose controller

use crate::domain::{CartesianPose, Robot, Side};
use async_trait::async_trait;
use std::time::Duration;

use super::error::BackendError;

/// Opaque snapshot of a controller's limits and settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(pub u32);

/// Cartesian motion controller handle for one side
///
/// Implementations:
/// - SimCartesianController (infra-sim)
/// - MockMotionBackend (tests)
#[async_trait]
pub trait MotionBackend: Send + Sync {
    /// Point-to-point trajectory time in seconds
    async fn set_trajectory_time(&self, secs: f64) -> Result<(), BackendError>;

    /// Distance under which a target counts as reached
    async fn set_in_target_tolerance(&self, tol: f64) -> Result<(), BackendError>;

    /// Clamp the three translational limits to a zero span so the next
    /// command is a strict point-to-point move
    async fn restrict_to_point_to_point(&self) -> Result<(), BackendError>;

    /// Start a move towards `target`
    async fn move_to(&self, target: &CartesianPose) -> Result<(), BackendError>;

    /// Block until the motion settles or `timeout` elapses.
    /// Returns false when the motion did not complete.
    async fn wait_motion_done(&self, timeout: Duration) -> Result<bool, BackendError>;

    /// Pose currently reached by the end-effector
    async fn current_pose(&self) -> Result<CartesianPose, BackendError>;

    async fn stop(&self) -> Result<(), BackendError>;

    async fn save_context(&self) -> Result<ContextToken, BackendError>;

    async fn restore_context(&self, token: ContextToken) -> Result<(), BackendError>;

    async fn close(&self) -> Result<(), BackendError>;

    fn is_open(&self) -> bool;
}

/// Opens motion backends
#[async_trait]
pub trait MotionBackendFactory: Send + Sync {
    /// # Errors
    /// - BackendError::Unavailable if the controller cannot be reached
    async fn open(&self, robot: Robot, side: Side) -> Result<Box<dyn MotionBackend>, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// Every call made on a mock handle, in order
    #[derive(Debug, Clone, PartialEq)]
    pub enum MotionCall {
        SetTrajectoryTime(f64),
        SetInTargetTolerance(f64),
        Restrict,
        MoveTo(CartesianPose),
        WaitMotionDone,
        CurrentPose,
        Stop,
        SaveContext(ContextToken),
        RestoreContext(ContextToken),
        Close,
    }

    #[derive(Debug)]
    struct MockMotionState {
        calls: Vec<MotionCall>,
        pose: CartesianPose,
        next_token: u32,
        failing_moves: usize,
        unreachable: bool,
        last_move_failed: bool,
        settle_delay: Duration,
        open: bool,
    }

    /// Mock motion backend. Clones share state so tests keep a view on a
    /// handle after it moved into the executor.
    #[derive(Clone)]
    pub struct MockMotionBackend {
        state: Arc<Mutex<MockMotionState>>,
    }

    impl MockMotionBackend {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockMotionState {
                    calls: Vec::new(),
                    pose: CartesianPose::new([0.0; 3], [0.0, 0.0, 1.0, 0.0]),
                    next_token: 1,
                    failing_moves: 0,
                    unreachable: false,
                    last_move_failed: false,
                    settle_delay: Duration::ZERO,
                    open: false,
                })),
            }
        }

        pub fn calls(&self) -> Vec<MotionCall> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }

        /// Targets commanded so far
        pub fn targets(&self) -> Vec<CartesianPose> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    MotionCall::MoveTo(p) => Some(p),
                    _ => None,
                })
                .collect()
        }

        /// The next `n` moves do not settle
        pub fn fail_next_moves(&self, n: usize) {
            self.state.lock().unwrap().failing_moves = n;
        }

        /// Every move fails until reset
        pub fn set_unreachable(&self, unreachable: bool) {
            self.state.lock().unwrap().unreachable = unreachable;
        }

        /// Every wait takes `delay` before reporting
        pub fn set_settle_delay(&self, delay: Duration) {
            self.state.lock().unwrap().settle_delay = delay;
        }

        fn record(&self, call: MotionCall) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            if !state.open {
                return Err(BackendError::Closed);
            }
            state.calls.push(call);
            Ok(())
        }

        fn mark_open(&self) {
            self.state.lock().unwrap().open = true;
        }
    }

    impl Default for MockMotionBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl MotionBackend for MockMotionBackend {
        async fn set_trajectory_time(&self, secs: f64) -> Result<(), BackendError> {
            self.record(MotionCall::SetTrajectoryTime(secs))
        }
        async fn set_in_target_tolerance(&self, tol: f64) -> Result<(), BackendError> {
            self.record(MotionCall::SetInTargetTolerance(tol))
        }
        async fn restrict_to_point_to_point(&self) -> Result<(), BackendError> {
            self.record(MotionCall::Restrict)
        }
        async fn move_to(&self, target: &CartesianPose) -> Result<(), BackendError> {
            self.record(MotionCall::MoveTo(*target))?;
            let mut state = self.state.lock().unwrap();
            if state.failing_moves > 0 {
                state.failing_moves -= 1;
                state.last_move_failed = true;
            } else if state.unreachable {
                state.last_move_failed = true;
            } else {
                state.pose = *target;
                state.last_move_failed = false;
            }
            Ok(())
        }
        async fn wait_motion_done(&self, _timeout: Duration) -> Result<bool, BackendError> {
            self.record(MotionCall::WaitMotionDone)?;
            let delay = self.state.lock().unwrap().settle_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(!self.state.lock().unwrap().last_move_failed)
        }
        async fn current_pose(&self) -> Result<CartesianPose, BackendError> {
            self.record(MotionCall::CurrentPose)?;
            Ok(self.state.lock().unwrap().pose)
        }
        async fn stop(&self) -> Result<(), BackendError> {
            self.record(MotionCall::Stop)
        }
        async fn save_context(&self) -> Result<ContextToken, BackendError> {
            let token = {
                let mut state = self.state.lock().unwrap();
                let token = ContextToken(state.next_token);
                state.next_token += 1;
                token
            };
            self.record(MotionCall::SaveContext(token))?;
            Ok(token)
        }
        async fn restore_context(&self, token: ContextToken) -> Result<(), BackendError> {
            self.record(MotionCall::RestoreContext(token))
        }
        async fn close(&self) -> Result<(), BackendError> {
            self.record(MotionCall::Close)?;
            self.state.lock().unwrap().open = false;
            Ok(())
        }
        fn is_open(&self) -> bool {
            self.state.lock().unwrap().open
        }
    }

    /// Mock factory holding one backend per side
    pub struct MockMotionFactory {
        backends: HashMap<Side, MockMotionBackend>,
        unavailable: Mutex<HashSet<Side>>,
    }

    impl MockMotionFactory {
        pub fn new() -> Self {
            Self {
                backends: [Side::Right, Side::Left]
                    .into_iter()
                    .map(|s| (s, MockMotionBackend::new()))
                    .collect(),
                unavailable: Mutex::new(HashSet::new()),
            }
        }

        pub fn backend(&self, side: Side) -> MockMotionBackend {
            self.backends[&side].clone()
        }

        pub fn make_unavailable(&self, side: Side) {
            self.unavailable.lock().unwrap().insert(side);
        }
    }

    impl Default for MockMotionFactory {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl MotionBackendFactory for MockMotionFactory {
        async fn open(
            &self,
            _robot: Robot,
            side: Side,
        ) -> Result<Box<dyn MotionBackend>, BackendError> {
            if self.unavailable.lock().unwrap().contains(&side) {
                return Err(BackendError::Unavailable(format!("{} arm offline", side)));
            }
            let backend = self.backend(side);
            backend.mark_open();
            Ok(Box::new(backend))
        }
    }
}
