// Simulated Cartesian controller
// Implements: MotionBackend, MotionBackendFactory
//
// Moves take `traj_time * time_scale` seconds and settle within the
// in-target tolerance. Targets outside the reachable sphere never settle.

use async_trait::async_trait;
use nalgebra::Vector3;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use graspexec_core::domain::{CartesianPose, HomePose, Robot, Side};
use graspexec_core::port::{BackendError, ContextToken, MotionBackend, MotionBackendFactory};

/// Default reach of one arm around the shoulder, in meters
pub const DEFAULT_REACH_RADIUS: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ControllerSettings {
    traj_time: f64,
    tolerance: f64,
    /// Translational span granted to the torso, per axis
    torso_span: [f64; 3],
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            traj_time: 3.0,
            tolerance: 0.01,
            torso_span: [0.1; 3],
        }
    }
}

#[derive(Debug)]
struct ControllerState {
    pose: CartesianPose,
    pending: Option<CartesianPose>,
    settings: ControllerSettings,
    contexts: HashMap<u32, ControllerSettings>,
    next_token: u32,
    moves: usize,
    open: bool,
}

/// One simulated arm. Clones share state, so the factory keeps a view on
/// every handle it opened.
#[derive(Clone)]
pub struct SimCartesianController {
    side: Side,
    time_scale: f64,
    reach_radius: f64,
    state: Arc<Mutex<ControllerState>>,
}

impl SimCartesianController {
    pub fn new(side: Side, time_scale: f64, reach_radius: f64) -> Self {
        let rest = match side {
            Side::Right => HomePose::RIGHT_DEFAULT,
            Side::Left => HomePose::LEFT_DEFAULT,
        };
        Self {
            side,
            time_scale,
            reach_radius,
            state: Arc::new(Mutex::new(ControllerState {
                pose: rest.waypoint().target(),
                pending: None,
                settings: ControllerSettings::default(),
                contexts: HashMap::new(),
                next_token: 1,
                moves: 0,
                open: true,
            })),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Last settled pose
    pub fn pose(&self) -> CartesianPose {
        self.lock()
            .map(|s| s.pose)
            .unwrap_or_else(|_| CartesianPose::new([0.0; 3], [0.0, 0.0, 1.0, 0.0]))
    }

    pub fn trajectory_time(&self) -> f64 {
        self.lock().map(|s| s.settings.traj_time).unwrap_or_default()
    }

    pub fn tolerance(&self) -> f64 {
        self.lock().map(|s| s.settings.tolerance).unwrap_or_default()
    }

    /// True while the torso translational span is clamped to zero
    pub fn is_restricted(&self) -> bool {
        self.lock()
            .map(|s| s.settings.torso_span == [0.0; 3])
            .unwrap_or_default()
    }

    /// Contexts saved and not yet restored
    pub fn saved_contexts(&self) -> usize {
        self.lock().map(|s| s.contexts.len()).unwrap_or_default()
    }

    /// Moves commanded since open
    pub fn moves(&self) -> usize {
        self.lock().map(|s| s.moves).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ControllerState>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Device(format!("{} controller state poisoned", self.side)))
    }

    /// Lock an open handle
    fn open_state(&self) -> Result<MutexGuard<'_, ControllerState>, BackendError> {
        let state = self.lock()?;
        if !state.open {
            return Err(BackendError::Closed);
        }
        Ok(state)
    }

    fn reachable(&self, target: &CartesianPose) -> bool {
        Vector3::from(target.position).norm() <= self.reach_radius
    }

    fn settle(target: &CartesianPose, tolerance: f64) -> CartesianPose {
        // Per-axis bound keeps the error norm under half the tolerance
        let bound = tolerance / (2.0 * 3f64.sqrt());
        let mut rng = rand::thread_rng();
        let noise = Vector3::new(
            rng.gen_range(-bound..=bound),
            rng.gen_range(-bound..=bound),
            rng.gen_range(-bound..=bound),
        );
        let position = Vector3::from(target.position) + noise;
        CartesianPose::new([position.x, position.y, position.z], target.orientation)
    }
}

#[async_trait]
impl MotionBackend for SimCartesianController {
    async fn set_trajectory_time(&self, secs: f64) -> Result<(), BackendError> {
        self.open_state()?.settings.traj_time = secs;
        Ok(())
    }

    async fn set_in_target_tolerance(&self, tol: f64) -> Result<(), BackendError> {
        self.open_state()?.settings.tolerance = tol;
        Ok(())
    }

    async fn restrict_to_point_to_point(&self) -> Result<(), BackendError> {
        self.open_state()?.settings.torso_span = [0.0; 3];
        Ok(())
    }

    async fn move_to(&self, target: &CartesianPose) -> Result<(), BackendError> {
        let mut state = self.open_state()?;
        state.pending = Some(*target);
        state.moves += 1;
        debug!(side = %self.side, target = ?target.position, "Sim move started");
        Ok(())
    }

    async fn wait_motion_done(&self, timeout: Duration) -> Result<bool, BackendError> {
        let (target, settings) = {
            let state = self.open_state()?;
            match state.pending {
                Some(target) => (target, state.settings),
                None => return Ok(true),
            }
        };

        let travel = Duration::from_secs_f64((settings.traj_time * self.time_scale).max(0.0));
        if !self.reachable(&target) {
            tokio::time::sleep(timeout.min(travel)).await;
            warn!(side = %self.side, target = ?target.position, "Sim target out of reach");
            return Ok(false);
        }
        if travel > timeout {
            tokio::time::sleep(timeout).await;
            return Ok(false);
        }
        tokio::time::sleep(travel).await;

        let mut state = self.open_state()?;
        // A stop during travel leaves the arm where it was
        if state.pending != Some(target) {
            return Ok(false);
        }
        state.pose = Self::settle(&target, settings.tolerance);
        state.pending = None;
        Ok(true)
    }

    async fn current_pose(&self) -> Result<CartesianPose, BackendError> {
        Ok(self.open_state()?.pose)
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.open_state()?.pending = None;
        Ok(())
    }

    async fn save_context(&self) -> Result<ContextToken, BackendError> {
        let mut state = self.open_state()?;
        let token = state.next_token;
        state.next_token += 1;
        let settings = state.settings;
        state.contexts.insert(token, settings);
        Ok(ContextToken(token))
    }

    async fn restore_context(&self, token: ContextToken) -> Result<(), BackendError> {
        let mut state = self.open_state()?;
        let settings = state
            .contexts
            .remove(&token.0)
            .ok_or_else(|| BackendError::Device(format!("unknown context {}", token.0)))?;
        state.settings = settings;
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        let mut state = self.open_state()?;
        state.open = false;
        state.pending = None;
        info!(side = %self.side, "Sim controller closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().map(|s| s.open).unwrap_or_default()
    }
}

/// Opens simulated controllers. Only the simulator robot is served.
pub struct SimMotionFactory {
    time_scale: f64,
    reach_radius: f64,
    offline: HashSet<Side>,
    opened: Mutex<HashMap<Side, SimCartesianController>>,
}

impl SimMotionFactory {
    pub fn new() -> Self {
        Self {
            time_scale: 1.0,
            reach_radius: DEFAULT_REACH_RADIUS,
            offline: HashSet::new(),
            opened: Mutex::new(HashMap::new()),
        }
    }

    /// Scale applied to trajectory times; 0 makes moves instantaneous
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    pub fn with_reach_radius(mut self, radius: f64) -> Self {
        self.reach_radius = radius;
        self
    }

    /// Opening this side fails as if its controller were not running
    pub fn with_offline(mut self, side: Side) -> Self {
        self.offline.insert(side);
        self
    }

    /// Controller last opened for `side`
    pub fn controller(&self, side: Side) -> Option<SimCartesianController> {
        self.opened.lock().ok()?.get(&side).cloned()
    }
}

impl Default for SimMotionFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionBackendFactory for SimMotionFactory {
    async fn open(&self, robot: Robot, side: Side) -> Result<Box<dyn MotionBackend>, BackendError> {
        let port = format!("/{}/cartesianController/{}", robot, side.arm_part());
        if robot != Robot::IcubSim || self.offline.contains(&side) {
            return Err(BackendError::Unavailable(format!("{} not running", port)));
        }

        let controller = SimCartesianController::new(side, self.time_scale, self.reach_radius);
        self.opened
            .lock()
            .map_err(|_| BackendError::Device("sim factory state poisoned".into()))?
            .insert(side, controller.clone());

        info!(side = %side, port = %port, "Sim controller opened");
        Ok(Box::new(controller))
    }
}
