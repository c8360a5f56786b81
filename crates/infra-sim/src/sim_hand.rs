// Simulated hand-action layer
// Implements: GraspBackend, GraspBackendFactory, GraspModel

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use graspexec_core::domain::Side;
use graspexec_core::port::{
    BackendError, FingerSelector, GraspBackend, GraspBackendFactory, GraspModel, GraspParams,
    CLOSE_HAND, OPEN_HAND,
};

/// Hand sequences known to the simulated hand
pub const HAND_SEQUENCES: [&str; 3] = [OPEN_HAND, CLOSE_HAND, "karate_hand"];

/// Nominal duration of one hand sequence
pub const ACTION_DURATION: Duration = Duration::from_millis(800);

/// Tactile grasp model of a simulated hand
#[derive(Debug, Default)]
pub struct SimGraspModel {
    calibrated: AtomicBool,
    calibrations: Mutex<Vec<FingerSelector>>,
}

impl SimGraspModel {
    pub fn new(calibrated: bool) -> Self {
        Self {
            calibrated: AtomicBool::new(calibrated),
            calibrations: Mutex::new(Vec::new()),
        }
    }

    /// Finger selections calibrated so far
    pub fn calibrations(&self) -> Vec<FingerSelector> {
        self.calibrations
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraspModel for SimGraspModel {
    fn is_calibrated(&self) -> bool {
        self.calibrated.load(Ordering::SeqCst)
    }

    async fn calibrate(&self, fingers: FingerSelector) -> Result<(), BackendError> {
        self.calibrations
            .lock()
            .map_err(|_| BackendError::Device("grasp model state poisoned".into()))?
            .push(fingers);
        self.calibrated.store(true, Ordering::SeqCst);
        info!(fingers = fingers.as_str(), "Sim grasp model calibrated");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HandState {
    queue: VecDeque<String>,
    performed: Vec<String>,
    open: bool,
}

/// One simulated hand. Clones share state.
#[derive(Clone)]
pub struct SimHandActions {
    side: Side,
    time_scale: f64,
    /// While set, queued actions never complete
    blocked: Arc<AtomicBool>,
    model: Option<Arc<SimGraspModel>>,
    state: Arc<Mutex<HandState>>,
}

impl SimHandActions {
    pub fn new(side: Side, time_scale: f64, model: Option<Arc<SimGraspModel>>) -> Self {
        Self {
            side,
            time_scale,
            blocked: Arc::new(AtomicBool::new(false)),
            model,
            state: Arc::new(Mutex::new(HandState {
                open: true,
                ..HandState::default()
            })),
        }
    }

    /// Sequences completed so far
    pub fn performed(&self) -> Vec<String> {
        self.lock().map(|s| s.performed.clone()).unwrap_or_default()
    }

    /// Make queued actions hang, as with an object slipping out of the hand
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn sim_model(&self) -> Option<Arc<SimGraspModel>> {
        self.model.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandState>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Device(format!("{} hand state poisoned", self.side)))
    }

    fn open_state(&self) -> Result<MutexGuard<'_, HandState>, BackendError> {
        let state = self.lock()?;
        if !state.open {
            return Err(BackendError::Closed);
        }
        Ok(state)
    }
}

#[async_trait]
impl GraspBackend for SimHandActions {
    fn hand_sequence_keys(&self) -> Vec<String> {
        HAND_SEQUENCES.iter().map(|k| k.to_string()).collect()
    }

    fn model(&self) -> Option<Arc<dyn GraspModel>> {
        self.model.clone().map(|m| m as Arc<dyn GraspModel>)
    }

    async fn push_action(&self, name: &str) -> Result<(), BackendError> {
        if !HAND_SEQUENCES.iter().any(|k| *k == name) {
            return Err(BackendError::Device(format!("unknown hand sequence '{}'", name)));
        }
        self.open_state()?.queue.push_back(name.to_string());
        debug!(side = %self.side, action = name, "Sim hand action queued");
        Ok(())
    }

    async fn wait_actions_done(&self) -> Result<bool, BackendError> {
        let pending = self.open_state()?.queue.len();
        let duration = ACTION_DURATION.mul_f64(self.time_scale * pending as f64);
        tokio::time::sleep(duration).await;

        if self.blocked.load(Ordering::SeqCst) {
            self.open_state()?.queue.clear();
            return Ok(false);
        }

        let mut state = self.open_state()?;
        let done: Vec<String> = state.queue.drain(..).collect();
        state.performed.extend(done);
        Ok(true)
    }

    async fn close(&self) -> Result<(), BackendError> {
        let mut state = self.open_state()?;
        state.open = false;
        state.queue.clear();
        info!(side = %self.side, "Sim hand closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().map(|s| s.open).unwrap_or_default()
    }
}

/// Opens simulated hands. The arm comes from `part`; a grasp model is
/// attached whenever a model file is named.
pub struct SimGraspFactory {
    time_scale: f64,
    calibrated: HashSet<Side>,
    opened: Mutex<HashMap<Side, SimHandActions>>,
}

impl SimGraspFactory {
    pub fn new() -> Self {
        Self {
            time_scale: 1.0,
            calibrated: HashSet::new(),
            opened: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    /// Hand on `side` starts with an already calibrated model
    pub fn with_calibrated_model(mut self, side: Side) -> Self {
        self.calibrated.insert(side);
        self
    }

    /// Hand last opened for `side`
    pub fn hand(&self, side: Side) -> Option<SimHandActions> {
        self.opened.lock().ok()?.get(&side).cloned()
    }
}

impl Default for SimGraspFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraspBackendFactory for SimGraspFactory {
    async fn open(&self, params: &GraspParams) -> Result<Box<dyn GraspBackend>, BackendError> {
        let side = params
            .side()
            .ok_or_else(|| BackendError::InvalidModel(format!("unknown part '{}'", params.part)))?;

        let model = match params.grasp_model_file.as_deref() {
            Some("") => {
                return Err(BackendError::InvalidModel("empty grasp model file".into()));
            }
            Some(file) => {
                debug!(side = %side, file, "Loading grasp model");
                Some(Arc::new(SimGraspModel::new(self.calibrated.contains(&side))))
            }
            None => None,
        };

        let hand = SimHandActions::new(side, self.time_scale, model);
        self.opened
            .lock()
            .map_err(|_| BackendError::Device("sim factory state poisoned".into()))?
            .insert(side, hand.clone());

        info!(side = %side, part = %params.part, "Sim hand opened");
        Ok(Box::new(hand))
    }
}
