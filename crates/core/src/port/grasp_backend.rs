// Grasp Backend Port
// Abstraction over one hand's action-primitives layer

use crate::domain::Side;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::BackendError;

/// Hand sequence closing the fingers around the object
pub const CLOSE_HAND: &str = "close_hand";

/// Hand sequence opening the fingers
pub const OPEN_HAND: &str = "open_hand";

/// Parameters handed to the action-primitives layer when it is opened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraspParams {
    #[serde(default)]
    pub part: String,
    #[serde(default)]
    pub grasp_model_file: Option<String>,
    /// Any other key/value forwarded untouched to the device
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GraspParams {
    /// Copy bound to one arm with its own grasp model file
    pub fn for_side(&self, side: Side, model_file: Option<&str>) -> Self {
        Self {
            part: side.arm_part().to_string(),
            grasp_model_file: model_file
                .map(str::to_string)
                .or_else(|| self.grasp_model_file.clone()),
            extra: self.extra.clone(),
        }
    }

    /// Side named by `part`, if it is an arm part
    pub fn side(&self) -> Option<Side> {
        match self.part.as_str() {
            "right_arm" => Some(Side::Right),
            "left_arm" => Some(Side::Left),
            _ => None,
        }
    }
}

/// Fingers to calibrate; the configure protocol always calibrates the whole hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerSelector {
    All,
}

impl FingerSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerSelector::All => "all",
        }
    }
}

/// Perception model used to detect contact while grasping
#[async_trait]
pub trait GraspModel: Send + Sync {
    fn is_calibrated(&self) -> bool;

    async fn calibrate(&self, fingers: FingerSelector) -> Result<(), BackendError>;
}

/// Hand-action handle for one side
#[async_trait]
pub trait GraspBackend: Send + Sync {
    /// Names of the available hand sequences (diagnostic only)
    fn hand_sequence_keys(&self) -> Vec<String>;

    /// Grasp model, if the device was configured with one
    fn model(&self) -> Option<Arc<dyn GraspModel>>;

    /// Queue a named hand sequence
    async fn push_action(&self, name: &str) -> Result<(), BackendError>;

    /// Block until queued actions are done; false if they did not complete
    async fn wait_actions_done(&self) -> Result<bool, BackendError>;

    async fn close(&self) -> Result<(), BackendError>;

    fn is_open(&self) -> bool;
}

/// Opens grasp backends
#[async_trait]
pub trait GraspBackendFactory: Send + Sync {
    /// # Errors
    /// - BackendError::InvalidModel if the device rejects the parameters
    /// - BackendError::Unavailable if the hand cannot be reached
    async fn open(&self, params: &GraspParams) -> Result<Box<dyn GraspBackend>, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Grasp model state the mock hand is opened with
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ModelSetup {
        Missing,
        Uncalibrated,
        Calibrated,
    }

    pub struct MockGraspModel {
        calibrations: Mutex<Vec<FingerSelector>>,
        calibrated: Mutex<bool>,
    }

    impl MockGraspModel {
        pub fn new(calibrated: bool) -> Self {
            Self {
                calibrations: Mutex::new(Vec::new()),
                calibrated: Mutex::new(calibrated),
            }
        }

        pub fn calibrations(&self) -> Vec<FingerSelector> {
            self.calibrations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraspModel for MockGraspModel {
        fn is_calibrated(&self) -> bool {
            *self.calibrated.lock().unwrap()
        }
        async fn calibrate(&self, fingers: FingerSelector) -> Result<(), BackendError> {
            self.calibrations.lock().unwrap().push(fingers);
            *self.calibrated.lock().unwrap() = true;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct MockGraspState {
        actions: Vec<String>,
        failing_actions: usize,
        last_action_failed: bool,
        open: bool,
    }

    /// Mock hand. Clones share state.
    #[derive(Clone)]
    pub struct MockGraspBackend {
        state: Arc<Mutex<MockGraspState>>,
        model: Option<Arc<MockGraspModel>>,
    }

    impl MockGraspBackend {
        pub fn new(setup: ModelSetup) -> Self {
            let model = match setup {
                ModelSetup::Missing => None,
                ModelSetup::Uncalibrated => Some(Arc::new(MockGraspModel::new(false))),
                ModelSetup::Calibrated => Some(Arc::new(MockGraspModel::new(true))),
            };
            Self {
                state: Arc::new(Mutex::new(MockGraspState::default())),
                model,
            }
        }

        /// Actions pushed so far
        pub fn actions(&self) -> Vec<String> {
            self.state.lock().unwrap().actions.clone()
        }

        /// The next `n` actions report not completed
        pub fn fail_next_actions(&self, n: usize) {
            self.state.lock().unwrap().failing_actions = n;
        }

        pub fn mock_model(&self) -> Option<Arc<MockGraspModel>> {
            self.model.clone()
        }

        fn mark_open(&self) {
            self.state.lock().unwrap().open = true;
        }
    }

    #[async_trait]
    impl GraspBackend for MockGraspBackend {
        fn hand_sequence_keys(&self) -> Vec<String> {
            vec![OPEN_HAND.to_string(), CLOSE_HAND.to_string()]
        }
        fn model(&self) -> Option<Arc<dyn GraspModel>> {
            self.model.clone().map(|m| m as Arc<dyn GraspModel>)
        }
        async fn push_action(&self, name: &str) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            if !state.open {
                return Err(BackendError::Closed);
            }
            state.actions.push(name.to_string());
            if state.failing_actions > 0 {
                state.failing_actions -= 1;
                state.last_action_failed = true;
            } else {
                state.last_action_failed = false;
            }
            Ok(())
        }
        async fn wait_actions_done(&self) -> Result<bool, BackendError> {
            let state = self.state.lock().unwrap();
            if !state.open {
                return Err(BackendError::Closed);
            }
            Ok(!state.last_action_failed)
        }
        async fn close(&self) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            if !state.open {
                return Err(BackendError::Closed);
            }
            state.open = false;
            Ok(())
        }
        fn is_open(&self) -> bool {
            self.state.lock().unwrap().open
        }
    }

    /// Mock factory holding one hand per side, selected by `part`
    pub struct MockGraspFactory {
        backends: HashMap<Side, MockGraspBackend>,
        rejected: HashSet<Side>,
        opened: Mutex<Vec<GraspParams>>,
    }

    impl MockGraspFactory {
        /// Both hands with an uncalibrated model
        pub fn new() -> Self {
            Self {
                backends: [Side::Right, Side::Left]
                    .into_iter()
                    .map(|s| (s, MockGraspBackend::new(ModelSetup::Uncalibrated)))
                    .collect(),
                rejected: HashSet::new(),
                opened: Mutex::new(Vec::new()),
            }
        }

        pub fn with_model(mut self, side: Side, setup: ModelSetup) -> Self {
            self.backends.insert(side, MockGraspBackend::new(setup));
            self
        }

        /// Opening this side fails with an invalid model
        pub fn rejecting(mut self, side: Side) -> Self {
            self.rejected.insert(side);
            self
        }

        pub fn backend(&self, side: Side) -> MockGraspBackend {
            self.backends[&side].clone()
        }

        /// Parameters passed to every successful or failed open
        pub fn opened_params(&self) -> Vec<GraspParams> {
            self.opened.lock().unwrap().clone()
        }
    }

    impl Default for MockGraspFactory {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl GraspBackendFactory for MockGraspFactory {
        async fn open(&self, params: &GraspParams) -> Result<Box<dyn GraspBackend>, BackendError> {
            self.opened.lock().unwrap().push(params.clone());
            let side = params
                .side()
                .ok_or_else(|| BackendError::InvalidModel(format!("unknown part '{}'", params.part)))?;
            if self.rejected.contains(&side) {
                return Err(BackendError::InvalidModel(format!("{} hand rejected", side)));
            }
            let backend = self.backend(side);
            backend.mark_open();
            Ok(Box::new(backend))
        }
    }
}
