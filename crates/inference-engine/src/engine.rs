//! Inference Engine Implementation

use crate::predictor::{predictor_for, Predictor, PredictorOutput};
use crate::InferenceError;
use dataset::RawValue;
use feature_engine::{EncodingFallback, TaskKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};
use training_engine::{ModelArtifact, PredictedValue};
use uuid::Uuid;

/// Prediction produced from one raw row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Artifact that produced the prediction
    pub model_id: Uuid,
    /// Predicted target value in its original form
    pub value: PredictedValue,
    /// Probability of the predicted class; None for regression
    pub confidence: Option<f64>,
    pub target_name: String,
    pub task: TaskKind,
    /// Encoded features the model saw
    pub input_vector: BTreeMap<String, f64>,
    /// Defaults taken while encoding the row
    pub fallbacks: Vec<EncodingFallback>,
}

/// Result of inference operation
#[derive(Debug, Clone)]
pub struct InferenceResult {
    /// The prediction
    pub prediction: Prediction,
    /// Inference latency in milliseconds
    pub latency_ms: u64,
}

/// Decoded predictors kept by default
pub const DEFAULT_PREDICTOR_CACHE: usize = 64;

/// Predictor over stored artifacts
///
/// Artifacts are immutable, so the predictor decoded for an id is reused
/// until it falls out of the bounded cache.
pub struct InferenceEngine {
    predictors: Mutex<VecDeque<(Uuid, Arc<dyn Predictor>)>>,
    capacity: usize,
}

impl fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("cached", &self.cached_predictors())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PREDICTOR_CACHE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            predictors: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of decoded predictors currently held
    pub fn cached_predictors(&self) -> usize {
        self.predictors.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Cached predictor for the artifact, decoding it on first use
    fn predictor(&self, artifact: &ModelArtifact) -> Result<Arc<dyn Predictor>, InferenceError> {
        if let Ok(cache) = self.predictors.lock() {
            if let Some((_, predictor)) = cache.iter().find(|(id, _)| *id == artifact.id) {
                return Ok(Arc::clone(predictor));
            }
        }

        let predictor: Arc<dyn Predictor> = Arc::from(predictor_for(artifact)?);
        if let Ok(mut cache) = self.predictors.lock() {
            if !cache.iter().any(|(id, _)| *id == artifact.id) {
                while cache.len() >= self.capacity {
                    cache.pop_front();
                }
                cache.push_back((artifact.id, Arc::clone(&predictor)));
                debug!("Cached predictor for model {}", artifact.id);
            }
        }
        Ok(predictor)
    }

    /// Predict the target for a raw row with the given artifact
    ///
    /// The row is encoded with the artifact's frozen feature order and
    /// encoders; bad cell content never fails the prediction.
    pub fn predict(
        &self,
        artifact: &ModelArtifact,
        row: &BTreeMap<String, RawValue>,
    ) -> Result<InferenceResult, InferenceError> {
        let start = Instant::now();

        let predictor = self.predictor(artifact)?;
        let encoded = artifact.encoding_table().apply(row);
        if !encoded.fallbacks.is_empty() {
            warn!(
                "Prediction with model {} used {} encoding fallbacks",
                artifact.id,
                encoded.fallbacks.len()
            );
        }

        let (value, confidence) = match predictor.predict(&encoded.values)? {
            PredictorOutput::Value(v) => (PredictedValue::Number(v), None),
            PredictorOutput::Class { index, confidence } => {
                (artifact.class_value(index), Some(confidence.clamp(0.0, 1.0)))
            }
        };

        let input_vector = artifact
            .feature_order
            .iter()
            .cloned()
            .zip(encoded.values.iter().copied())
            .collect();

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!("Inference completed in {}ms", latency_ms);

        Ok(InferenceResult {
            prediction: Prediction {
                model_id: artifact.id,
                value,
                confidence,
                target_name: artifact.target_name.clone(),
                task: artifact.task,
                input_vector,
                fallbacks: encoded.fallbacks,
            },
            latency_ms,
        })
    }
}
