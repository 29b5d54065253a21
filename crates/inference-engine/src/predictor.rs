//! Model Predictors

use crate::InferenceError;
use training_engine::{sigmoid, ModelArtifact, ModelKind, ModelParameters, RandomForest};
use tracing::debug;

/// Raw model output before mapping back to target labels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredictorOutput {
    /// Regression value
    Value(f64),
    /// Class index with the probability of that class
    Class { index: usize, confidence: f64 },
}

/// Anything that maps an encoded feature vector to an output
pub trait Predictor: Send + Sync {
    fn predict(&self, vector: &[f64]) -> Result<PredictorOutput, InferenceError>;

    /// Number of features the model expects
    fn n_features(&self) -> usize;
}

/// Link applied to a linear score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Identity,
    /// Logistic squash, class 1 at probability ≥ 0.5
    Logistic,
}

/// Dot product plus intercept
#[derive(Debug, Clone, PartialEq)]
pub struct LinearPredictor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub link: Link,
}

impl Predictor for LinearPredictor {
    fn predict(&self, vector: &[f64]) -> Result<PredictorOutput, InferenceError> {
        if vector.len() != self.coefficients.len() {
            return Err(InferenceError::InvalidInputShape {
                expected: self.coefficients.len(),
                actual: vector.len(),
            });
        }

        let score = self
            .coefficients
            .iter()
            .zip(vector)
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.intercept;

        Ok(match self.link {
            Link::Identity => PredictorOutput::Value(score),
            Link::Logistic => {
                let p = sigmoid(score);
                if p >= 0.5 {
                    PredictorOutput::Class {
                        index: 1,
                        confidence: p,
                    }
                } else {
                    PredictorOutput::Class {
                        index: 0,
                        confidence: 1.0 - p,
                    }
                }
            }
        })
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}

/// Decoded random forest
#[derive(Debug, Clone)]
pub struct EnsemblePredictor {
    forest: RandomForest,
}

impl EnsemblePredictor {
    /// Decode a postcard forest blob
    pub fn from_blob(blob: &[u8]) -> Result<Self, InferenceError> {
        let forest = RandomForest::from_bytes(blob)
            .map_err(|e| InferenceError::CorruptArtifact(format!("ensemble blob: {}", e)))?;
        Ok(Self { forest })
    }
}

impl Predictor for EnsemblePredictor {
    fn predict(&self, vector: &[f64]) -> Result<PredictorOutput, InferenceError> {
        if vector.len() != self.forest.n_features() {
            return Err(InferenceError::InvalidInputShape {
                expected: self.forest.n_features(),
                actual: vector.len(),
            });
        }
        let (index, confidence) = self.forest.predict_row(vector);
        Ok(PredictorOutput::Class { index, confidence })
    }

    fn n_features(&self) -> usize {
        self.forest.n_features()
    }
}

/// Build the predictor for an artifact's stored parameters
///
/// Binary artifacts of kind `linear_regression` are squashed through the
/// logistic link like logistic models.
pub fn predictor_for(artifact: &ModelArtifact) -> Result<Box<dyn Predictor>, InferenceError> {
    artifact
        .validate()
        .map_err(|e| InferenceError::CorruptArtifact(e.to_string()))?;

    let predictor: Box<dyn Predictor> = match &artifact.parameters {
        ModelParameters::Linear {
            coefficients,
            intercept,
        } => {
            let link = match artifact.model_kind {
                ModelKind::LogisticRegression => Link::Logistic,
                ModelKind::LinearRegression if artifact.is_binary => Link::Logistic,
                ModelKind::LinearRegression => Link::Identity,
                ModelKind::RandomForest => {
                    return Err(InferenceError::CorruptArtifact(
                        "random forest artifact carries linear parameters".to_string(),
                    ))
                }
            };
            Box::new(LinearPredictor {
                coefficients: coefficients.clone(),
                intercept: *intercept,
                link,
            })
        }
        ModelParameters::Ensemble { blob } => Box::new(EnsemblePredictor::from_blob(blob)?),
    };

    if predictor.n_features() != artifact.feature_order.len() {
        return Err(InferenceError::CorruptArtifact(format!(
            "model expects {} features but the artifact lists {}",
            predictor.n_features(),
            artifact.feature_order.len()
        )));
    }

    debug!("Built {} predictor for artifact {}", artifact.model_kind.as_str(), artifact.id);
    Ok(predictor)
}
