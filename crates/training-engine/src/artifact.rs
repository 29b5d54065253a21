//! Persisted model artifacts

use crate::error::TrainingError;
use crate::trainer::ModelKind;
use chrono::{DateTime, Utc};
use feature_engine::{ColumnDescriptor, EncodingTable, TaskKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Fitted parameters of an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelParameters {
    /// Linear or logistic model
    Linear { coefficients: Vec<f64>, intercept: f64 },
    /// Postcard-encoded random forest
    Ensemble { blob: Vec<u8> },
}

/// A predicted target value in its original form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictedValue {
    Number(f64),
    Label(String),
}

impl std::fmt::Display for PredictedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictedValue::Number(v) => write!(f, "{}", v),
            PredictedValue::Label(s) => f.write_str(s),
        }
    }
}

/// Immutable result of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub id: Uuid,
    pub task: TaskKind,
    pub model_kind: ModelKind,
    pub feature_order: Vec<String>,
    /// Categorical columns only
    pub encoders: BTreeMap<String, ColumnDescriptor>,
    pub target_name: String,
    /// Class labels of a textual classification target
    pub target_classes: Option<Vec<String>>,
    /// Class values of a numeric classification target
    pub class_values: Option<Vec<f64>>,
    pub parameters: ModelParameters,
    pub validation_score: Option<f64>,
    pub is_binary: bool,
    pub rows_used: usize,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ModelArtifact {
    /// Check the structural invariants needed for prediction
    pub fn validate(&self) -> Result<(), TrainingError> {
        if let ModelParameters::Linear { coefficients, intercept } = &self.parameters {
            if coefficients.len() != self.feature_order.len() {
                return Err(TrainingError::InvalidArtifact(format!(
                    "{} coefficients for {} features",
                    coefficients.len(),
                    self.feature_order.len()
                )));
            }
            if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                return Err(TrainingError::InvalidArtifact("non-finite linear parameters".to_string()));
            }
        }
        if let ModelParameters::Ensemble { blob } = &self.parameters {
            if blob.is_empty() {
                return Err(TrainingError::InvalidArtifact("empty ensemble blob".to_string()));
            }
        }

        for (name, descriptor) in &self.encoders {
            if !self.feature_order.contains(name) {
                return Err(TrainingError::InvalidArtifact(format!(
                    "encoder '{}' is not a feature",
                    name
                )));
            }
            if descriptor.name != *name || !descriptor.is_categorical() {
                return Err(TrainingError::InvalidArtifact(format!(
                    "encoder '{}' is not a categorical descriptor for that column",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Encoding table rebuilt from the frozen feature order and encoders
    pub fn encoding_table(&self) -> EncodingTable {
        EncodingTable::from_parts(&self.feature_order, &self.encoders)
    }

    /// Original target value of a class index
    pub fn class_value(&self, index: usize) -> PredictedValue {
        if let Some(label) = self.target_classes.as_ref().and_then(|c| c.get(index)) {
            return PredictedValue::Label(label.clone());
        }
        if let Some(value) = self.class_values.as_ref().and_then(|v| v.get(index)) {
            return PredictedValue::Number(*value);
        }
        PredictedValue::Number(index as f64)
    }

    /// Categorical options per encoded column
    pub fn encoder_classes(&self) -> BTreeMap<String, Vec<String>> {
        self.encoders
            .iter()
            .filter_map(|(name, d)| d.classes().map(|c| (name.clone(), c.to_vec())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_artifact() -> ModelArtifact {
        let mut encoders = BTreeMap::new();
        encoders.insert(
            "Gender".to_string(),
            ColumnDescriptor::categorical("Gender", vec!["Male".into(), "Female".into()]),
        );
        ModelArtifact {
            id: Uuid::new_v4(),
            task: TaskKind::BinaryClassification,
            model_kind: ModelKind::LogisticRegression,
            feature_order: vec!["Age".into(), "Gender".into()],
            encoders,
            target_name: "Dropout".into(),
            target_classes: None,
            class_values: Some(vec![0.0, 1.0]),
            parameters: ModelParameters::Linear {
                coefficients: vec![0.1, -0.4],
                intercept: 0.2,
            },
            validation_score: Some(0.7),
            is_binary: true,
            rows_used: 10,
            owner: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_artifact() {
        assert!(linear_artifact().validate().is_ok());
    }

    #[test]
    fn test_coefficient_length_mismatch() {
        let mut artifact = linear_artifact();
        artifact.parameters = ModelParameters::Linear {
            coefficients: vec![1.0],
            intercept: 0.0,
        };
        assert!(matches!(artifact.validate(), Err(TrainingError::InvalidArtifact(_))));
    }

    #[test]
    fn test_encoder_outside_feature_order() {
        let mut artifact = linear_artifact();
        artifact.feature_order = vec!["Age".into(), "Attendance".into()];
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_class_value_mapping() {
        let mut artifact = linear_artifact();
        assert_eq!(artifact.class_value(1), PredictedValue::Number(1.0));
        artifact.target_classes = Some(vec!["No".into(), "Yes".into()]);
        assert_eq!(artifact.class_value(1), PredictedValue::Label("Yes".into()));
        assert_eq!(artifact.class_value(1).to_string(), "Yes");
    }

    #[test]
    fn test_encoding_table_follows_feature_order() {
        let table = linear_artifact().encoding_table();
        assert_eq!(table.feature_order(), vec!["Age", "Gender"]);
        assert!(table.descriptor("Gender").unwrap().is_categorical());
    }
}
