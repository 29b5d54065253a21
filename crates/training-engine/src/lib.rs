//! Training Engine
//!
//! Cross-validated training of linear, logistic and random forest models over
//! encoded tabular data, producing immutable [`ModelArtifact`]s.

mod artifact;
mod config;
mod cross_validation;
mod deadline;
mod error;
mod forest;
mod linalg;
mod linear;
mod logistic;
mod metrics;
mod pipeline;
mod trainer;
mod tree;

pub use artifact::{ModelArtifact, ModelParameters, PredictedValue};
pub use config::EngineConfig;
pub use cross_validation::{CrossValidator, FoldSplit};
pub use deadline::Deadline;
pub use error::TrainingError;
pub use forest::{ForestParams, RandomForest};
pub use linear::LinearRegression;
pub use logistic::{sigmoid, LogisticRegression};
pub use metrics::{balanced_accuracy, r2_score};
pub use pipeline::{TrainingOutcome, TrainingPipeline, TrainingRequest, TrainingSummary};
pub use trainer::{
    balanced_weights, FittedModel, FoldReport, ModelKind, ModelPreference, TrainedModel, Trainer,
};
pub use tree::{DecisionTree, TreeParams};
