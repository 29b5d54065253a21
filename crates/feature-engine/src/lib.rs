//! Feature Engineering Engine
//!
//! Turns a normalized dataset into a numeric matrix: task inference, target
//! and feature encoding, leakage stripping and imbalance weighting.

mod encoder;
mod error;
mod leakage;
mod statistics;
mod target;
mod task;
mod weights;

pub use encoder::{
    ColumnDescriptor, ColumnKind, EncodedRow, EncodingFallback, EncodingTable, FallbackReason,
    FeatureEncoder, FeatureMatrix,
};
pub use error::FeatureError;
pub use leakage::{LeakageGuard, LeakageReport};
pub use statistics::{numeric_values, safe_mean, ColumnChart, LabelDistribution, BUCKET_LABELS};
pub use target::{EncodedTarget, TargetClasses};
pub use task::{TaskDescriptor, TaskInferencer, TaskKind, MAX_CLASSIFICATION_CARDINALITY};
pub use weights::ImbalanceWeighter;
