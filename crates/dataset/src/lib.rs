//! Dataset Ingestion and Normalization
//!
//! Reads uploaded CSV tables, classifies cells, and prepares the table for
//! training by resolving the target column.

mod error;
mod normalizer;
mod reader;
mod table;
mod validator;
mod value;

pub use error::DatasetError;
pub use normalizer::TableNormalizer;
pub use reader::{read_csv, read_csv_bytes, read_csv_path};
pub use table::{column_type_of, ColumnType, Dataset};
pub use validator::{TargetSelection, ValidationConfig, Validator};
pub use value::RawValue;
