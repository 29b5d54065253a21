//! CSV Ingestion

use crate::error::DatasetError;
use crate::normalizer::TableNormalizer;
use crate::table::Dataset;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Read a CSV document (first record is the header row)
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(DatasetError::InsufficientData(
            "CSV has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let dataset = TableNormalizer::new().normalize(headers, rows);
    info!(
        "Loaded CSV with {} columns and {} rows",
        dataset.column_count(),
        dataset.row_count()
    );
    Ok(dataset)
}

/// Read a CSV document from bytes
pub fn read_csv_bytes(bytes: &[u8]) -> Result<Dataset, DatasetError> {
    read_csv(bytes)
}

/// Read a CSV file from disk
pub fn read_csv_path<P: AsRef<Path>>(path: P) -> Result<Dataset, DatasetError> {
    let file = std::fs::File::open(path)?;
    read_csv(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RawValue;

    #[test]
    fn test_read_basic_csv() {
        let csv = "Age, Gender ,Dropout\n18,Male,1\n19,Female,0\n";
        let ds = read_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(ds.columns(), &["Age", "Gender", "Dropout"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.rows()[1][1], RawValue::Text("Female".into()));
    }

    #[test]
    fn test_ragged_rows_are_tolerated() {
        let csv = "a,b,c\n1,2\n1,2,3,4\n,,\n";
        let ds = read_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(ds.row_count(), 2);
        assert!(ds.rows()[0][2].is_missing());
        assert_eq!(ds.rows()[1].len(), 3);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(read_csv_bytes(b"").is_err());
    }
}
