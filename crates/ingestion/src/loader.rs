//! Record loader
//!
//! Reads tabular alert records and checks the header carries every
//! required column before any row is handed to the build.

use crate::errors::{IngestionError, Result};
use std::io::Read;
use std::path::Path;
use stormwatch_common::errors::AppError;
use stormwatch_common::models::{AlertRecord, REQUIRED_COLUMNS};
use tracing::{debug, info, instrument};

/// Load all alert records from a CSV file
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_records(path: &Path) -> Result<Vec<AlertRecord>> {
    if !path.is_file() {
        return Err(IngestionError::FileNotFound(path.display().to_string()));
    }

    let file = std::fs::File::open(path)?;
    let records = read_records(file, &path.display().to_string())?;

    info!(records = records.len(), "Alert records loaded");
    Ok(records)
}

/// Parse alert records from any CSV source. `source` names it in errors.
pub fn read_records<R: Read>(reader: R, source: &str) -> Result<Vec<AlertRecord>> {
    let csv_error = |e: csv::Error| IngestionError::Csv {
        path: source.to_string(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::None)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|header| header.trim() == *column))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation {
            message: format!("Missing required columns: {}", missing.join(", ")),
            field: missing.first().map(|column| column.to_string()),
        }
        .into());
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        // Short rows leave trailing columns empty
        let record = AlertRecord::from_columns(
            headers
                .iter()
                .enumerate()
                .map(|(position, header)| (header.trim(), row.get(position).unwrap_or_default())),
        );
        records.push(record);
    }

    debug!(source, rows = records.len(), "CSV parsed");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "id,event,severity,areaDesc,headline,description,urgency";

    #[test]
    fn test_reads_rows_with_optional_columns() {
        let csv = format!(
            "{}\nA1,Winter Storm Watch,Severe,Test County,Test Alert,Heavy snow expected,Expected\n",
            HEADER
        );
        let records = read_records(csv.as_bytes(), "inline").unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("A1"));
        assert_eq!(records[0].urgency.as_deref(), Some("Expected"));
        assert!(records[0].certainty.is_none());
    }

    #[test]
    fn test_missing_required_column_is_validation_error() {
        let csv = "id,event,severity,areaDesc,headline\nA1,Flood,Minor,X,Y\n";
        let err = read_records(csv.as_bytes(), "inline").unwrap_err();

        match err {
            IngestionError::App(AppError::Validation { message, field }) => {
                assert!(message.contains("description"));
                assert_eq!(field.as_deref(), Some("description"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_row_leaves_trailing_fields_empty() {
        let csv = format!("{}\nA1,Flood,Minor,X,Y,Z\nA2,Heat,Minor,Maricopa,Heat\n", HEADER);
        let records = read_records(csv.as_bytes(), "inline").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description.as_deref(), Some("Z"));
        assert_eq!(records[0].urgency.as_deref(), Some(""));
        assert_eq!(records[1].description.as_deref(), Some(""));
        assert!(records[1].missing_required().is_empty());
    }

    #[test]
    fn test_header_only_yields_no_records() {
        let records = read_records(format!("{}\n", HEADER).as_bytes(), "inline").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(&dir.path().join("alerts.csv")).unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "A1,Flood Warning,Moderate,\"Lee, FL\",Flooding,River rising,Immediate").unwrap();
        writeln!(file, "A2,Heat Advisory,Minor,Maricopa,Heat,Hot,Expected").unwrap();
        drop(file);

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].area_desc.as_deref(), Some("Lee, FL"));
    }
}
