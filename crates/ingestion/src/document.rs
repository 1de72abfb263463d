//! Document builder: one alert record in, one retrievable text unit out

use stormwatch_common::errors::{AppError, Result};
use stormwatch_common::models::{AlertRecord, Document, DocumentMetadata};

/// Convert an alert record into a document.
///
/// Fails only when a required column is absent from the record's schema;
/// blank or missing values read as empty strings.
pub fn build_document(record: &AlertRecord) -> Result<Document> {
    let missing = record.missing_required();
    if !missing.is_empty() {
        return Err(AppError::Validation {
            message: format!("Missing required columns: {}", missing.join(", ")),
            field: missing.first().map(|column| column.to_string()),
        });
    }

    let field = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();

    let metadata = DocumentMetadata {
        id: field(&record.id),
        event: field(&record.event),
        severity: field(&record.severity),
        area_desc: field(&record.area_desc),
        urgency: field(&record.urgency),
        certainty: field(&record.certainty),
        headline: field(&record.headline),
    };

    let text = [
        format!("Event: {}", metadata.event),
        format!("Severity: {}", metadata.severity),
        format!("Area: {}", metadata.area_desc),
        format!("Headline: {}", metadata.headline),
        format!("Description: {}", field(&record.description)),
    ]
    .join("\n\n");

    Ok(Document { text, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AlertRecord {
        AlertRecord::from_columns([
            ("id", "A1"),
            ("event", "Winter Storm Watch"),
            ("severity", "Severe"),
            ("areaDesc", "Test County"),
            ("headline", "Test Alert"),
            ("description", "  Heavy snow expected "),
        ])
    }

    #[test]
    fn test_text_layout() {
        let document = build_document(&record()).unwrap();
        assert_eq!(
            document.text,
            "Event: Winter Storm Watch\n\nSeverity: Severe\n\nArea: Test County\n\nHeadline: Test Alert\n\nDescription: Heavy snow expected"
        );
        assert_eq!(document.metadata.id, "A1");
        assert_eq!(document.metadata.area_desc, "Test County");
    }

    #[test]
    fn test_optional_fields_default_to_empty() {
        let document = build_document(&record()).unwrap();
        assert_eq!(document.metadata.urgency, "");
        assert_eq!(document.metadata.certainty, "");
    }

    #[test]
    fn test_empty_required_value_is_allowed() {
        let mut record = record();
        record.headline = Some(String::new());
        let document = build_document(&record).unwrap();
        assert!(document.text.contains("Headline: \n\n"));
    }

    #[test]
    fn test_absent_required_column_fails() {
        let mut record = record();
        record.severity = None;
        assert!(matches!(
            build_document(&record),
            Err(AppError::Validation { .. })
        ));
    }
}
