//! Alert, document, and chunk models shared by the build and query paths

use serde::{Deserialize, Serialize};

/// Columns every alert table must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = ["id", "event", "severity", "areaDesc", "headline", "description"];

/// Columns passed through when present.
pub const OPTIONAL_COLUMNS: [&str; 8] = [
    "sent",
    "effective",
    "onset",
    "expires",
    "instruction",
    "certainty",
    "urgency",
    "senderName",
];

/// One row of structured alert input.
///
/// `None` means the column is absent from the source schema; `Some("")`
/// means the column exists but the row left it blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: Option<String>,
    pub event: Option<String>,
    pub severity: Option<String>,
    pub certainty: Option<String>,
    pub urgency: Option<String>,
    pub area_desc: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub sender_name: Option<String>,
    pub sent: Option<String>,
    pub effective: Option<String>,
    pub onset: Option<String>,
    pub expires: Option<String>,
}

impl AlertRecord {
    /// Build a record from `(column, value)` pairs. Unknown columns are ignored.
    pub fn from_columns<'a, I>(columns: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut record = AlertRecord::default();
        for (column, value) in columns {
            let value = Some(value.to_string());
            match column {
                "id" => record.id = value,
                "event" => record.event = value,
                "severity" => record.severity = value,
                "certainty" => record.certainty = value,
                "urgency" => record.urgency = value,
                "areaDesc" => record.area_desc = value,
                "headline" => record.headline = value,
                "description" => record.description = value,
                "instruction" => record.instruction = value,
                "senderName" => record.sender_name = value,
                "sent" => record.sent = value,
                "effective" => record.effective = value,
                "onset" => record.onset = value,
                "expires" => record.expires = value,
                _ => {}
            }
        }
        record
    }

    /// Required columns this record's schema does not carry.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let present = [
            self.id.is_some(),
            self.event.is_some(),
            self.severity.is_some(),
            self.area_desc.is_some(),
            self.headline.is_some(),
            self.description.is_some(),
        ];
        REQUIRED_COLUMNS
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(column, _)| *column)
            .collect()
    }
}

/// Fields copied verbatim from the source record for filtering and display.
/// Never used for similarity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub id: String,
    pub event: String,
    pub severity: String,
    pub area_desc: String,
    pub urgency: String,
    pub certainty: String,
    pub headline: String,
}

/// Retrievable text unit derived from exactly one alert record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Contiguous window of a document's text; the unit that is embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Window content
    pub text: String,
    /// Position of this chunk within its document
    pub index: usize,
    /// Character offset of the window start in the document text
    pub start: usize,
    /// Copy of the parent document's metadata
    pub metadata: DocumentMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns_tracks_schema() {
        let record = AlertRecord::from_columns([
            ("id", "A1"),
            ("event", "Winter Storm Watch"),
            ("areaDesc", ""),
            ("unrelated", "ignored"),
        ]);

        assert_eq!(record.id.as_deref(), Some("A1"));
        assert_eq!(record.area_desc.as_deref(), Some(""));
        assert!(record.urgency.is_none());
        assert_eq!(
            record.missing_required(),
            vec!["severity", "headline", "description"]
        );
    }

    #[test]
    fn test_metadata_uses_source_column_names() {
        let metadata = DocumentMetadata {
            id: "A1".into(),
            area_desc: "Test County".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["areaDesc"], "Test County");
    }
}
