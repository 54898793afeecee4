//! Bulk-upload parsing for historical submissions. Accepts a CSV file
//! (header row, quoted fields) or a JSON array of records; rows are
//! validated individually so one bad row never sinks the upload.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Json,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unsupported file type. Please upload CSV or JSON.")]
    UnsupportedFileType,
    #[error("File is not valid UTF-8")]
    Encoding,
    #[error("CSV parsing error: {0}")]
    Csv(String),
    #[error("JSON file must contain an array of submission objects.")]
    NotAnArray,
    #[error("JSON parsing error: {0}")]
    Json(String),
}

/// A record that passed row-level validation, ready for insertion once
/// its focus group name is resolved.
#[derive(Debug, PartialEq)]
pub struct ParsedRow {
    pub anonymous_user_id: Option<Uuid>,
    pub focus_group: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub overall_mood: Option<i16>,
    pub positive_aspects: Vec<String>,
    pub negative_aspects: Vec<String>,
    pub hours_worked: Option<f64>,
    pub did_not_work: bool,
    pub comment: Option<String>,
    pub region: String,
}

pub fn detect_format(
    filename: &str,
    content_type: Option<&str>,
) -> Result<UploadFormat, ImportError> {
    let content_type = content_type.unwrap_or("");
    if content_type == "text/csv" || filename.ends_with(".csv") {
        Ok(UploadFormat::Csv)
    } else if content_type == "application/json" || filename.ends_with(".json") {
        Ok(UploadFormat::Json)
    } else {
        Err(ImportError::UnsupportedFileType)
    }
}

/// Decode the uploaded bytes into one JSON object per record. CSV rows
/// become objects keyed by the header row, all values strings.
pub fn parse_upload(format: UploadFormat, bytes: &[u8]) -> Result<Vec<Value>, ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ImportError::Encoding)?;
    match format {
        UploadFormat::Csv => parse_csv(text),
        UploadFormat::Json => {
            let value: Value =
                serde_json::from_str(text).map_err(|e| ImportError::Json(e.to_string()))?;
            match value {
                Value::Array(records) => Ok(records),
                _ => Err(ImportError::NotAnArray),
            }
        }
    }
}

fn parse_csv(text: &str) -> Result<Vec<Value>, ImportError> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header_line)) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers = split_csv_line(header_line)
        .map_err(|e| ImportError::Csv(format!("header: {e}")))?;

    let mut records = Vec::new();
    for (line_no, line) in lines {
        let fields =
            split_csv_line(line).map_err(|e| ImportError::Csv(format!("line {}: {e}", line_no + 1)))?;
        let mut object = serde_json::Map::new();
        for (header, field) in headers.iter().zip(fields) {
            object.insert(header.clone(), Value::String(field));
        }
        records.push(Value::Object(object));
    }
    Ok(records)
}

/// One CSV line into fields. Supports quoted fields with embedded commas
/// and doubled-quote escapes.
fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        current.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => current.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

fn field<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| record.get(k)).filter(|v| !v.is_null())
}

fn string_field(record: &Value, keys: &[&str]) -> Option<String> {
    field(record, keys)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn aspect_list(record: &Value, keys: &[&str]) -> Vec<String> {
    match field(record, keys) {
        Some(Value::String(raw)) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Row-level validation. Returns a human-readable error string echoing
/// the record so upload responses can surface exactly what was skipped.
pub fn validate_record(record: &Value) -> Result<ParsedRow, String> {
    let Some(focus_group) = string_field(record, &["Focus Group", "focusGroup"]) else {
        return Err(format!("Missing Focus Group for record: {record}"));
    };

    let did_not_work = match field(record, &["Did Not Work", "didNotWork"]) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };

    let overall_mood = if did_not_work {
        None
    } else {
        let mood = match field(record, &["Mood", "overallMood"]) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match mood {
            Some(m) if (1..=5).contains(&m) => Some(m as i16),
            _ => return Err(format!("Invalid Mood value for record: {record}")),
        }
    };

    let hours_worked = if did_not_work {
        None
    } else {
        match field(record, &["Hours Worked", "hoursWorked"]) {
            None => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(value) => {
                let hours = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                match hours {
                    Some(h) if h >= 0.0 => Some(h),
                    _ => {
                        return Err(format!(
                            "Invalid Hours Worked value (must be >= 0) for record: {record}"
                        ))
                    }
                }
            }
        }
    };

    let submitted_at = match string_field(record, &["Timestamp", "timestamp"]) {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => return Err(format!("Invalid Timestamp value for record: {record}")),
        },
        None => None,
    };

    let anonymous_user_id = match string_field(record, &["UserID", "anonymousUserId"]) {
        Some(raw) => match Uuid::parse_str(&raw) {
            Ok(id) => Some(id),
            Err(_) => return Err(format!("Invalid UserID value for record: {record}")),
        },
        None => None,
    };

    let (positive_aspects, negative_aspects) = if did_not_work {
        (Vec::new(), Vec::new())
    } else {
        (
            aspect_list(record, &["Positive Aspects", "positiveAspects"]),
            aspect_list(record, &["Negative Aspects", "negativeAspects"]),
        )
    };

    Ok(ParsedRow {
        anonymous_user_id,
        focus_group,
        submitted_at,
        overall_mood,
        positive_aspects,
        negative_aspects,
        hours_worked,
        did_not_work,
        comment: string_field(record, &["Comment", "comment"]),
        region: string_field(record, &["Region", "region"])
            .unwrap_or_else(|| "UPLOADED".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_parses_headers_and_quoted_fields() {
        let csv = "Focus Group,Mood,Positive Aspects,Comment\n\
                   Operations,4,\"Team, Clients\",\"said \"\"thanks\"\"\"\n\
                   \n\
                   Sales,2,,\n";
        let records = parse_upload(UploadFormat::Csv, csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Focus Group"], "Operations");
        assert_eq!(records[0]["Positive Aspects"], "Team, Clients");
        assert_eq!(records[0]["Comment"], "said \"thanks\"");
        assert_eq!(records[1]["Focus Group"], "Sales");
    }

    #[test]
    fn csv_rejects_unterminated_quote() {
        let csv = "Focus Group,Mood\n\"Operations,4\n";
        assert!(matches!(
            parse_upload(UploadFormat::Csv, csv.as_bytes()),
            Err(ImportError::Csv(_))
        ));
    }

    #[test]
    fn json_must_be_an_array() {
        assert!(matches!(
            parse_upload(UploadFormat::Json, b"{\"focusGroup\": \"IT\"}"),
            Err(ImportError::NotAnArray)
        ));
        let records = parse_upload(UploadFormat::Json, b"[{\"focusGroup\": \"IT\"}]").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn detect_format_by_name_and_type() {
        assert_eq!(detect_format("x.csv", None).unwrap(), UploadFormat::Csv);
        assert_eq!(
            detect_format("upload", Some("text/csv")).unwrap(),
            UploadFormat::Csv
        );
        assert_eq!(detect_format("x.json", None).unwrap(), UploadFormat::Json);
        assert!(matches!(
            detect_format("x.xlsx", Some("application/zip")),
            Err(ImportError::UnsupportedFileType)
        ));
    }

    #[test]
    fn valid_row_parses_aspects_and_defaults_region() {
        let record = json!({
            "Focus Group": "Operations",
            "Mood": "4",
            "Hours Worked": "38.5",
            "Positive Aspects": "Team, Projects",
            "Negative Aspects": "Workload",
        });
        let row = validate_record(&record).unwrap();
        assert_eq!(row.focus_group, "Operations");
        assert_eq!(row.overall_mood, Some(4));
        assert_eq!(row.hours_worked, Some(38.5));
        assert_eq!(row.positive_aspects, vec!["Team", "Projects"]);
        assert_eq!(row.negative_aspects, vec!["Workload"]);
        assert_eq!(row.region, "UPLOADED");
        assert!(!row.did_not_work);
    }

    #[test]
    fn missing_group_and_bad_mood_are_row_errors() {
        let err = validate_record(&json!({ "Mood": "4" })).unwrap_err();
        assert!(err.contains("Missing Focus Group"));

        let err = validate_record(&json!({ "Focus Group": "IT", "Mood": "7" })).unwrap_err();
        assert!(err.contains("Invalid Mood"));

        let err = validate_record(&json!({ "Focus Group": "IT" })).unwrap_err();
        assert!(err.contains("Invalid Mood"));
    }

    #[test]
    fn did_not_work_skips_metric_validation() {
        let record = json!({
            "Focus Group": "IT",
            "Did Not Work": "TRUE",
            "Positive Aspects": "Team",
        });
        let row = validate_record(&record).unwrap();
        assert!(row.did_not_work);
        assert!(row.overall_mood.is_none());
        assert!(row.hours_worked.is_none());
        assert!(row.positive_aspects.is_empty());
    }

    #[test]
    fn negative_hours_rejected() {
        let record = json!({ "Focus Group": "IT", "Mood": 3, "Hours Worked": -2 });
        let err = validate_record(&record).unwrap_err();
        assert!(err.contains("Invalid Hours Worked"));
    }

    #[test]
    fn timestamps_and_user_ids_validated() {
        let record = json!({
            "Focus Group": "IT",
            "Mood": 3,
            "Timestamp": "2026-01-05T10:00:00Z",
            "UserID": "8f14e45f-ceea-467f-9b5d-1a2b3c4d5e6f",
        });
        let row = validate_record(&record).unwrap();
        assert!(row.submitted_at.is_some());
        assert!(row.anonymous_user_id.is_some());

        let record = json!({ "Focus Group": "IT", "Mood": 3, "Timestamp": "yesterday" });
        assert!(validate_record(&record).unwrap_err().contains("Invalid Timestamp"));

        let record = json!({ "Focus Group": "IT", "Mood": 3, "UserID": "nope" });
        assert!(validate_record(&record).unwrap_err().contains("Invalid UserID"));
    }
}
