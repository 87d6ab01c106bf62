//! Normalization of raw tracker tasks.
//!
//! Absent fields resolve as follows:
//! - `assignee`, `status`, `due_date`: the configured placeholder token
//! - `completed_date`: [`CompletedDate::NotCompleted`]
//!
//! Present but malformed dates are an error, never a placeholder.

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::DEFAULT_PLACEHOLDER;
use crate::error::{TrackerError, TrackerResult};
use crate::model::{CompletedDate, CustomField, NormalizedTask, RawTask, SectionedTask};

/// Name of the custom field holding the request status.
pub const STATUS_FIELD: &str = "Status";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const DISPLAY_FORMAT: &str = "%-d/%-m/%Y";

/// Turns [`RawTask`]s into [`NormalizedTask`]s.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    placeholder: String,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER)
    }
}

impl FieldExtractor {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Normalize one task.
    pub fn extract(&self, raw: &RawTask) -> TrackerResult<NormalizedTask> {
        let status = display_value(STATUS_FIELD, &raw.custom_fields)
            .map_or_else(|| self.placeholder.clone(), str::to_string);

        let assignee = raw
            .assignee
            .as_ref()
            .map_or_else(|| self.placeholder.clone(), |a| a.name.clone());

        let due_date = match raw.due_on.as_deref() {
            Some(due_on) => format_date(due_on)?,
            None => self.placeholder.clone(),
        };

        let completed_date = match raw.completed_at.as_deref() {
            Some(completed_at) => CompletedDate::Completed(format_timestamp(completed_at)?),
            None => CompletedDate::NotCompleted,
        };

        Ok(NormalizedTask {
            client_name: raw.name.clone(),
            status,
            assignee,
            due_date,
            completed_date,
        })
    }

    /// Normalize one task and keep its section for grouping.
    pub fn extract_sectioned(&self, raw: &RawTask) -> TrackerResult<SectionedTask> {
        Ok(SectionedTask {
            section: raw.section_name().map(str::to_string),
            task: self.extract(raw)?,
        })
    }

    /// Normalize a list of tasks, stopping at the first malformed one.
    pub fn extract_all(&self, raws: &[RawTask]) -> TrackerResult<Vec<NormalizedTask>> {
        raws.iter().map(|raw| self.extract(raw)).collect()
    }
}

/// Display value of the first custom field whose name matches `field`
/// case-insensitively.
///
/// Returns `None` when no field matches or the first match has no value.
/// A later field with the same name is never consulted.
pub fn display_value<'a>(field: &str, fields: &'a [CustomField]) -> Option<&'a str> {
    let wanted = field.to_lowercase();
    fields
        .iter()
        .find(|f| f.name.to_lowercase() == wanted)
        .and_then(|f| f.display_value.as_deref())
}

/// Reformat a `YYYY-MM-DD` date as `D/M/YYYY`.
pub fn format_date(value: &str) -> TrackerResult<String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|d| d.format(DISPLAY_FORMAT).to_string())
        .map_err(|_| TrackerError::MalformedDate {
            field: "due_on",
            value: value.to_string(),
            expected: "YYYY-MM-DD",
        })
}

/// Reformat a `YYYY-MM-DDTHH:MM:SS[.ffffff]Z` timestamp as `D/M/YYYY`.
///
/// The timestamp is UTC and is not shifted to local time.
pub fn format_timestamp(value: &str) -> TrackerResult<String> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|dt| dt.date().format(DISPLAY_FORMAT).to_string())
        .map_err(|_| TrackerError::MalformedDate {
            field: "completed_at",
            value: value.to_string(),
            expected: "YYYY-MM-DDTHH:MM:SS.ffffffZ",
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Assignee, Membership, Section};

    fn field(name: &str, value: Option<&str>) -> CustomField {
        CustomField {
            name: name.to_string(),
            display_value: value.map(str::to_string),
        }
    }

    fn raw_task() -> RawTask {
        RawTask {
            gid: "1201".to_string(),
            name: "Acme Corp".to_string(),
            assignee: Some(Assignee {
                name: "Dana".to_string(),
            }),
            due_on: Some("2023-11-02".to_string()),
            completed_at: None,
            custom_fields: vec![field("Status", Some("Building"))],
            memberships: vec![Membership {
                section: Some(Section {
                    name: "In Progress".to_string(),
                }),
            }],
        }
    }

    #[test]
    fn test_extract_full_record() {
        let task = FieldExtractor::default().extract(&raw_task()).unwrap();

        assert_eq!(
            task,
            NormalizedTask {
                client_name: "Acme Corp".to_string(),
                status: "Building".to_string(),
                assignee: "Dana".to_string(),
                due_date: "2/11/2023".to_string(),
                completed_date: CompletedDate::NotCompleted,
            }
        );
    }

    #[test]
    fn test_missing_assignee_uses_placeholder() {
        let raw = RawTask {
            assignee: None,
            ..raw_task()
        };
        let task = FieldExtractor::new("TBC").extract(&raw).unwrap();
        assert_eq!(task.assignee, "TBC");
    }

    #[test]
    fn test_missing_due_date_uses_placeholder() {
        let raw = RawTask {
            due_on: None,
            ..raw_task()
        };
        let task = FieldExtractor::default().extract(&raw).unwrap();
        assert_eq!(task.due_date, "N/A");
    }

    #[test]
    fn test_completed_at_formats_date() {
        let raw = RawTask {
            completed_at: Some("2023-11-02T10:15:00.000000Z".to_string()),
            ..raw_task()
        };
        let task = FieldExtractor::default().extract(&raw).unwrap();
        assert_eq!(
            task.completed_date,
            CompletedDate::Completed("2/11/2023".to_string())
        );
    }

    #[test]
    fn test_completed_at_without_fraction() {
        assert_eq!(format_timestamp("2024-01-09T23:59:59Z").unwrap(), "9/1/2024");
        assert_eq!(
            format_timestamp("2012-02-22T02:06:58.147Z").unwrap(),
            "22/2/2012"
        );
    }

    #[test]
    fn test_status_null_display_value_uses_placeholder() {
        let raw = RawTask {
            custom_fields: vec![field("Status", None)],
            ..raw_task()
        };
        let task = FieldExtractor::default().extract(&raw).unwrap();
        assert_eq!(task.status, "N/A");
    }

    #[test]
    fn test_status_absent_uses_placeholder() {
        let raw = RawTask {
            custom_fields: vec![field("Priority", Some("High"))],
            ..raw_task()
        };
        let task = FieldExtractor::default().extract(&raw).unwrap();
        assert_eq!(task.status, "N/A");
    }

    #[test]
    fn test_status_case_insensitive_first_match_wins() {
        let fields = vec![
            field("Priority", Some("High")),
            field("STATUS", Some("Queued")),
            field("status", Some("Shipped")),
        ];
        assert_eq!(display_value("Status", &fields), Some("Queued"));
    }

    #[test]
    fn test_status_first_match_null_is_not_skipped() {
        let fields = vec![field("status", None), field("Status", Some("Shipped"))];
        assert_eq!(display_value("Status", &fields), None);
    }

    #[test]
    fn test_malformed_due_date_is_error() {
        let raw = RawTask {
            due_on: Some("02/11/2023".to_string()),
            ..raw_task()
        };
        let err = FieldExtractor::default().extract(&raw).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::MalformedDate {
                field: "due_on",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_completed_at_is_error() {
        let raw = RawTask {
            completed_at: Some("2023-11-02 10:15".to_string()),
            ..raw_task()
        };
        let err = FieldExtractor::default().extract(&raw).unwrap_err();
        assert!(matches!(
            err,
            TrackerError::MalformedDate {
                field: "completed_at",
                ..
            }
        ));
    }

    #[test]
    fn test_extract_sectioned_keeps_first_section() {
        let sectioned = FieldExtractor::default()
            .extract_sectioned(&raw_task())
            .unwrap();
        assert_eq!(sectioned.section.as_deref(), Some("In Progress"));
    }

    #[test]
    fn test_extract_all_propagates_first_error() {
        let bad = RawTask {
            due_on: Some("soon".to_string()),
            ..raw_task()
        };
        let result = FieldExtractor::default().extract_all(&[raw_task(), bad]);
        assert!(result.is_err());
    }
}
