//! Task records as received from the tracker and as handed to consumers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Display form of [`CompletedDate::NotCompleted`].
pub const NOT_COMPLETED: &str = "Not completed";

/// Section name for tasks that belong to no section.
pub const UNSECTIONED: &str = "Unsectioned";

/// A task as returned by the tracker.
///
/// Only the fields requested through the projection are populated; absent and
/// `null` keys both come through as `None` (or an empty list).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTask {
    #[serde(default)]
    pub gid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignee: Option<Assignee>,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub custom_fields: Vec<CustomField>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub memberships: Vec<Membership>,
}

impl RawTask {
    /// Section of the first membership entry, if any.
    ///
    /// Only the first membership is authoritative; later entries are ignored.
    pub fn section_name(&self) -> Option<&str> {
        self.memberships
            .first()
            .and_then(|m| m.section.as_ref())
            .map(|s| s.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
    #[serde(default)]
    pub name: String,
}

/// A tracker-defined attribute attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default)]
    pub section: Option<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub name: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Completion state of a normalized task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletedDate {
    /// Completed on the given display date (`D/M/YYYY`).
    Completed(String),
    /// Not yet completed.
    NotCompleted,
}

impl CompletedDate {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletedDate::Completed(_))
    }

    /// Text shown to users.
    pub fn as_display(&self) -> &str {
        match self {
            CompletedDate::Completed(date) => date,
            CompletedDate::NotCompleted => NOT_COMPLETED,
        }
    }
}

impl std::fmt::Display for CompletedDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_display())
    }
}

/// A task reduced to the fields shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTask {
    pub client_name: String,
    pub status: String,
    pub assignee: String,
    pub due_date: String,
    pub completed_date: CompletedDate,
}

/// A normalized task paired with the section it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionedTask {
    /// Section of the first membership, `None` when the task has none.
    pub section: Option<String>,
    pub task: NormalizedTask,
}

/// Tasks grouped by section, in the order sections were first encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedTasks {
    sections: IndexMap<String, Vec<NormalizedTask>>,
}

impl GroupedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to a section, creating the section on first sight.
    pub fn push(&mut self, section: impl Into<String>, task: NormalizedTask) {
        self.sections.entry(section.into()).or_default().push(task);
    }

    /// Section names in first-seen order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn get(&self, section: &str) -> Option<&[NormalizedTask]> {
        self.sections.get(section).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NormalizedTask])> {
        self.sections
            .iter()
            .map(|(name, tasks)| (name.as_str(), tasks.as_slice()))
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Number of tasks across all sections.
    pub fn total_tasks(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }
}

/// Fields that can be requested from the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    Name,
    AssigneeName,
    DueOn,
    CustomFieldsName,
    CustomFieldsDisplayValue,
    MembershipsSectionName,
    CompletedAt,
}

impl TaskField {
    /// Every field the extractor and grouper read.
    pub const FULL_PROJECTION: &'static [TaskField] = &[
        TaskField::Name,
        TaskField::AssigneeName,
        TaskField::DueOn,
        TaskField::CustomFieldsName,
        TaskField::CustomFieldsDisplayValue,
        TaskField::MembershipsSectionName,
        TaskField::CompletedAt,
    ];

    /// Field path as understood by the tracker's `opt_fields` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskField::Name => "name",
            TaskField::AssigneeName => "assignee.name",
            TaskField::DueOn => "due_on",
            TaskField::CustomFieldsName => "custom_fields.name",
            TaskField::CustomFieldsDisplayValue => "custom_fields.display_value",
            TaskField::MembershipsSectionName => "memberships.section.name",
            TaskField::CompletedAt => "completed_at",
        }
    }

    /// Join fields into an `opt_fields` value.
    pub fn join(fields: &[TaskField]) -> String {
        fields
            .iter()
            .map(TaskField::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}
