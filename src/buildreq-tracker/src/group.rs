//! Grouping of normalized tasks by workflow section.

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{GroupedTasks, SectionedTask, UNSECTIONED};

/// Handling of tasks that belong to no section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsectionedPolicy {
    /// Collect them under [`UNSECTIONED`].
    #[default]
    Bucket,
    /// Fail with [`TrackerError::MissingMembership`].
    Reject,
}

impl std::str::FromStr for UnsectionedPolicy {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bucket" => Ok(UnsectionedPolicy::Bucket),
            "reject" => Ok(UnsectionedPolicy::Reject),
            other => Err(TrackerError::Config(format!(
                "Unknown unsectioned policy '{}': expected 'bucket' or 'reject'",
                other
            ))),
        }
    }
}

/// Groups tasks by section in first-seen order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionGrouper {
    policy: UnsectionedPolicy,
}

impl SectionGrouper {
    pub fn new(policy: UnsectionedPolicy) -> Self {
        Self { policy }
    }

    pub fn group<I>(&self, tasks: I) -> TrackerResult<GroupedTasks>
    where
        I: IntoIterator<Item = SectionedTask>,
    {
        let mut grouped = GroupedTasks::new();

        for SectionedTask { section, task } in tasks {
            let section = match (section, self.policy) {
                (Some(name), _) => name,
                (None, UnsectionedPolicy::Bucket) => UNSECTIONED.to_string(),
                (None, UnsectionedPolicy::Reject) => {
                    return Err(TrackerError::MissingMembership {
                        task: task.client_name,
                    });
                }
            };
            grouped.push(section, task);
        }

        Ok(grouped)
    }
}
