//! Search and dashboard pipelines.
//!
//! Both are plain compositions of fetch, filter, extract and group; they hold
//! no state between runs.

use crate::config::TrackerConfig;
use crate::error::TrackerResult;
use crate::extract::FieldExtractor;
use crate::fetch::TaskFetcher;
use crate::filter::filter_by_name;
use crate::group::SectionGrouper;
use crate::model::{GroupedTasks, NormalizedTask, RawTask, TaskField};
use crate::window::DEFAULT_DAYS_BACK;

/// Fetch, filter by name, normalize.
#[derive(Clone)]
pub struct QueryPipeline {
    fetcher: TaskFetcher,
    extractor: FieldExtractor,
    grouper: SectionGrouper,
    days_back: u32,
}

impl QueryPipeline {
    pub fn new(fetcher: TaskFetcher, extractor: FieldExtractor) -> Self {
        Self {
            fetcher,
            extractor,
            grouper: SectionGrouper::default(),
            days_back: DEFAULT_DAYS_BACK,
        }
    }

    /// Build a pipeline using the configured window, placeholder and policy.
    pub fn from_config(fetcher: TaskFetcher, config: &TrackerConfig) -> Self {
        Self {
            fetcher,
            extractor: FieldExtractor::new(config.missing_field_placeholder.clone()),
            grouper: SectionGrouper::new(config.unsectioned),
            days_back: config.days_back,
        }
    }

    /// Tasks in `project_id` whose name contains `query`, normalized.
    ///
    /// An empty result means nothing matched.
    pub async fn run(&self, project_id: &str, query: &str) -> TrackerResult<Vec<NormalizedTask>> {
        let matches = self.matching(project_id, query).await?;
        self.extractor.extract_all(&matches)
    }

    /// Same matches as [`run`](Self::run), grouped by section.
    pub async fn run_grouped(&self, project_id: &str, query: &str) -> TrackerResult<GroupedTasks> {
        let matches = self.matching(project_id, query).await?;
        let sectioned = matches
            .iter()
            .map(|raw| self.extractor.extract_sectioned(raw))
            .collect::<TrackerResult<Vec<_>>>()?;
        self.grouper.group(sectioned)
    }

    async fn matching(&self, project_id: &str, query: &str) -> TrackerResult<Vec<RawTask>> {
        let tasks = self
            .fetcher
            .fetch(project_id, self.days_back, Some(TaskField::FULL_PROJECTION))
            .await?;
        Ok(filter_by_name(tasks, query))
    }
}

/// Fetch, normalize, group by section.
#[derive(Clone)]
pub struct DashboardPipeline {
    fetcher: TaskFetcher,
    extractor: FieldExtractor,
    grouper: SectionGrouper,
    days_back: u32,
}

impl DashboardPipeline {
    pub fn new(fetcher: TaskFetcher, extractor: FieldExtractor, grouper: SectionGrouper) -> Self {
        Self {
            fetcher,
            extractor,
            grouper,
            days_back: DEFAULT_DAYS_BACK,
        }
    }

    pub fn from_config(fetcher: TaskFetcher, config: &TrackerConfig) -> Self {
        Self {
            fetcher,
            extractor: FieldExtractor::new(config.missing_field_placeholder.clone()),
            grouper: SectionGrouper::new(config.unsectioned),
            days_back: config.days_back,
        }
    }

    /// Every qualifying task in `project_id`, grouped by section.
    pub async fn run(&self, project_id: &str) -> TrackerResult<GroupedTasks> {
        let tasks = self
            .fetcher
            .fetch(project_id, self.days_back, Some(TaskField::FULL_PROJECTION))
            .await?;

        let sectioned = tasks
            .iter()
            .map(|raw| self.extractor.extract_sectioned(raw))
            .collect::<TrackerResult<Vec<_>>>()?;

        self.grouper.group(sectioned)
    }
}
