//! Command dispatch table.
//!
//! Maps free text typed by a user to a [`Command`] through an ordered list of
//! named patterns, then runs the matching pipeline. Nothing here knows which
//! chat platform the text came from.

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use tracing::debug;

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::extract::FieldExtractor;
use crate::fetch::{TaskFetcher, TaskSource};
use crate::model::{GroupedTasks, NormalizedTask, SectionedTask, TaskField};
use crate::pipeline::{DashboardPipeline, QueryPipeline};

static SEARCH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:search|find)\b\s*(.*?)\s*$").expect("Invalid search regex")
});

static DASHBOARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:dashboard|summary|overview)\s*$").expect("Invalid dashboard regex")
});

static SHOW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*show\s+(\d+)\s*$").expect("Invalid show regex"));

static HELP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:help|\?)\s*$").expect("Invalid help regex"));

/// A recognized user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Find requests whose client name contains `query`.
    Search { query: String },
    /// Summarize every request by section.
    Dashboard,
    /// Look up a single request by tracker id.
    Show { gid: String },
    /// Explain usage.
    Help,
}

/// Builds a command from a route's captures.
pub type RouteBuilder = fn(&Captures<'_>) -> Command;

/// One entry of the dispatch table.
#[derive(Debug, Clone)]
pub struct CommandRoute {
    name: &'static str,
    pattern: Regex,
    build: RouteBuilder,
}

impl CommandRoute {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Ordered list of routes; the first matching route wins.
///
/// Non-empty text that matches no route is a bare search phrase.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    routes: Vec<CommandRoute>,
}

impl CommandTable {
    /// A table with no routes; every non-empty text becomes a search.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in routes: `search|find`, `dashboard|summary|overview`,
    /// `show <gid>`, `help`.
    pub fn standard() -> Self {
        Self {
            routes: vec![
                CommandRoute {
                    name: "search",
                    pattern: SEARCH_PATTERN.clone(),
                    build: |caps| {
                        let query = caps.get(1).map_or("", |m| m.as_str()).trim();
                        if query.is_empty() {
                            Command::Help
                        } else {
                            Command::Search {
                                query: query.to_string(),
                            }
                        }
                    },
                },
                CommandRoute {
                    name: "dashboard",
                    pattern: DASHBOARD_PATTERN.clone(),
                    build: |_| Command::Dashboard,
                },
                CommandRoute {
                    name: "show",
                    pattern: SHOW_PATTERN.clone(),
                    build: |caps| Command::Show {
                        gid: caps[1].to_string(),
                    },
                },
                CommandRoute {
                    name: "help",
                    pattern: HELP_PATTERN.clone(),
                    build: |_| Command::Help,
                },
            ],
        }
    }

    /// Append a route.
    pub fn with_route(
        mut self,
        name: &'static str,
        pattern: &str,
        build: RouteBuilder,
    ) -> TrackerResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            TrackerError::Config(format!("Invalid pattern for route '{}': {}", name, e))
        })?;
        self.routes.push(CommandRoute {
            name,
            pattern,
            build,
        });
        Ok(self)
    }

    pub fn routes(&self) -> &[CommandRoute] {
        &self.routes
    }

    /// Resolve text to a command. Empty text yields `None`.
    pub fn parse(&self, text: &str) -> Option<Command> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        for route in &self.routes {
            if let Some(caps) = route.pattern.captures(text) {
                debug!(route = route.name, "Matched command route");
                return Some((route.build)(&caps));
            }
        }

        Some(Command::Search {
            query: text.to_string(),
        })
    }
}

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// At least one request matched.
    Matches {
        query: String,
        tasks: Vec<NormalizedTask>,
    },
    /// The search ran and nothing matched.
    NoMatches { query: String },
    /// Full summary grouped by section.
    Dashboard(GroupedTasks),
    /// A single request.
    Task(SectionedTask),
    Help,
}

/// Runs commands against the configured project.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<CommandTable>,
    query: QueryPipeline,
    dashboard: DashboardPipeline,
    fetcher: TaskFetcher,
    extractor: FieldExtractor,
    project_id: String,
}

impl Dispatcher {
    /// Wire the standard table and both pipelines to a task source.
    pub fn from_config(source: Arc<dyn TaskSource>, config: &TrackerConfig) -> Self {
        let fetcher = TaskFetcher::new(source);
        Self::with_fetcher(fetcher, config)
    }

    /// Same as [`from_config`](Self::from_config) with a prepared fetcher.
    pub fn with_fetcher(fetcher: TaskFetcher, config: &TrackerConfig) -> Self {
        Self {
            table: Arc::new(CommandTable::standard()),
            query: QueryPipeline::from_config(fetcher.clone(), config),
            dashboard: DashboardPipeline::from_config(fetcher.clone(), config),
            fetcher,
            extractor: FieldExtractor::new(config.missing_field_placeholder.clone()),
            project_id: config.project_id.clone(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn query_pipeline(&self) -> &QueryPipeline {
        &self.query
    }

    pub fn dashboard_pipeline(&self) -> &DashboardPipeline {
        &self.dashboard
    }

    pub fn parse(&self, text: &str) -> Option<Command> {
        self.table.parse(text)
    }

    /// Run a command.
    pub async fn dispatch(&self, command: Command) -> TrackerResult<Outcome> {
        match command {
            Command::Search { query } => {
                let tasks = self.query.run(&self.project_id, &query).await?;
                if tasks.is_empty() {
                    Ok(Outcome::NoMatches { query })
                } else {
                    Ok(Outcome::Matches { query, tasks })
                }
            }
            Command::Dashboard => Ok(Outcome::Dashboard(
                self.dashboard.run(&self.project_id).await?,
            )),
            Command::Show { gid } => {
                let raw = self
                    .fetcher
                    .refetch(&gid, Some(TaskField::FULL_PROJECTION))
                    .await?;
                Ok(Outcome::Task(self.extractor.extract_sectioned(&raw)?))
            }
            Command::Help => Ok(Outcome::Help),
        }
    }

    /// Parse and run text; `None` when the text holds no command.
    pub async fn handle_text(&self, text: &str) -> TrackerResult<Option<Outcome>> {
        match self.parse(text) {
            Some(command) => self.dispatch(command).await.map(Some),
            None => Ok(None),
        }
    }
}
