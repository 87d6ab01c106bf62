//! Client build request tracking.
//!
//! Fetches a project's tasks from the tracker, filters them by client name,
//! normalizes their fields and groups them by workflow section. The chat
//! integration consumes the results through [`Dispatcher`], or directly
//! through [`QueryPipeline`] and [`DashboardPipeline`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use buildreq_tracker::{AsanaClient, Dispatcher, TrackerConfig};
//!
//! let config = TrackerConfig::from_env()?;
//! let source = Arc::new(AsanaClient::new(&config)?);
//! let dispatcher = Dispatcher::from_config(source, &config);
//!
//! let outcome = dispatcher.handle_text("search acme").await?;
//! ```
//!
//! # Configuration
//!
//! Required environment variables:
//! - `ASANA_PAT` - Tracker personal access token
//! - `RB_TRACKER_P` - Project id of the build request tracker

pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod group;
pub mod model;
pub mod pipeline;
pub mod window;

pub use config::TrackerConfig;
pub use dispatch::{Command, CommandTable, Dispatcher, Outcome};
pub use error::{TrackerError, TrackerResult};
pub use extract::FieldExtractor;
pub use fetch::{AsanaClient, TaskFetcher, TaskQuery, TaskSource, is_task_id};
pub use filter::filter_by_name;
pub use group::{SectionGrouper, UnsectionedPolicy};
pub use model::{
    CompletedDate, GroupedTasks, NOT_COMPLETED, NormalizedTask, RawTask, SectionedTask, TaskField,
    UNSECTIONED,
};
pub use pipeline::{DashboardPipeline, QueryPipeline};
pub use window::{DEFAULT_DAYS_BACK, window_start, window_start_from_now};
