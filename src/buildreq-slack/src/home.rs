//! Home tab dashboard.
//!
//! Rebuilt from scratch on every `app_home_opened` event and published with
//! `views.publish`; nothing is cached between opens.

use buildreq_tracker::GroupedTasks;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::messages::{NO_REQUESTS_TEXT, SlackBlock, SlackMessageBuilder};

/// Most blocks the grouped part of a home view may use; Slack caps a view at
/// 100 blocks and the header and footer need room too.
pub const MAX_HOME_BLOCKS: usize = 95;

/// A `home` view payload for `views.publish`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeView {
    #[serde(rename = "type")]
    pub view_type: String,
    pub blocks: Vec<SlackBlock>,
}

impl HomeView {
    pub fn new(blocks: Vec<SlackBlock>) -> Self {
        Self {
            view_type: "home".to_string(),
            blocks,
        }
    }
}

/// Build the dashboard view for a grouped result.
pub fn build_home_view<Tz>(grouped: &GroupedTasks, refreshed_at: DateTime<Tz>) -> HomeView
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut builder = SlackMessageBuilder::new().header("📋 Client build requests");

    builder = if grouped.is_empty() {
        builder.section(NO_REQUESTS_TEXT)
    } else {
        builder.grouped(grouped, MAX_HOME_BLOCKS)
    };

    let blocks = builder
        .divider()
        .context(format!(
            "Last refreshed {}",
            refreshed_at.format("%-d/%-m/%Y %H:%M")
        ))
        .into_blocks();

    HomeView::new(blocks)
}

/// View published when the dashboard could not be built.
pub fn build_error_view() -> HomeView {
    let blocks = SlackMessageBuilder::new()
        .header("📋 Client build requests")
        .section("⚠️ Something went wrong while loading the dashboard. Open this tab again to retry.")
        .into_blocks();
    HomeView::new(blocks)
}

#[cfg(test)]
mod tests {
    use buildreq_tracker::{CompletedDate, NormalizedTask};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::messages::SlackContextElement;

    fn task(name: &str) -> NormalizedTask {
        NormalizedTask {
            client_name: name.to_string(),
            status: "N/A".to_string(),
            assignee: "Dana".to_string(),
            due_date: "N/A".to_string(),
            completed_date: CompletedDate::Completed("2/11/2023".to_string()),
        }
    }

    fn refreshed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 16, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_home_view_layout() {
        let mut grouped = GroupedTasks::new();
        grouped.push("In Progress", task("Acme Corp"));
        grouped.push("Done", task("Globex"));

        let view = build_home_view(&grouped, refreshed());
        assert_eq!(view.view_type, "home");

        let kinds: Vec<_> = view
            .blocks
            .iter()
            .map(|b| match b {
                SlackBlock::Header { .. } => "header",
                SlackBlock::Section { .. } => "section",
                SlackBlock::Divider {} => "divider",
                SlackBlock::Context { .. } => "context",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "header", "section", "section", "divider", "section", "section", "divider",
                "context"
            ]
        );
        assert_eq!(
            view.blocks.last(),
            Some(&SlackBlock::Context {
                elements: vec![SlackContextElement::Mrkdwn {
                    text: "Last refreshed 16/11/2023 09:05".to_string()
                }]
            })
        );
    }

    #[test]
    fn test_home_view_empty() {
        let view = build_home_view(&GroupedTasks::new(), refreshed());
        assert_eq!(view.blocks.len(), 4);
        match &view.blocks[1] {
            SlackBlock::Section { text, .. } => assert_eq!(text.text, NO_REQUESTS_TEXT),
            other => panic!("Expected section, got {:?}", other),
        }
    }

    #[test]
    fn test_home_view_stays_under_block_limit() {
        let mut grouped = GroupedTasks::new();
        for i in 0..150 {
            grouped.push(format!("Stage {}", i % 3), task(&format!("Client {}", i)));
        }
        let view = build_home_view(&grouped, refreshed());
        assert!(view.blocks.len() <= 100);

        let mut scattered = GroupedTasks::new();
        for i in 0..150 {
            scattered.push(format!("Stage {}", i), task(&format!("Client {}", i)));
        }
        let view = build_home_view(&scattered, refreshed());
        assert!(view.blocks.len() <= 100);
    }

    #[test]
    fn test_home_view_serializes() {
        let json = serde_json::to_value(HomeView::new(vec![])).unwrap();
        assert_eq!(json, serde_json::json!({"type": "home", "blocks": []}));
    }
}
