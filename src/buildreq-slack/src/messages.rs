//! Message formatting for Slack.
//!
//! Provides utilities for:
//! - Escaping text for Slack's mrkdwn format
//! - Building rich messages with Block Kit
//! - Rendering pipeline outcomes as replies

use buildreq_tracker::{GroupedTasks, NormalizedTask, Outcome, SectionedTask};
use serde::{Deserialize, Serialize};

/// Task blocks rendered per message before truncating; Slack rejects
/// messages with more than 50 blocks.
pub const MAX_TASK_BLOCKS: usize = 40;

/// Most blocks a grouped reply may use; the header and the truncation note
/// keep it under 50.
pub const MAX_GROUPED_BLOCKS: usize = 45;

/// Escape the three characters Slack treats as control characters in mrkdwn.
///
/// # Example
///
/// ```rust
/// use buildreq_slack::escape_mrkdwn;
///
/// assert_eq!(escape_mrkdwn("Smith & <Co>"), "Smith &amp; &lt;Co&gt;");
/// ```
pub fn escape_mrkdwn(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Reverse [`escape_mrkdwn`] on text received from Slack.
pub fn unescape_mrkdwn(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Slack Block Kit block types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackBlock {
    /// Header block.
    Header { text: SlackTextObject },
    /// Section block (main content).
    Section {
        text: SlackTextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        fields: Option<Vec<SlackTextObject>>,
    },
    /// Divider block.
    Divider {},
    /// Context block (small text).
    Context { elements: Vec<SlackContextElement> },
}

/// Slack text object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackTextObject {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<bool>,
}

impl SlackTextObject {
    /// Create a plain text object.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text_type: "plain_text".to_string(),
            text: text.into(),
            emoji: Some(true),
        }
    }

    /// Create a mrkdwn text object.
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            text_type: "mrkdwn".to_string(),
            text: text.into(),
            emoji: None,
        }
    }
}

/// Slack context element (for context blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackContextElement {
    PlainText { text: String },
    Mrkdwn { text: String },
}

/// Slack message content with blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackMessageContent {
    /// Fallback text for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Block Kit blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<SlackBlock>>,
    /// Thread timestamp (for replies).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl SlackMessageContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fallback text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set thread timestamp (for replies).
    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }
}

/// Builder for creating rich Slack messages.
#[derive(Debug, Default)]
pub struct SlackMessageBuilder {
    blocks: Vec<SlackBlock>,
    fallback_text: Option<String>,
}

impl SlackMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fallback text for notifications.
    pub fn fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = Some(text.into());
        self
    }

    /// Add a header block.
    pub fn header(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(SlackBlock::Header {
            text: SlackTextObject::plain(text),
        });
        self
    }

    /// Add a section with mrkdwn text.
    pub fn section(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(SlackBlock::Section {
            text: SlackTextObject::mrkdwn(text),
            fields: None,
        });
        self
    }

    /// Add a section with a title and labelled fields.
    pub fn section_with_fields(
        mut self,
        text: impl Into<String>,
        fields: Vec<(&str, String)>,
    ) -> Self {
        let field_objects = fields
            .into_iter()
            .map(|(label, value)| SlackTextObject::mrkdwn(format!("*{}*\n{}", label, value)))
            .collect();

        self.blocks.push(SlackBlock::Section {
            text: SlackTextObject::mrkdwn(text),
            fields: Some(field_objects),
        });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(SlackBlock::Divider {});
        self
    }

    /// Add a context block.
    pub fn context(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(SlackBlock::Context {
            elements: vec![SlackContextElement::Mrkdwn { text: text.into() }],
        });
        self
    }

    /// Append a normalized task as one section.
    pub fn task(self, task: &NormalizedTask) -> Self {
        self.section_with_fields(
            format!("*{}*", escape_mrkdwn(&task.client_name)),
            vec![
                ("Status", escape_mrkdwn(&task.status)),
                ("Assignee", escape_mrkdwn(&task.assignee)),
                ("Due date", escape_mrkdwn(&task.due_date)),
                ("Completed", escape_mrkdwn(task.completed_date.as_display())),
            ],
        )
    }

    /// Append every section of a grouped result: a title per section, its
    /// tasks, and a divider between sections. Emits at most `max_blocks`
    /// blocks, plus a note when tasks were left out.
    pub fn grouped(mut self, grouped: &GroupedTasks, max_blocks: usize) -> Self {
        let mut used = 0;
        let mut shown = 0;
        'sections: for (index, (section, tasks)) in grouped.iter().enumerate() {
            // A title needs room for at least one task under it
            let title_cost = if index > 0 { 2 } else { 1 };
            if used + title_cost >= max_blocks {
                break;
            }
            if index > 0 {
                self = self.divider();
            }
            self = self.section(format!(
                "*{}* ({})",
                escape_mrkdwn(section),
                tasks.len()
            ));
            used += title_cost;

            for task in tasks {
                if used >= max_blocks {
                    break 'sections;
                }
                self = self.task(task);
                used += 1;
                shown += 1;
            }
        }

        let total = grouped.total_tasks();
        if shown < total {
            self = self.context(format!("Showing {} of {} requests", shown, total));
        }
        self
    }

    /// Blocks added so far.
    pub fn into_blocks(self) -> Vec<SlackBlock> {
        self.blocks
    }

    /// Build the message content.
    pub fn build(self) -> SlackMessageContent {
        SlackMessageContent {
            text: self.fallback_text,
            blocks: Some(self.blocks),
            thread_ts: None,
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Reply for a search that found tasks.
pub fn format_matches(query: &str, tasks: &[NormalizedTask]) -> SlackMessageContent {
    let mut builder = SlackMessageBuilder::new()
        .fallback(format!(
            "{} client build request{} matching \"{}\"",
            tasks.len(),
            plural(tasks.len()),
            query
        ))
        .header("🔎 Client build requests")
        .section(format!("Results for *{}*", escape_mrkdwn(query)));

    for task in tasks.iter().take(MAX_TASK_BLOCKS) {
        builder = builder.task(task);
    }

    let context = if tasks.len() > MAX_TASK_BLOCKS {
        format!(
            "Showing {} of {} matching requests",
            MAX_TASK_BLOCKS,
            tasks.len()
        )
    } else {
        format!("{} matching request{}", tasks.len(), plural(tasks.len()))
    };

    builder.context(context).build()
}

/// Reply for a search that found nothing.
pub fn format_no_matches(query: &str) -> SlackMessageContent {
    let text = format!(
        "No such request... nothing matches *{}*.",
        escape_mrkdwn(query)
    );
    SlackMessageBuilder::new()
        .fallback(format!("No such request... nothing matches \"{}\"", query))
        .section(text)
        .context("Searches match part of the client name and ignore case.")
        .build()
}

/// Usage text.
pub fn format_help() -> SlackMessageContent {
    SlackMessageBuilder::new()
        .fallback("Type a client name to look up its build request.")
        .header("👋 Client build requests")
        .section(
            "Type part of a client name and I'll find its build request.\n\
             • `acme` or `search acme` - find requests by client name\n\
             • `dashboard` - every open and recently completed request by stage\n\
             • `show <id>` - a single request\n\
             • `help` - this message",
        )
        .context("Your home tab shows the same dashboard and refreshes every time you open it.")
        .build()
}

/// Reply for a single task.
pub fn format_task(sectioned: &SectionedTask) -> SlackMessageContent {
    let stage = sectioned.section.as_deref().unwrap_or("No section");
    SlackMessageBuilder::new()
        .fallback(format!("{} ({})", sectioned.task.client_name, stage))
        .task(&sectioned.task)
        .context(format!("Stage: {}", escape_mrkdwn(stage)))
        .build()
}

/// Reply for the `dashboard` command.
pub fn format_dashboard(grouped: &GroupedTasks) -> SlackMessageContent {
    let builder = SlackMessageBuilder::new()
        .fallback(format!(
            "{} client build request{}",
            grouped.total_tasks(),
            plural(grouped.total_tasks())
        ))
        .header("📋 Build request dashboard");

    if grouped.is_empty() {
        return builder.section(NO_REQUESTS_TEXT).build();
    }
    builder.grouped(grouped, MAX_GROUPED_BLOCKS).build()
}

/// Shown when a project has no qualifying tasks.
pub const NO_REQUESTS_TEXT: &str =
    "There are no client build requests in progress or completed recently.";

/// Generic reply for any failure; the cause is logged, not shown.
pub fn format_error_response() -> SlackMessageContent {
    SlackMessageBuilder::new()
        .fallback("Something went wrong, please try again later.")
        .section("⚠️ Something went wrong while looking up build requests. Please try again in a moment.")
        .build()
}

/// Render any dispatch outcome as a reply.
pub fn format_outcome(outcome: &Outcome) -> SlackMessageContent {
    match outcome {
        Outcome::Matches { query, tasks } => format_matches(query, tasks),
        Outcome::NoMatches { query } => format_no_matches(query),
        Outcome::Dashboard(grouped) => format_dashboard(grouped),
        Outcome::Task(sectioned) => format_task(sectioned),
        Outcome::Help => format_help(),
    }
}
