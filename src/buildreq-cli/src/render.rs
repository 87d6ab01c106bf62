//! Plain text rendering for terminal output.

use buildreq_tracker::{GroupedTasks, NormalizedTask, SectionedTask};

/// Printed when a search matches nothing.
pub const NO_MATCH: &str = "No such request...";

/// Printed when the dashboard is empty.
pub const NO_REQUESTS: &str = "No client build requests in progress or completed recently.";

/// One task on one line.
pub fn task_line(task: &NormalizedTask) -> String {
    format!(
        "{} - Status: {}, Assignee: {}, Due date: {}, Completed: {}",
        task.client_name, task.status, task.assignee, task.due_date, task.completed_date
    )
}

/// Sections in order, each followed by its indented tasks.
pub fn grouped(grouped: &GroupedTasks) -> String {
    let mut out = String::new();
    for (index, (section, tasks)) in grouped.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{} ({})\n", section, tasks.len()));
        for task in tasks {
            out.push_str("  ");
            out.push_str(&task_line(task));
            out.push('\n');
        }
    }
    out
}

pub fn sectioned(task: &SectionedTask) -> String {
    format!(
        "{}\n  {}\n",
        task.section.as_deref().unwrap_or("No section"),
        task_line(&task.task)
    )
}

#[cfg(test)]
mod tests {
    use buildreq_tracker::CompletedDate;
    use pretty_assertions::assert_eq;

    use super::*;

    fn task(name: &str, completed: CompletedDate) -> NormalizedTask {
        NormalizedTask {
            client_name: name.to_string(),
            status: "Building".to_string(),
            assignee: "N/A".to_string(),
            due_date: "2/11/2023".to_string(),
            completed_date: completed,
        }
    }

    #[test]
    fn test_task_line() {
        assert_eq!(
            task_line(&task("Acme Corp", CompletedDate::NotCompleted)),
            "Acme Corp - Status: Building, Assignee: N/A, Due date: 2/11/2023, Completed: Not completed"
        );
    }

    #[test]
    fn test_grouped_layout() {
        let mut tasks = GroupedTasks::new();
        tasks.push("In Progress", task("Acme Corp", CompletedDate::NotCompleted));
        tasks.push(
            "Done",
            task("Globex", CompletedDate::Completed("1/11/2023".to_string())),
        );
        tasks.push("In Progress", task("Initech", CompletedDate::NotCompleted));

        let expected = "\
In Progress (2)
  Acme Corp - Status: Building, Assignee: N/A, Due date: 2/11/2023, Completed: Not completed
  Initech - Status: Building, Assignee: N/A, Due date: 2/11/2023, Completed: Not completed

Done (1)
  Globex - Status: Building, Assignee: N/A, Due date: 2/11/2023, Completed: 1/11/2023
";
        assert_eq!(grouped(&tasks), expected);
    }

    #[test]
    fn test_grouped_empty() {
        assert_eq!(grouped(&GroupedTasks::new()), "");
    }

    #[test]
    fn test_sectioned() {
        let rendered = sectioned(&SectionedTask {
            section: None,
            task: task("Acme Corp", CompletedDate::NotCompleted),
        });
        assert!(rendered.starts_with("No section\n  Acme Corp - "));
    }
}
