//! Output formatting for the CLI.

use agentwork_core::{ChangeEvent, ChangeOperation, Work};
use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::fmt::Write;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    Ok(match format {
        OutputFormat::Human => None,
        OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
    })
}

/// Print output in the specified format.
pub fn print<T: Serialize + HumanDisplay>(value: &T, format: OutputFormat) -> Result<()> {
    match render(value, format)? {
        Some(text) => println!("{text}"),
        None => println!("{}", value.human_display()),
    }
    Ok(())
}

/// Print a list of work items with dynamic column widths.
pub fn print_work_list(items: &[Work], format: OutputFormat) -> Result<()> {
    if let Some(text) = render(items, format)? {
        println!("{text}");
        return Ok(());
    }

    if items.is_empty() {
        println!("No work items found.");
        return Ok(());
    }

    let summaries: Vec<WorkSummary> = items.iter().map(WorkSummary::from).collect();
    let id_width = column_width(&summaries, |s| s.id.len(), 2);
    let status_width = column_width(&summaries, |s| s.status.len(), 6);
    let session_width = column_width(&summaries, |s| s.session.len(), 7);

    println!(
        "{:<id_width$}  {:<5}  {:<status_width$}  {:<session_width$}  TITLE",
        "ID", "TYPE", "STATUS", "SESSION"
    );
    println!("{}", "-".repeat(id_width + status_width + session_width + 24));

    for s in &summaries {
        println!(
            "{:<id_width$}  {:<5}  {:<status_width$}  {:<session_width$}  {}{}",
            s.id,
            s.work_type,
            s.status,
            s.session,
            s.indent,
            s.title
        );
    }
    Ok(())
}

fn column_width(rows: &[WorkSummary], len: impl Fn(&WorkSummary) -> usize, min: usize) -> usize {
    rows.iter().map(len).max().unwrap_or(min).max(min)
}

/// Print an item followed by its children.
pub fn print_work_with_children(work: &Work, children: &[Work], format: OutputFormat) -> Result<()> {
    #[derive(Serialize)]
    struct WorkWithChildren<'a> {
        #[serde(flatten)]
        work: &'a Work,
        children: &'a [Work],
    }

    let view = WorkWithChildren { work, children };
    if let Some(text) = render(&view, format)? {
        println!("{text}");
        return Ok(());
    }

    println!("{}", work.human_display());
    if !children.is_empty() {
        println!("Tasks:");
        for child in children {
            println!("  {:<12} {}  {}", child.status.to_string(), child.id, child.title);
        }
    }
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) -> Result<()> {
    #[derive(Serialize)]
    struct Status<'a> {
        status: &'static str,
        message: &'a str,
    }

    match render(&Status { status: "ok", message }, format)? {
        Some(text) => println!("{text}"),
        None => println!("{}", style(message).green()),
    }
    Ok(())
}

/// Print one change event as a single line (JSON lines for machine formats).
pub fn print_event(event: &ChangeEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", event.human_display()),
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Yaml => println!("---\n{}", serde_yaml::to_string(event)?),
    }
    Ok(())
}

/// Trait for human-readable display.
pub trait HumanDisplay {
    fn human_display(&self) -> String;
}

impl HumanDisplay for Work {
    fn human_display(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "ID:        {}", self.id);
        let _ = writeln!(out, "Type:      {}", self.work_type);
        let _ = writeln!(out, "Title:     {}", self.title);
        let _ = writeln!(out, "Status:    {}", self.status);
        let _ = writeln!(out, "Role:      {}", self.agent_role_id);

        if let Some(parent) = self.parent() {
            let _ = writeln!(out, "Parent:    {parent}");
        }
        if let Some(session) = self.session() {
            let _ = writeln!(out, "Session:   {session}");
        }

        let _ = writeln!(out, "Created:   {}", format_time(&self.created_at));
        let _ = writeln!(out, "Updated:   {}", format_time(&self.updated_at));

        if let Some(body) = &self.body {
            let _ = writeln!(out);
            for line in body.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }

        out
    }
}

impl HumanDisplay for ChangeEvent {
    fn human_display(&self) -> String {
        let time = format_time(&self.work.updated_at);
        let change = match (&self.operation, &self.previous) {
            (ChangeOperation::Update, Some(previous)) if previous.status != self.work.status => {
                format!("{} → {}", previous.status, self.work.status)
            }
            _ => self.work.status.to_string(),
        };
        let operation = match self.operation {
            ChangeOperation::Create => style("create").green(),
            ChangeOperation::Update => style("update").yellow(),
            ChangeOperation::Delete => style("delete").red(),
        };
        format!(
            "[{time}] {operation} {id} ({change}) {title}",
            id = self.work.id,
            title = self.work.title
        )
    }
}

fn format_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Row view of a work item for list output.
struct WorkSummary {
    id: String,
    work_type: String,
    status: String,
    session: String,
    title: String,
    indent: &'static str,
}

impl From<&Work> for WorkSummary {
    fn from(work: &Work) -> Self {
        Self {
            id: work.id.clone(),
            work_type: work.work_type.to_string(),
            status: work.status.to_string(),
            session: work.session().unwrap_or("-").to_string(),
            title: work.title.clone(),
            indent: if work.is_story() { "" } else { "  " },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentwork_core::{NewWork, WorkStatus};

    fn sample() -> Work {
        NewWork::story("Checkout", "lead")
            .with_body("first line\nsecond line")
            .into_work("lead".to_string(), Utc::now())
    }

    #[test]
    fn test_work_human_display() {
        let mut work = sample();
        work.session_id = Some("s1".to_string());
        let text = work.human_display();

        assert!(text.contains(&format!("ID:        {}", work.id)));
        assert!(text.contains("Status:    open"));
        assert!(text.contains("Session:   s1"));
        assert!(text.contains("  second line"));
        assert!(!text.contains("Parent:"));
    }

    #[test]
    fn test_event_display_shows_transition() {
        let previous = sample();
        let mut work = previous.clone();
        work.status = WorkStatus::InProgress;

        let line = console::strip_ansi_codes(&ChangeEvent::updated(previous, work).human_display())
            .to_string();
        assert!(line.contains("update"));
        assert!(line.contains("open → in_progress"));
        assert!(line.ends_with("Checkout"));
    }

    #[test]
    fn test_summary_indents_tasks() {
        let story = sample();
        let task = NewWork::task(&story.id, "Badge").into_work("lead".to_string(), Utc::now());

        assert_eq!(WorkSummary::from(&story).indent, "");
        assert_eq!(WorkSummary::from(&task).indent, "  ");
        assert_eq!(WorkSummary::from(&task).session, "-");
    }
}
