//! CLI command implementations.

use crate::output::{self, OutputFormat};
use agentwork_core::{NewWork, Work, WorkPatch, WorkStatus, WorkType};
use agentwork_fs::{CONFIG_FILE, DataDirConfig, WorkStore};
use anyhow::{Context, Result, bail};
use console::style;
use std::path::Path;

fn open(data_dir: &Path) -> Result<WorkStore> {
    WorkStore::open(data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))
}

/// Write a default config into the data directory.
pub fn init(data_dir: &Path, format: OutputFormat) -> Result<()> {
    if data_dir.join(CONFIG_FILE).exists() {
        bail!("{} already exists in {}", CONFIG_FILE, data_dir.display());
    }
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    DataDirConfig::default()
        .save(data_dir)
        .context("Failed to write config")?;
    output::print_success(
        &format!("Initialized data directory at {}", data_dir.display()),
        format,
    )
}

/// Status/type filter for `list`.
#[derive(Debug, Default, PartialEq, Eq)]
struct ListFilter {
    status: Option<WorkStatus>,
    work_type: Option<WorkType>,
}

impl ListFilter {
    fn parse(status: Option<&str>, work_type: Option<&str>) -> Result<Self> {
        Ok(Self {
            status: status.map(str::parse).transpose().context("Invalid --status")?,
            work_type: work_type.map(str::parse).transpose().context("Invalid --type")?,
        })
    }

    fn matches(&self, work: &Work) -> bool {
        self.status.is_none_or(|s| work.status == s)
            && self.work_type.is_none_or(|t| work.work_type == t)
    }
}

/// List work items.
pub fn list(
    data_dir: &Path,
    status: Option<&str>,
    work_type: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let filter = ListFilter::parse(status, work_type)?;
    let store = open(data_dir)?;

    let items: Vec<Work> = store.list().into_iter().filter(|w| filter.matches(w)).collect();
    output::print_work_list(&items, format)
}

/// Show a work item and its children.
pub fn get(data_dir: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let store = open(data_dir)?;
    let work = store
        .get(id)
        .with_context(|| format!("Work item not found: {id}"))?;
    let children = store.children(id);
    output::print_work_with_children(&work, &children, format)
}

/// Arguments for `new`.
pub struct NewArgs {
    pub title: String,
    pub work_type: String,
    pub parent: Option<String>,
    pub role: Option<String>,
    pub body: Option<String>,
}

impl NewArgs {
    fn into_new_work(self) -> Result<NewWork> {
        let work_type: WorkType = self.work_type.parse().context("Invalid --type")?;
        let mut new = match (work_type, self.parent) {
            (WorkType::Task, Some(parent)) => NewWork::task(parent, self.title),
            (WorkType::Task, None) => bail!("A task requires --parent"),
            (WorkType::Story, Some(_)) => bail!("A story cannot have a parent"),
            (WorkType::Story, None) => {
                let role = self.role.clone().context("A story requires --role")?;
                NewWork::story(self.title, role)
            }
        };
        if let (WorkType::Task, Some(role)) = (work_type, self.role) {
            new = new.with_role(role);
        }
        if let Some(body) = self.body {
            new = new.with_body(body);
        }
        Ok(new)
    }
}

/// Create a work item.
pub fn new_item(data_dir: &Path, args: NewArgs, format: OutputFormat) -> Result<()> {
    let new = args.into_new_work()?;
    let store = open(data_dir)?;
    let work = store.create(new).context("Failed to create work item")?;
    output::print(&work, format)
}

/// Start an item on a session.
pub fn start(data_dir: &Path, id: &str, session: &str, format: OutputFormat) -> Result<()> {
    let store = open(data_dir)?;
    let work = store
        .update(id, &WorkPatch::start(session))
        .with_context(|| format!("Failed to start {id}"))?;
    print_transition(WorkStatus::Open, &work, format)
}

/// Return an in-progress item to open, releasing its session.
pub fn stop(data_dir: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let store = open(data_dir)?;
    let work = store
        .update(id, &WorkPatch::rollback())
        .with_context(|| format!("Failed to stop {id}"))?;
    print_transition(WorkStatus::InProgress, &work, format)
}

/// Mark an item done.
pub fn done(data_dir: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let store = open(data_dir)?;
    let before = store
        .get(id)
        .with_context(|| format!("Work item not found: {id}"))?;
    let work = store
        .mark_done(id)
        .with_context(|| format!("Failed to mark {id} done"))?;
    print_transition(before.status, &work, format)
}

fn print_transition(from: WorkStatus, work: &Work, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Human) {
        println!(
            "{}",
            style(format!("  {} → {}", from, work.status)).green().bold()
        );
    }
    output::print(work, format)
}

/// Arguments for `set`.
pub struct SetArgs {
    pub title: Option<String>,
    pub body: Option<String>,
    pub role: Option<String>,
    pub assignments: Vec<String>,
}

impl SetArgs {
    fn into_patch(self) -> Result<WorkPatch> {
        let mut patch = WorkPatch::new();
        if let Some(title) = self.title {
            patch = patch.with_title(title);
        }
        if let Some(body) = self.body {
            patch = patch.with_body(body);
        }
        if let Some(role) = self.role {
            patch = patch.with_role(role);
        }
        for assignment in &self.assignments {
            patch = patch
                .assign(assignment)
                .with_context(|| format!("Invalid assignment '{assignment}'"))?;
        }
        if patch == WorkPatch::new() {
            bail!("Nothing to set: pass --title, --body, --role or key=value assignments");
        }
        Ok(patch)
    }
}

/// Set fields on a work item.
pub fn set(data_dir: &Path, id: &str, args: SetArgs, format: OutputFormat) -> Result<()> {
    let patch = args.into_patch()?;
    let store = open(data_dir)?;
    let work = store
        .update(id, &patch)
        .with_context(|| format!("Failed to update {id}"))?;
    output::print(&work, format)
}

/// Delete a work item.
pub fn remove(data_dir: &Path, id: &str, format: OutputFormat) -> Result<()> {
    let store = open(data_dir)?;
    let removed = store
        .delete(id)
        .with_context(|| format!("Failed to delete {id}"))?;
    output::print_success(&format!("Deleted {} ({})", removed.id, removed.title), format)
}

/// Print external change events until Ctrl-C.
pub fn watch(data_dir: &Path, format: OutputFormat) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let store = open(data_dir)?;
        store.add_on_change_listener(move |event| {
            if let Err(e) = output::print_event(event, format) {
                tracing::warn!(error = %e, "Failed to print change event");
            }
        });
        store.start_watching().context("Failed to watch data directory")?;

        if matches!(format, OutputFormat::Human) {
            eprintln!(
                "{}",
                style(format!("Watching {} (Ctrl-C to stop)", store.index_path().display())).dim()
            );
        }

        tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
        store.stop_watching();
        Ok(())
    })
}
