use crate::backend::{Backend, HttpBackend};
use crate::clipboard::{Osc52Clipboard, SystemClipboard};
use crate::persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceStore};
use crate::selection::SelectionController;
use crate::transfer::{ClipboardTransfer, CopyRoute, TransferError, TransferOutcome};
use crate::tree_model::TreeModel;
use crate::tree_source::TreeSource;
use crate::update::{self, UpdateTrigger};
use crate::{cli, tui};
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;

pub type SharedBackend = Arc<dyn Backend + Send + Sync>;

/// Everything one picker session works on: the tree and its selection, the
/// persisted counters and groups, the clipboard transfer and the update trigger.
pub struct Session {
    pub source: TreeSource,
    pub selection: SelectionController,
    pub store: PersistenceStore<Box<dyn KeyValueStore>>,
    pub transfer: ClipboardTransfer,
    pub backend: SharedBackend,
    pub branch: Option<String>,
    pub update: UpdateTrigger,
}

impl Session {
    pub fn new(
        source: TreeSource,
        store: PersistenceStore<Box<dyn KeyValueStore>>,
        transfer: ClipboardTransfer,
        backend: SharedBackend,
        branch: Option<String>,
    ) -> Result<Self> {
        let model = TreeModel::build(source.load()?);
        Ok(Session {
            source,
            selection: SelectionController::new(model),
            store,
            transfer,
            backend,
            branch,
            update: UpdateTrigger::new(),
        })
    }

    pub fn copy(&mut self) -> Result<TransferOutcome, TransferError> {
        self.transfer
            .copy_selection(&self.selection, self.backend.as_ref(), &mut self.store)
    }

    pub fn start_update(&mut self) -> bool {
        self.update
            .start(Arc::clone(&self.backend), self.branch.clone())
    }

    /// Throws away the tree, the selection and the cached store contents and
    /// loads them again. Called after the repository was updated.
    pub fn reload(&mut self) -> Result<()> {
        let model = TreeModel::build(self.source.load()?);
        self.selection.reset(model);
        self.store.reload();
        Ok(())
    }
}

/// Status-line text for a finished copy.
pub fn describe_copy(result: &Result<TransferOutcome, TransferError>) -> Option<String> {
    match result {
        Ok(TransferOutcome::NothingSelected) => None,
        Ok(TransferOutcome::Copied {
            files,
            route,
            tokens,
            usage_error,
        }) => {
            let via = match route {
                CopyRoute::System => "",
                CopyRoute::Terminal => " via terminal (OSC 52)",
            };
            let mut msg = format!(
                "✅ Copied {} files (≈ {} tokens) to the clipboard{}.",
                files, tokens, via
            );
            if let Some(e) = usage_error {
                msg.push_str(&format!(" Usage counts not saved: {}", e));
            }
            Some(msg)
        }
        Err(e) => Some(e.to_string()),
    }
}

fn open_store(cli_args: &cli::Cli) -> PersistenceStore<Box<dyn KeyValueStore>> {
    if cli_args.no_persist {
        return PersistenceStore::load(Box::new(MemoryStore::default()));
    }
    match cli_args.state_dir.clone().or_else(FileStore::default_dir) {
        Some(dir) => PersistenceStore::load(Box::new(FileStore::new(dir))),
        None => {
            eprintln!(
                "⚠️ Warning: No config directory found; counters and groups will not be saved."
            );
            PersistenceStore::load(Box::new(MemoryStore::default()))
        }
    }
}

fn tree_source(cli_args: &cli::Cli) -> TreeSource {
    match &cli_args.tree {
        Some(path) => TreeSource::Json(path.clone()),
        None => TreeSource::Scan {
            root: cli_args.root.clone(),
            include_ignored: cli_args.include_ignored,
        },
    }
}

pub fn build_session(cli_args: &cli::Cli) -> Result<Session> {
    let transfer = ClipboardTransfer::new(
        Box::new(SystemClipboard),
        Box::new(Osc52Clipboard::stdout()),
    );
    let backend: SharedBackend = Arc::new(HttpBackend::new(&cli_args.server));
    Session::new(
        tree_source(cli_args),
        open_store(cli_args),
        transfer,
        backend,
        cli_args.branch.clone(),
    )
}

// Headless mode: no TUI, one copy or one update, then exit.
fn run_headless_mode(session: &mut Session, cli_args: &cli::Cli) -> Result<()> {
    if cli_args.update {
        session.start_update();
        if let Some(result) = session.update.wait() {
            println!("{}", update::describe(&result));
            if !matches!(&result, Ok(report) if report.ok) {
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if let Some(name) = &cli_args.group {
        match session.store.find_group(name) {
            Some(group) => {
                let paths = group.paths.clone();
                session.selection.replace_selection(&paths);
            }
            None => {
                eprintln!("Error: No saved group named '{}'.", name);
                std::process::exit(1);
            }
        }
    }

    let result = session.copy();
    match describe_copy(&result) {
        None => {
            println!("No files selected or matched criteria to copy.");
            std::process::exit(1);
        }
        Some(msg) if result.is_err() => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
        Some(msg) => println!("{}", msg),
    }
    Ok(())
}

/// Selects `paths` and returns the distinct ones that are not files in the tree.
fn preselect(selection: &mut SelectionController, paths: &[String]) -> Vec<String> {
    selection.replace_selection(paths);
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| !selection.is_selected(p.as_str()) && seen.insert(*p))
        .cloned()
        .collect()
}

// Main orchestrator for the repopick application logic.
pub fn run_repopick(cli_args: cli::Cli) -> Result<()> {
    let mut session = build_session(&cli_args)?;

    if !cli_args.select.is_empty() {
        let skipped = preselect(&mut session.selection, &cli_args.select);
        if !skipped.is_empty() {
            eprintln!(
                "⚠️ Warning: {} --select path(s) are not files in the tree and were skipped: {}",
                skipped.len(),
                skipped.join(", ")
            );
        }
    }

    if cli_args.headless {
        return run_headless_mode(&mut session, &cli_args);
    }

    tui::run_tui(session)
}
