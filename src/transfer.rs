use crate::backend::{Backend, BackendError};
use crate::clipboard::{ClipboardError, ClipboardWriter};
use crate::persistence::{KeyValueStore, PersistenceStore};
use crate::selection::SelectionController;
use crate::utils;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Requesting,
    Copying,
    Succeeded,
    Failed,
}

/// Which clipboard route took the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyRoute {
    System,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    NothingSelected,
    Copied {
        files: usize,
        route: CopyRoute,
        tokens: usize,
        /// Set when the text reached the clipboard but the counters could not be saved.
        usage_error: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Server error: {0}")]
    Backend(#[from] BackendError),
    #[error("Copy failed: {system}; {terminal}")]
    Clipboard {
        system: ClipboardError,
        terminal: ClipboardError,
    },
}

/// Fetches the merged text for the current selection and puts it on the
/// clipboard.
///
/// The whole run happens on the caller's thread without yielding: the read
/// request blocks, and the clipboard write follows directly on the key event
/// that started it. Usage counters move only after a successful write.
pub struct ClipboardTransfer {
    primary: Box<dyn ClipboardWriter>,
    fallback: Box<dyn ClipboardWriter>,
    state: TransferState,
    last_run: Vec<TransferState>,
}

impl ClipboardTransfer {
    pub fn new(primary: Box<dyn ClipboardWriter>, fallback: Box<dyn ClipboardWriter>) -> Self {
        ClipboardTransfer {
            primary,
            fallback,
            state: TransferState::Idle,
            last_run: Vec::new(),
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// States visited by the most recent run, ending back at `Idle`.
    pub fn last_run(&self) -> &[TransferState] {
        &self.last_run
    }

    fn enter(&mut self, state: TransferState) {
        self.state = state;
        self.last_run.push(state);
    }

    pub fn copy_selection<B, S>(
        &mut self,
        selection: &SelectionController,
        backend: &B,
        store: &mut PersistenceStore<S>,
    ) -> Result<TransferOutcome, TransferError>
    where
        B: Backend + ?Sized,
        S: KeyValueStore,
    {
        let paths = selection.current_selection();
        if paths.is_empty() {
            return Ok(TransferOutcome::NothingSelected);
        }

        self.last_run.clear();
        self.enter(TransferState::Idle);
        let result = self.run(&paths, backend, store);
        self.enter(if result.is_ok() {
            TransferState::Succeeded
        } else {
            TransferState::Failed
        });
        self.enter(TransferState::Idle);
        result
    }

    fn run<B, S>(
        &mut self,
        paths: &[String],
        backend: &B,
        store: &mut PersistenceStore<S>,
    ) -> Result<TransferOutcome, TransferError>
    where
        B: Backend + ?Sized,
        S: KeyValueStore,
    {
        self.enter(TransferState::Requesting);
        let merged = backend.read_files(paths)?;

        self.enter(TransferState::Copying);
        let route = match self.primary.write_text(&merged) {
            Ok(()) => CopyRoute::System,
            Err(system) => match self.fallback.write_text(&merged) {
                Ok(()) => CopyRoute::Terminal,
                Err(terminal) => return Err(TransferError::Clipboard { system, terminal }),
            },
        };

        let usage_error = store.bump_usage(paths).err().map(|e| e.to_string());
        Ok(TransferOutcome::Copied {
            files: paths.len(),
            route,
            tokens: utils::approx_tokens(&merged),
            usage_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::FakeBackend;
    use crate::clipboard::tests::RecordingClipboard;
    use crate::persistence::MemoryStore;
    use crate::tree_model::tests::sample_tree;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shares a recording clipboard with the test after boxing it.
    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<RecordingClipboard>>);

    impl Shared {
        fn refusing() -> Self {
            let shared = Shared::default();
            shared.0.borrow_mut().refuse = true;
            shared
        }

        fn written(&self) -> Vec<String> {
            self.0.borrow().written.clone()
        }
    }

    impl ClipboardWriter for Shared {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            self.0.borrow_mut().write_text(text)
        }
    }

    fn transfer(primary: &Shared, fallback: &Shared) -> ClipboardTransfer {
        ClipboardTransfer::new(Box::new(primary.clone()), Box::new(fallback.clone()))
    }

    fn selected(paths: &[&str]) -> SelectionController {
        let mut sel = SelectionController::new(sample_tree());
        sel.replace_selection(paths);
        sel
    }

    #[test]
    fn empty_selection_does_nothing() {
        let (primary, fallback) = (Shared::default(), Shared::default());
        let mut xfer = transfer(&primary, &fallback);
        let backend = FakeBackend::default();
        let mut store = PersistenceStore::load(MemoryStore::default());

        let outcome = xfer
            .copy_selection(&selected(&[]), &backend, &mut store)
            .unwrap();

        assert_eq!(outcome, TransferOutcome::NothingSelected);
        assert!(backend.read_calls.borrow().is_empty());
        assert!(primary.written().is_empty());
        assert!(store.usage().is_empty());
        assert!(xfer.last_run().is_empty());
        assert_eq!(xfer.state(), TransferState::Idle);
    }

    #[test]
    fn successful_copy_bumps_exactly_the_selection() {
        let (primary, fallback) = (Shared::default(), Shared::default());
        let mut xfer = transfer(&primary, &fallback);
        let backend = FakeBackend::default();
        let mut store = PersistenceStore::load(MemoryStore::default());
        store.bump_usage(&["src/b.txt"]).unwrap();

        let sel = selected(&["README.md", "src/a.txt", "src/nested/c.txt"]);
        let outcome = xfer.copy_selection(&sel, &backend, &mut store).unwrap();

        assert!(matches!(
            outcome,
            TransferOutcome::Copied {
                files: 3,
                route: CopyRoute::System,
                usage_error: None,
                ..
            }
        ));
        assert_eq!(
            backend.read_calls.borrow()[0],
            vec!["src/a.txt", "src/nested/c.txt", "README.md"]
        );
        let written = primary.written();
        assert_eq!(written.len(), 1);
        assert!(written[0].contains("--- src/a.txt ---"));
        assert!(fallback.written().is_empty());

        assert_eq!(store.count("src/a.txt"), 1);
        assert_eq!(store.count("src/nested/c.txt"), 1);
        assert_eq!(store.count("README.md"), 1);
        assert_eq!(store.count("src/b.txt"), 1);
        assert_eq!(
            xfer.last_run(),
            &[
                TransferState::Idle,
                TransferState::Requesting,
                TransferState::Copying,
                TransferState::Succeeded,
                TransferState::Idle
            ]
        );
    }

    #[test]
    fn server_failure_aborts_before_clipboard() {
        let (primary, fallback) = (Shared::default(), Shared::default());
        let mut xfer = transfer(&primary, &fallback);
        let backend = FakeBackend {
            fail_reads: true,
            ..Default::default()
        };
        let mut store = PersistenceStore::load(MemoryStore::default());

        let err = xfer
            .copy_selection(&selected(&["src/a.txt"]), &backend, &mut store)
            .unwrap_err();

        assert!(matches!(err, TransferError::Backend(_)));
        assert!(primary.written().is_empty());
        assert!(fallback.written().is_empty());
        assert_eq!(store.count("src/a.txt"), 0);
        assert_eq!(
            xfer.last_run(),
            &[
                TransferState::Idle,
                TransferState::Requesting,
                TransferState::Failed,
                TransferState::Idle
            ]
        );
    }

    #[test]
    fn rejected_system_clipboard_falls_back_to_terminal() {
        let (primary, fallback) = (Shared::refusing(), Shared::default());
        let mut xfer = transfer(&primary, &fallback);
        let backend = FakeBackend::default();
        let mut store = PersistenceStore::load(MemoryStore::default());

        let outcome = xfer
            .copy_selection(&selected(&["src/b.txt"]), &backend, &mut store)
            .unwrap();

        assert!(matches!(
            outcome,
            TransferOutcome::Copied {
                route: CopyRoute::Terminal,
                ..
            }
        ));
        assert_eq!(fallback.written().len(), 1);
        assert_eq!(store.count("src/b.txt"), 1);
    }

    #[test]
    fn both_routes_failing_leaves_counters_alone() {
        let (primary, fallback) = (Shared::refusing(), Shared::refusing());
        let mut xfer = transfer(&primary, &fallback);
        let backend = FakeBackend::default();
        let mut store = PersistenceStore::load(MemoryStore::default());

        let err = xfer
            .copy_selection(&selected(&["src/b.txt"]), &backend, &mut store)
            .unwrap_err();

        assert!(matches!(err, TransferError::Clipboard { .. }));
        assert!(store.usage().is_empty());
        assert_eq!(xfer.state(), TransferState::Idle);
        assert_eq!(
            xfer.last_run(),
            &[
                TransferState::Idle,
                TransferState::Requesting,
                TransferState::Copying,
                TransferState::Failed,
                TransferState::Idle
            ]
        );
    }
}
