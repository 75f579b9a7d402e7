use crate::backend::{Backend, BackendError, UpdateReport};
use std::sync::{Arc, mpsc};
use std::thread;

pub type UpdateResult = Result<UpdateReport, BackendError>;

/// Runs the repository update off the UI thread.
///
/// While a request is in flight the trigger is disabled and further
/// `start` calls are refused, so at most one update runs at a time.
#[derive(Default)]
pub struct UpdateTrigger {
    pending: Option<mpsc::Receiver<UpdateResult>>,
}

impl UpdateTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.pending.is_none()
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn start<B>(&mut self, backend: Arc<B>, branch: Option<String>) -> bool
    where
        B: Backend + Send + Sync + ?Sized + 'static,
    {
        if self.pending.is_some() {
            return false;
        }

        let (tx, rx) = mpsc::channel();
        self.pending = Some(rx);

        thread::spawn(move || {
            let result = backend.update_repo(branch.as_deref());
            let _ = tx.send(result);
        });
        true
    }

    /// Non-blocking. Returns the result once the worker is done and
    /// re-enables the trigger, whatever the outcome.
    pub fn poll(&mut self) -> Option<UpdateResult> {
        let rx = self.pending.as_ref()?;
        let done = match rx.try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => Err(BackendError::Transport(
                "update worker stopped without a result".to_string(),
            )),
        };
        self.pending = None;
        Some(done)
    }

    /// Blocks until the in-flight update finishes. Used outside the TUI.
    pub fn wait(&mut self) -> Option<UpdateResult> {
        let rx = self.pending.take()?;
        Some(rx.recv().unwrap_or_else(|_| {
            Err(BackendError::Transport(
                "update worker stopped without a result".to_string(),
            ))
        }))
    }
}

/// Operator-facing summary of an update result.
pub fn describe(result: &UpdateResult) -> String {
    match result {
        Ok(report) if report.ok => format!("Repo updated:\n\n{}", report.log),
        Ok(report) => format!("Update failed:\n\n{}", report.log),
        Err(e) => format!("Update failed:\n\n{}", e),
    }
}
