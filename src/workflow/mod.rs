use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::config::AppConfig;
use crate::error::{LocError, Result};
use crate::extract::Extractor;
use crate::merge::Merger;
use crate::progress::Progress;
use crate::remote::RemoteSync;

/// How a workflow run ended. Cancellation is an outcome, not an error; any
/// artifacts written before the stop remain on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed,
    Cancelled,
}

/// Run the four-step pipeline: extract, upload, download, merge.
///
/// Each step is gated on the previous one succeeding, and the cancellation
/// flag is checked between steps as well as at every file boundary inside
/// extract and merge. A failure leaves everything already written in place,
/// so the run can be retried after fixing the cause.
pub fn run_workflow(
    config: &AppConfig,
    remote: &dyn RemoteSync,
    progress: &dyn Progress,
) -> Result<WorkflowOutcome> {
    info!("workflow step 1/4: extract");
    let mut extractor = Extractor::new(&config.scan_dir);
    extractor.set_fields(config.fields.clone());
    extractor.set_incremental(config.incremental);
    extractor.set_filter_symbolic(config.filter_symbolic);

    let extract_output = Path::new(&config.extract_output);
    let extracted = if config.by_folder {
        extractor.run_by_folder(extract_output, progress)?
    } else {
        extractor.run(extract_output, progress)?
    };
    if extracted.is_cancelled() {
        return Ok(WorkflowOutcome::Cancelled);
    }

    info!("workflow step 2/4: upload");
    if !remote.test_connection()? {
        return Err(LocError::Generic(
            "remote connection test failed, check the project id and token".to_string(),
        ));
    }
    remote.upload(extract_output)?;
    if progress.is_cancelled() {
        return Ok(WorkflowOutcome::Cancelled);
    }

    info!("workflow step 3/4: download");
    let translation_file = Path::new(&config.translation_file);
    remote.download(translation_file)?;
    if progress.is_cancelled() {
        return Ok(WorkflowOutcome::Cancelled);
    }

    info!("workflow step 4/4: merge");
    let mut merger = Merger::new(&config.scan_dir, &config.merge_output);
    merger.set_fields(config.fields.clone());
    if merger.run(translation_file, progress)?.is_cancelled() {
        return Ok(WorkflowOutcome::Cancelled);
    }

    info!("workflow finished");
    Ok(WorkflowOutcome::Completed)
}

/// Mutual exclusion for workflow runs: at most one job at a time, whether it
/// runs inline or on a background thread. A second caller gets `Busy`
/// immediately instead of queueing.
#[derive(Clone, Default)]
pub struct Runner {
    busy: Arc<AtomicBool>,
}

/// Holds the busy slot; dropping it releases the runner.
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn acquire(&self) -> Result<RunGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(RunGuard {
                busy: Arc::clone(&self.busy),
            })
        } else {
            Err(LocError::Busy)
        }
    }

    /// Run a job inline while holding the slot.
    pub fn run<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let _guard = self.acquire()?;
        job()
    }

    /// Run a job on a background thread; the slot is held until the job
    /// returns and released even if it panics.
    pub fn spawn<T, F>(&self, job: F) -> Result<JoinHandle<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let guard = self.acquire()?;
        Ok(thread::spawn(move || {
            let _guard = guard;
            job()
        }))
    }
}
