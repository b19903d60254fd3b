//! Off-thread analysis.
//!
//! A job runs to completion on the rayon pool (or a plain thread without the
//! `threading` feature) and its whole result comes back over a channel. There
//! are no partial results and no cancellation: dropping the handle only
//! discards the result.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use log::{debug, error};

use crate::error::{Result, TerrainError};

pub struct AnalysisWorker;

impl AnalysisWorker {
    pub fn spawn<T, F>(job: F) -> AnalysisHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let task = move || {
            let outcome = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref());
                error!("analysis job panicked: {msg}");
                Err(TerrainError::Worker(format!("job panicked: {msg}")))
            });
            if tx.send(outcome).is_err() {
                debug!("analysis result dropped, handle went away");
            }
        };

        #[cfg(feature = "threading")]
        rayon::spawn(task);
        #[cfg(not(feature = "threading"))]
        std::thread::spawn(task);

        AnalysisHandle { rx }
    }
}

/// Receiving end of a spawned job.
pub struct AnalysisHandle<T> {
    rx: Receiver<Result<T>>,
}

impl<T> AnalysisHandle<T> {
    /// Block until the job finishes.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| TerrainError::Worker("job ended without a result".into()))?
    }

    /// `None` while the job is still running.
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(TerrainError::Worker("job ended without a result".into())))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
