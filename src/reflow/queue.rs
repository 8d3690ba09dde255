//! Debounced reflow scheduling.
//!
//! Keystrokes schedule a reflow; the queue waits for a quiet period and then
//! runs a single reflow. A request arriving while one is pending replaces it
//! (the earliest edited page wins) instead of being dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use super::{reflow, ReflowOptions, ReflowReport};
use crate::models::Page;

/// Quiet period before a scheduled reflow runs
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Result of one debounced reflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReflowRun {
    /// Increments with every completed run
    pub sequence: u64,
    pub edited_page: usize,
    pub report: ReflowReport,
}

/// Single-slot reflow queue over shared page state
pub struct ReflowQueue {
    requests: mpsc::UnboundedSender<usize>,
    runs: watch::Receiver<Option<ReflowRun>>,
    task: JoinHandle<()>,
}

impl ReflowQueue {
    pub fn spawn(pages: Arc<Mutex<Vec<Page>>>, options: ReflowOptions, debounce: Duration) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let (done, runs) = watch::channel(None);
        let task = tokio::spawn(run_queue(rx, pages, options, debounce, done));
        Self { requests, runs, task }
    }

    /// Asks for a reflow starting at `edited_page`
    pub fn schedule(&self, edited_page: usize) {
        if self.requests.send(edited_page).is_err() {
            tracing::warn!(edited_page, "reflow queue stopped, request ignored");
        }
    }

    /// Completed runs, latest first
    pub fn subscribe(&self) -> watch::Receiver<Option<ReflowRun>> {
        self.runs.clone()
    }
}

impl Drop for ReflowQueue {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_queue(
    mut rx: mpsc::UnboundedReceiver<usize>,
    pages: Arc<Mutex<Vec<Page>>>,
    options: ReflowOptions,
    debounce: Duration,
    done: watch::Sender<Option<ReflowRun>>,
) {
    let mut sequence = 0;

    while let Some(first) = rx.recv().await {
        let mut pending = first;
        let mut closed = false;

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(page) => pending = pending.min(page),
                    None => {
                        closed = true;
                        break;
                    }
                },
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let report = {
            let mut pages = pages.lock().await;
            reflow(&mut pages, pending, &options)
        };
        sequence += 1;
        let _ = done.send(Some(ReflowRun {
            sequence,
            edited_page: pending,
            report,
        }));

        if closed {
            break;
        }
    }
}
