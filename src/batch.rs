//! Scanning many repositories with a bounded pool of worker threads.

use crate::acquire::Acquire;
use crate::discovery::Discovery;
use crate::discovery::scan::ScanOptions;
use crate::model::{Confidence, RepoScanOutcome, ScanFailure};
use crate::verify;
use anyhow::{Context, Result};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use tracing::{info, warn};

/// Scans every identifier and returns the outcomes in completion order.
pub fn scan_batch(
    identifiers: Vec<String>,
    acquirer: Arc<dyn Acquire>,
    options: &ScanOptions,
    workers: usize,
) -> Result<Vec<RepoScanOutcome>> {
    let mut outcomes = Vec::with_capacity(identifiers.len());
    scan_batch_with(identifiers, acquirer, options, workers, |outcome| {
        outcomes.push(outcome)
    })?;
    Ok(outcomes)
}

/// Like [`scan_batch`], handing each outcome to `on_outcome` as soon as it
/// is ready.
pub fn scan_batch_with(
    identifiers: Vec<String>,
    acquirer: Arc<dyn Acquire>,
    options: &ScanOptions,
    workers: usize,
    mut on_outcome: impl FnMut(RepoScanOutcome),
) -> Result<()> {
    let total = identifiers.len();
    if total == 0 {
        return Ok(());
    }
    let workers = workers.clamp(1, total);
    let queue = Arc::new(Mutex::new(identifiers.into_iter().collect::<VecDeque<_>>()));
    let (tx, rx) = mpsc::channel();

    let mut handles = Vec::with_capacity(workers);
    for index in 0..workers {
        let queue = Arc::clone(&queue);
        let acquirer = Arc::clone(&acquirer);
        let tx = tx.clone();
        let options = options.clone();
        let handle = thread::Builder::new()
            .name(format!("mcpscan-worker-{index}"))
            .spawn(move || worker_loop(&queue, acquirer.as_ref(), &options, &tx))
            .context("spawn batch worker")?;
        handles.push(handle);
    }
    drop(tx);

    for outcome in rx {
        on_outcome(outcome);
    }
    for handle in handles {
        if handle.join().is_err() {
            warn!("batch worker exited abnormally");
        }
    }
    info!(repositories = total, "batch finished");
    Ok(())
}

fn worker_loop(
    queue: &Mutex<VecDeque<String>>,
    acquirer: &dyn Acquire,
    options: &ScanOptions,
    tx: &mpsc::Sender<RepoScanOutcome>,
) {
    // Each worker owns its parsers; a panic discards them.
    let mut engine: Option<Discovery> = None;
    while let Some(identifier) = next_identifier(queue) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            scan_one(&identifier, acquirer, options, &mut engine)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => {
                engine = None;
                RepoScanOutcome::failed(
                    &identifier,
                    ScanFailure::AnalysisFailed {
                        reason: format!("panic: {}", panic_message(payload.as_ref())),
                    },
                )
            }
        };
        if tx.send(outcome).is_err() {
            return;
        }
    }
}

fn next_identifier(queue: &Mutex<VecDeque<String>>) -> Option<String> {
    match queue.lock() {
        Ok(mut pending) => pending.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

/// Acquire, discover and verify one repository. Never fails: every error is
/// folded into the outcome.
pub fn scan_one(
    identifier: &str,
    acquirer: &dyn Acquire,
    options: &ScanOptions,
    engine: &mut Option<Discovery>,
) -> RepoScanOutcome {
    let workspace = match acquirer.acquire(identifier) {
        Ok(workspace) => workspace,
        Err(err) => {
            warn!(repository = identifier, error = %err, "acquisition failed");
            return RepoScanOutcome::failed(identifier, err.to_failure());
        }
    };

    if engine.is_none() {
        match Discovery::new_with_options(options.clone()) {
            Ok(created) => *engine = Some(created),
            Err(err) => {
                return RepoScanOutcome::failed(
                    identifier,
                    ScanFailure::AnalysisFailed {
                        reason: format!("{err:#}"),
                    },
                );
            }
        }
    }
    let Some(discovery) = engine.as_mut() else {
        return RepoScanOutcome::failed(
            identifier,
            ScanFailure::AnalysisFailed {
                reason: "discovery engine unavailable".to_string(),
            },
        );
    };

    let analysis = discovery.discover(workspace.root()).and_then(|report| {
        let verification = verify::verify_repository(workspace.root(), options)?;
        Ok((report, verification))
    });
    match analysis {
        Ok((report, _)) if report.files_scanned == 0 => {
            RepoScanOutcome::failed(identifier, ScanFailure::NoSupportedFiles)
        }
        Ok((report, verification)) => {
            info!(
                repository = identifier,
                tools = report.tools.len(),
                confidence = %verification.confidence,
                "repository scanned"
            );
            RepoScanOutcome {
                repository: identifier.to_string(),
                tools: report.tools,
                verification: Some(verification),
                failure: None,
            }
        }
        Err(err) => RepoScanOutcome::failed(
            identifier,
            ScanFailure::AnalysisFailed {
                reason: format!("{err:#}"),
            },
        ),
    }
}

/// Running totals over a batch, printed once it ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub repositories: usize,
    pub failed: usize,
    pub high: usize,
    pub medium: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &RepoScanOutcome) {
        self.repositories += 1;
        if outcome.is_failure() {
            self.failed += 1;
            return;
        }
        match outcome.verification.as_ref().map(|result| result.confidence) {
            Some(Confidence::High) => self.high += 1,
            Some(Confidence::Medium) => self.medium += 1,
            _ => {}
        }
    }

    pub fn servers(&self) -> usize {
        self.high + self.medium
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total repositories: {}", self.repositories)?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "MCP servers found: {}", self.servers())?;
        writeln!(f, "  - High confidence: {}", self.high)?;
        writeln!(f, "  - Medium confidence: {}", self.medium)?;
        write!(
            f,
            "Non-MCP repositories: {}",
            self.repositories - self.failed - self.servers()
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfidenceResult, DetectionEvidence};

    fn scanned(server: bool, registration: bool) -> RepoScanOutcome {
        RepoScanOutcome {
            repository: "owner/repo".to_string(),
            tools: Vec::new(),
            verification: Some(ConfidenceResult::from(DetectionEvidence {
                has_server_declaration: server,
                has_registration_pattern: registration,
                evidence_files: Vec::new(),
            })),
            failure: None,
        }
    }

    #[test]
    fn summary_splits_servers_by_confidence() {
        let mut summary = BatchSummary::default();
        summary.record(&scanned(true, true));
        summary.record(&scanned(true, false));
        summary.record(&scanned(false, true));
        summary.record(&scanned(false, false));
        summary.record(&RepoScanOutcome::failed("x/y", ScanFailure::NoSupportedFiles));
        assert_eq!(
            summary,
            BatchSummary {
                repositories: 5,
                failed: 1,
                high: 1,
                medium: 2,
            }
        );
        let text = summary.to_string();
        assert!(text.contains("MCP servers found: 3"));
        assert!(text.ends_with("Non-MCP repositories: 1"));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
