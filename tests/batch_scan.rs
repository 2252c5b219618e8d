use mcpscan::acquire::{Acquire, AcquireError, RepoWorkspace};
use mcpscan::batch::scan_batch;
use mcpscan::discovery::scan::ScanOptions;
use mcpscan::model::{Confidence, RepoScanOutcome, ScanFailure};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Serves canned checkouts keyed by identifier.
struct FakeAcquirer;

impl Acquire for FakeAcquirer {
    fn acquire(&self, identifier: &str) -> Result<RepoWorkspace, AcquireError> {
        match identifier {
            "good" => {
                let dir = TempDir::new().map_err(AcquireError::Workspace)?;
                fs::write(
                    dir.path().join("server.py"),
                    "from mcp.server.fastmcp import FastMCP\n\nmcp = FastMCP(\"demo\")\n\n\
@mcp.tool()\ndef search(query):\n    \"\"\"Search the web.\"\"\"\n",
                )
                .map_err(AcquireError::Workspace)?;
                Ok(RepoWorkspace::from_temp_dir(dir))
            }
            "empty" => {
                let dir = TempDir::new().map_err(AcquireError::Workspace)?;
                fs::write(dir.path().join("README.md"), "# docs only\n")
                    .map_err(AcquireError::Workspace)?;
                Ok(RepoWorkspace::from_temp_dir(dir))
            }
            "slow" => Err(AcquireError::Timeout(Duration::from_secs(3))),
            "boom" => panic!("acquirer exploded"),
            _ => Err(AcquireError::CloneFailed {
                code: Some(128),
                stderr: "repository not found".to_string(),
            }),
        }
    }
}

fn run(identifiers: &[&str], workers: usize) -> Vec<RepoScanOutcome> {
    let mut outcomes = scan_batch(
        identifiers.iter().map(|id| id.to_string()).collect(),
        Arc::new(FakeAcquirer),
        &ScanOptions::default(),
        workers,
    )
    .unwrap();
    outcomes.sort_by(|a, b| a.repository.cmp(&b.repository));
    outcomes
}

#[test]
fn every_repository_gets_exactly_one_outcome() {
    let outcomes = run(&["good", "missing", "empty", "slow", "boom"], 3);
    let repositories: Vec<_> = outcomes.iter().map(|o| o.repository.as_str()).collect();
    assert_eq!(repositories, vec!["boom", "empty", "good", "missing", "slow"]);

    let good = &outcomes[2];
    assert!(!good.is_failure());
    let names: Vec<_> = good.tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["search"]);
    let verification = good.verification.as_ref().unwrap();
    assert_eq!(verification.confidence, Confidence::Medium);

    assert!(matches!(
        outcomes[0].failure,
        Some(ScanFailure::AnalysisFailed { ref reason }) if reason.contains("acquirer exploded")
    ));
    assert_eq!(outcomes[1].failure, Some(ScanFailure::NoSupportedFiles));
    assert!(matches!(
        outcomes[3].failure,
        Some(ScanFailure::AcquireFailed { ref reason }) if reason.contains("not found")
    ));
    assert_eq!(outcomes[4].failure, Some(ScanFailure::Timeout { seconds: 3 }));
}

#[test]
fn zero_workers_still_makes_progress() {
    let outcomes = run(&["good", "missing"], 0);
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].is_failure());
    assert!(outcomes[1].is_failure());
}

#[test]
fn empty_batch_yields_nothing() {
    assert!(run(&[], 4).is_empty());
}

#[test]
fn worker_survives_a_panic() {
    let outcomes = run(&["boom", "good"], 1);
    assert!(outcomes[0].is_failure());
    assert!(!outcomes[1].is_failure());
    assert_eq!(outcomes[1].tools.len(), 1);
}
