use anyhow::{Context, Result};
use clap::Parser;
use mcpscan::acquire::{Acquire, GitAcquirer};
use mcpscan::cli::{self, OutputFormat};
use mcpscan::config::Config;
use mcpscan::discovery::{Discovery, scan::ScanOptions};
use mcpscan::logging::{self, LoggingConfig};
use mcpscan::{batch, report, util, verify};
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn scan_options(use_ignore_files: bool) -> ScanOptions {
    ScanOptions::new(use_ignore_files).with_max_file_bytes(Config::get().max_file_bytes)
}

fn clone_timeout(timeout_secs: Option<u64>) -> Duration {
    timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| Config::get().clone_timeout())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init_logging(LoggingConfig::from_verbosity(args.verbose));

    match args.command {
        cli::Command::Tools {
            repo,
            format,
            gitignore,
        } => {
            let mut discovery = Discovery::new_with_options(scan_options(gitignore))?;
            let discovered = discovery.discover(&repo)?;
            match format {
                OutputFormat::Text => println!("{}", report::format_report(&discovered.tools)),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&discovered)?)
                }
            }
            Ok(())
        }
        cli::Command::Verify {
            repo,
            json,
            gitignore,
        } => {
            let result = verify::verify_repository(&repo, &scan_options(gitignore))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", report::format_verification(&result));
            }
            Ok(())
        }
        cli::Command::Inspect {
            repository,
            format,
            timeout_secs,
        } => {
            let acquirer = GitAcquirer::new(clone_timeout(timeout_secs));
            let workspace = match acquirer.acquire(&repository) {
                Ok(workspace) => workspace,
                Err(err) => {
                    eprintln!("Error: {err}");
                    std::process::exit(1);
                }
            };
            let options = scan_options(false);
            let mut discovery = Discovery::new_with_options(options.clone())?;
            let discovered = discovery.discover(workspace.root())?;
            let verification = verify::verify_repository(workspace.root(), &options)?;
            match format {
                OutputFormat::Text => {
                    println!("{}", report::format_report(&discovered.tools));
                    println!();
                    println!("{}", report::format_verification(&verification));
                }
                OutputFormat::Json => {
                    let value = json!({
                        "repository": repository,
                        "tools": discovered.tools,
                        "files_scanned": discovered.files_scanned,
                        "verification": verification,
                    });
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
            }
            Ok(())
        }
        cli::Command::Batch {
            mut repositories,
            list,
            limit,
            workers,
            timeout_secs,
            gitignore,
        } => {
            if let Some(list) = list {
                let text = util::read_to_string(&list)?;
                repositories.extend(util::parse_identifier_list(&text));
            }
            if let Some(limit) = limit {
                repositories.truncate(limit);
            }
            if repositories.is_empty() {
                anyhow::bail!("no repositories given; pass identifiers or --list");
            }
            let acquirer: Arc<dyn Acquire> = Arc::new(GitAcquirer::new(clone_timeout(timeout_secs)));
            let workers = workers.unwrap_or(Config::get().workers);
            let mut write_error = None;
            let mut summary = batch::BatchSummary::default();
            batch::scan_batch_with(
                repositories,
                acquirer,
                &scan_options(gitignore),
                workers,
                |outcome| {
                    summary.record(&outcome);
                    match serde_json::to_string(&outcome) {
                        Ok(line) => println!("{line}"),
                        Err(err) => {
                            write_error.get_or_insert(err);
                        }
                    }
                },
            )?;
            eprintln!("{summary}");
            match write_error {
                Some(err) => Err(err).context("serialize batch outcome"),
                None => Ok(()),
            }
        }
        cli::Command::ParseReport { path } => {
            let text = match path {
                Some(path) => util::read_to_string(Path::new(&path))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("read report from stdin")?;
                    buf
                }
            };
            let tools = report::parse_report(&text);
            println!("{}", serde_json::to_string_pretty(&tools)?);
            Ok(())
        }
    }
}
