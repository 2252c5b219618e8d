use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mcpscan",
    version,
    about = "Discover MCP server tools in source repositories",
    after_help = r#"Examples:
  mcpscan tools --repo .
  mcpscan tools --repo ../server --format json
  mcpscan verify --repo . --json
  mcpscan inspect https://github.com/D4Vinci/Scrapling
  mcpscan inspect owner/repo --timeout-secs 60
  mcpscan batch owner/a owner/b --workers 2
  mcpscan batch --list repos.txt --limit 50 > results.jsonl
  mcpscan parse-report --path report.txt
"#
)]
pub struct Args {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the tools declared in a local repository.
    Tools {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Leave out files matched by .gitignore and .ignore rules.
        #[arg(long)]
        gitignore: bool,
    },
    /// Judge whether a local repository implements an MCP server.
    Verify {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        json: bool,
        /// Leave out files matched by .gitignore and .ignore rules.
        #[arg(long)]
        gitignore: bool,
    },
    /// Clone a repository, list its tools and verify it.
    Inspect {
        /// Git URL or GitHub owner/repo.
        repository: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Clone timeout; defaults to MCPSCAN_CLONE_TIMEOUT_SECS.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Scan many repositories, one JSON line per repository.
    Batch {
        repositories: Vec<String>,
        /// File with one repository per line (# starts a comment).
        #[arg(long, value_name = "PATH")]
        list: Option<PathBuf>,
        /// Scan only the first N repositories.
        #[arg(long)]
        limit: Option<usize>,
        /// Worker threads; defaults to MCPSCAN_WORKERS.
        #[arg(long)]
        workers: Option<usize>,
        /// Clone timeout; defaults to MCPSCAN_CLONE_TIMEOUT_SECS.
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Leave out files matched by .gitignore and .ignore rules.
        #[arg(long)]
        gitignore: bool,
    },
    /// Parse a text report back into JSON.
    ParseReport {
        /// Report file; stdin when omitted.
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_batch_arguments() {
        let args = Args::parse_from([
            "mcpscan", "-vv", "batch", "owner/a", "owner/b", "--workers", "2", "--limit", "1",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Batch {
                repositories,
                workers,
                list,
                limit,
                ..
            } => {
                assert_eq!(repositories, vec!["owner/a", "owner/b"]);
                assert_eq!(workers, Some(2));
                assert_eq!(limit, Some(1));
                assert!(list.is_none());
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn tools_defaults() {
        let args = Args::parse_from(["mcpscan", "tools"]);
        match args.command {
            Command::Tools {
                repo,
                format,
                gitignore,
            } => {
                assert_eq!(repo, PathBuf::from("."));
                assert_eq!(format, OutputFormat::Text);
                assert!(!gitignore);
            }
            _ => panic!("expected tools"),
        }
    }
}
