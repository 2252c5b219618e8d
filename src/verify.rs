//! Repository-level classification: does this tree implement an MCP server?
//!
//! Two independent signals are collected per file. A *server declaration* is
//! an SDK server import or constructor in a file that has no client-side
//! usage; a *registration pattern* is a tool handler or registration idiom.
//! The pair maps onto a [`Confidence`](crate::model::Confidence) level.

use crate::discovery::scan::{self, ScanOptions};
use crate::model::{ConfidenceResult, DetectionEvidence};
use crate::util;
use anyhow::Result;
use regex::RegexSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static SERVER_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // python sdk
        r"from mcp\.server import",
        r"import mcp\.server",
        r"from mcp\.server\.stdio import",
        r"from mcp\.server\.sse import",
        r#"Server\(.*["'].*["'].*\)"#,
        r"from mcp\.server\.fastmcp import",
        r"from mcp\.server\.fastmcp\.server import",
        r"FastMCP\(",
        // typescript / javascript
        r"@modelcontextprotocol/sdk/server",
        r#"from ["'][^"']*fastmcp[^"']*["']"#,
        r#"import.*from ["'][^"']*fastmcp[^"']*["']"#,
        // go
        r"github\.com/modelcontextprotocol/go-sdk/server",
        r"mcp\.Server",
        r"server\.NewMCPServer",
        // kotlin
        r"io\.modelcontextprotocol\.kotlin\.sdk",
        // php
        r"use Laravel\\Mcp\\",
        r"Laravel\\Mcp\\Server",
        r"use.*\\Mcp\\Server\\Tool",
        r"namespace.*\\Mcp\\",
        // c#
        r"using (?:Azure|Microsoft|Fabric)\.Mcp",
        r"namespace (?:Azure|Microsoft|Fabric)\.Mcp",
    ])
    .expect("valid regex")
});

static CLIENT_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"from mcp\.client import",
        r"from mcp import ClientSession",
        r"ClientSession\(",
        r"stdio_client\(",
    ])
    .expect("valid regex")
});

static REGISTRATION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // python
        r"@server\.list_tools\(\)",
        r"@server\.call_tool\(\)",
        // typescript / javascript, kotlin
        r"server\.registerTool\(",
        r"McpServer\(",
        r"server\.addTool\(",
        r"\.addTool\(\s*\{",
        // go
        r"server\.RegisterTool\(",
        r"server\.AddTool\(",
        r"NewMCPServer\(",
        r"mcp\.NewServer\(",
        r"\.ListTools\(",
        r"\.CallTool\(",
        // php
        r"class\s+\w+\s+extends\s+Tool",
        r"implements.*Tool",
        r"#\[IsReadOnly\]",
        r"#\[Tool\]",
        r"protected\s+string\s+\$description",
        // c#
        r"class\s+\w+Command\s*:",
        r"BaseAzureCommand",
        r"BaseMcpCommand",
        r"ExecuteAsync\s*\(",
        r"HandleAsync\s*\(",
        r"IMcpTool",
        r"IMcpServer",
        r"\[McpTool\]",
        r"\[Tool\]",
    ])
    .expect("valid regex")
});

/// Server imports or constructors, with no client usage in the same file.
pub fn has_server_declaration(text: &str) -> bool {
    SERVER_PATTERNS.is_match(text) && !CLIENT_PATTERNS.is_match(text)
}

pub fn has_registration_pattern(text: &str) -> bool {
    REGISTRATION_PATTERNS.is_match(text)
}

/// Accumulates per-file signals into [`DetectionEvidence`].
#[derive(Debug, Default)]
pub struct EvidenceCollector {
    evidence: DetectionEvidence,
}

impl EvidenceCollector {
    pub fn observe(&mut self, rel_path: &str, text: &str) {
        let server = has_server_declaration(text);
        let registration = has_registration_pattern(text);
        self.evidence.has_server_declaration |= server;
        self.evidence.has_registration_pattern |= registration;
        if (server || registration)
            && !self.evidence.evidence_files.iter().any(|file| file == rel_path)
        {
            self.evidence.evidence_files.push(rel_path.to_string());
        }
    }

    pub fn finish(self) -> ConfidenceResult {
        ConfidenceResult::from(self.evidence)
    }
}

pub fn verify_repository(repo_root: &Path, options: &ScanOptions) -> Result<ConfidenceResult> {
    let files = scan::scan_repo_with_options(repo_root, options)?;
    let mut collector = EvidenceCollector::default();
    for file in &files {
        let text = match util::read_to_string(&file.abs_path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %file.rel_path, error = %err, "skipping unreadable file");
                continue;
            }
        };
        collector.observe(&file.rel_path, &text);
    }
    let result = collector.finish();
    info!(
        root = %repo_root.display(),
        confidence = %result.confidence,
        evidence = result.evidence.evidence_files.len(),
        "verification finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Confidence;

    #[test]
    fn client_usage_cancels_server_declaration() {
        assert!(has_server_declaration("from mcp.server.fastmcp import FastMCP\n"));
        assert!(!has_server_declaration(
            "from mcp.server import Server\nfrom mcp import ClientSession\n"
        ));
        assert!(has_server_declaration("using Azure.Mcp.Core.Commands;"));
        assert!(!has_server_declaration("import requests\n"));
    }

    #[test]
    fn registration_patterns() {
        assert!(has_registration_pattern("@server.list_tools()\nasync def list(): ..."));
        assert!(has_registration_pattern("server.addTool({ name: 'x' })"));
        assert!(has_registration_pattern("server.AddTool(tool, handler)"));
        assert!(has_registration_pattern("public sealed class GetCommand : BaseCommand"));
        assert!(!has_registration_pattern("def add(a, b): return a + b"));
    }

    #[test]
    fn collector_orders_and_dedupes_evidence() {
        let mut collector = EvidenceCollector::default();
        collector.observe("b.py", "from mcp.server import Server");
        collector.observe("a.ts", "plain text");
        collector.observe("c.ts", "server.registerTool(\"x\", {})");
        collector.observe("b.py", "@server.call_tool()");
        let result = collector.finish();
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.is_likely_server);
        assert_eq!(result.evidence.evidence_files, vec!["b.py", "c.ts"]);
    }

    #[test]
    fn registration_alone_is_medium() {
        let mut collector = EvidenceCollector::default();
        collector.observe("main.go", "server.AddTool(tool, handler)");
        let result = collector.finish();
        assert_eq!(result.confidence, Confidence::Medium);
        assert!(!result.evidence.has_server_declaration);
    }
}
