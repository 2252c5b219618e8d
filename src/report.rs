use crate::model::{ConfidenceResult, ToolInfo};

const HEADER: &str = "Discovered MCP tools:";
const EMPTY: &str = "No MCP tools were discovered in the repository.";
const NAME_PREFIX: &str = "- Name:";
const DESCRIPTION_PREFIX: &str = "  Description:";
const ORIGIN_PREFIX: &str = "  Declared in:";

/// Renders the human-readable tool listing.
pub fn format_report(tools: &[ToolInfo]) -> String {
    if tools.is_empty() {
        return EMPTY.to_string();
    }
    let mut lines = vec![format!("{HEADER}\n")];
    for tool in tools {
        lines.push(format!("{NAME_PREFIX} {}", tool.name));
        if let Some(description) = tool.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(format!("{DESCRIPTION_PREFIX} {description}"));
        }
        lines.push(format!("{ORIGIN_PREFIX} {}\n", tool.origin));
    }
    lines.join("\n")
}

/// Re-derives the tool list from a rendered report. Lines between a
/// `Description:` line and the following `Declared in:` line continue the
/// description verbatim.
pub fn parse_report(text: &str) -> Vec<ToolInfo> {
    let mut tools = Vec::new();
    let mut current: Option<PartialTool> = None;
    let mut collecting = false;

    for line in text.split('\n') {
        let stripped = line.trim();
        if stripped == HEADER {
            continue;
        }
        if let Some(name) = stripped.strip_prefix(NAME_PREFIX) {
            if let Some(done) = current.take() {
                tools.push(done.finish());
            }
            current = Some(PartialTool::new(name.trim()));
            collecting = false;
            continue;
        }
        let Some(tool) = current.as_mut() else {
            continue;
        };
        if let Some(rest) = line.strip_prefix(DESCRIPTION_PREFIX) {
            let rest = rest.trim();
            if !rest.is_empty() {
                tool.description.push(rest.to_string());
            }
            collecting = true;
        } else if collecting {
            match line.strip_prefix(ORIGIN_PREFIX) {
                Some(origin) => {
                    tool.origin = origin.trim().to_string();
                    collecting = false;
                }
                None => tool.description.push(line.to_string()),
            }
        } else if let Some(origin) = stripped.strip_prefix("Declared in:") {
            tool.origin = origin.trim().to_string();
        }
    }
    if let Some(done) = current {
        tools.push(done.finish());
    }
    tools
}

struct PartialTool {
    name: String,
    description: Vec<String>,
    origin: String,
}

impl PartialTool {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Vec::new(),
            origin: String::new(),
        }
    }

    fn finish(self) -> ToolInfo {
        let description = self.description.join("\n").trim().to_string();
        ToolInfo::new(self.name, Some(description), &self.origin)
    }
}

/// Plain-text summary of a verification run.
pub fn format_verification(result: &ConfidenceResult) -> String {
    let mut lines = vec![
        format!("Is MCP Server: {}", result.is_likely_server),
        format!("Confidence: {}", result.confidence),
        format!("Has Server Declaration: {}", result.evidence.has_server_declaration),
        format!(
            "Has Registration Pattern: {}",
            result.evidence.has_registration_pattern
        ),
    ];
    if !result.evidence.evidence_files.is_empty() {
        lines.push(String::new());
        lines.push("Evidence files:".to_string());
        for file in &result.evidence.evidence_files {
            lines.push(format!("  - {file}"));
        }
    }
    lines.join("\n")
}
