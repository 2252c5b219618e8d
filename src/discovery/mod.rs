use crate::model::{DiscoveryReport, ToolInfo};
use crate::util;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

pub mod csharp;
pub mod go;
pub mod javascript;
pub mod lexer;
pub mod literal;
pub mod php;
pub mod python;
pub mod scan;

/// One decoded file handed to a detector.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub rel_path: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(rel_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            text: text.into(),
        }
    }
}

/// Maps one source unit to the tools it declares. A detector never fails:
/// anything it cannot recognize is simply not reported.
pub trait ToolDetector {
    fn detect(&mut self, unit: &SourceUnit) -> Vec<ToolInfo>;
}

/// The tool discovery engine: walks a tree, dispatches each file to the
/// detector for its language and deduplicates the result.
pub struct Discovery {
    options: scan::ScanOptions,
    detectors: HashMap<&'static str, Box<dyn ToolDetector>>,
}

impl Discovery {
    pub fn new() -> Result<Self> {
        Self::new_with_options(scan::ScanOptions::default())
    }

    pub fn new_with_options(options: scan::ScanOptions) -> Result<Self> {
        let mut detectors: HashMap<&'static str, Box<dyn ToolDetector>> = HashMap::new();
        detectors.insert("python", Box::new(python::PythonDetector::new()?));
        detectors.insert("javascript", Box::new(javascript::JavascriptDetector::new()));
        detectors.insert("typescript", Box::new(javascript::JavascriptDetector::new()));
        detectors.insert("go", Box::new(go::GoDetector::new()));
        detectors.insert("php", Box::new(php::PhpDetector::new()));
        detectors.insert("csharp", Box::new(csharp::CSharpDetector::new()));
        Ok(Self { options, detectors })
    }

    /// Raw detections in walk order, before deduplication.
    pub fn collect(&mut self, repo_root: &Path) -> Result<(Vec<ToolInfo>, usize)> {
        let files = scan::scan_repo_with_options(repo_root, &self.options)?;
        let mut collected = Vec::new();
        for file in &files {
            let Some(detector) = self.detectors.get_mut(file.language) else {
                continue;
            };
            if file.language != "python" && scan::is_minified(&file.rel_path) {
                debug!(path = %file.rel_path, "skipping minified file");
                continue;
            }
            let text = match util::read_to_string(&file.abs_path) {
                Ok(text) => text,
                Err(err) => {
                    debug!(path = %file.rel_path, error = %err, "skipping unreadable file");
                    continue;
                }
            };
            let unit = SourceUnit::new(file.rel_path.clone(), text);
            let found = detector.detect(&unit);
            if !found.is_empty() {
                debug!(path = %file.rel_path, count = found.len(), "tools detected");
            }
            collected.extend(found);
        }
        Ok((collected, files.len()))
    }

    pub fn discover(&mut self, repo_root: &Path) -> Result<DiscoveryReport> {
        let (collected, files_scanned) = self.collect(repo_root)?;
        let tools = dedupe_tools(collected);
        info!(
            root = %repo_root.display(),
            files = files_scanned,
            tools = tools.len(),
            "discovery finished"
        );
        Ok(DiscoveryReport {
            tools,
            files_scanned,
        })
    }
}

/// Keeps the first tool seen for every name, preserving order.
pub fn dedupe_tools(tools: Vec<ToolInfo>) -> Vec<ToolInfo> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .filter(|tool| seen.insert(tool.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let tools = vec![
            ToolInfo::new("search", Some("first".to_string()), "a.py"),
            ToolInfo::new("fetch", None, "b.ts"),
            ToolInfo::new("search", Some("richer second".to_string()), "c.py"),
            ToolInfo::new("Search", None, "d.py"),
        ];
        let unique = dedupe_tools(tools);
        let names: Vec<_> = unique.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["search", "fetch", "Search"]);
        assert_eq!(unique[0].origin, "a.py");
        assert_eq!(unique[0].description.as_deref(), Some("first"));
    }
}
