use crate::discovery::lexer::{
    doc_comment_before, extract_balanced, find_top_level, leading_string_literal, line_start,
    skip_whitespace, split_top_level, unquote,
};
use crate::discovery::{SourceUnit, ToolDetector};
use crate::model::ToolInfo;
use regex::Regex;
use std::sync::LazyLock;

const STRING_LITERAL: &str = r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#;

static TOOL_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+(?P<name>\w+)\s+extends\s+\\?(?:\w+\\)*Tool\b").expect("valid regex")
});

static DESCRIPTION_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"protected\s+string\s+\$description\s*=\s*(?P<value>{STRING_LITERAL})"
    ))
    .expect("valid regex")
});

static REGISTER_TOOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bregisterTool\s*\(").expect("valid regex"));

static MCP_TOOL_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\[\s*\\?(?:\w+\\)*McpTool\b").expect("valid regex"));

static METHOD_AFTER_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\]?\s*(?:#\[[^\]]*\]\s*)*(?:(?:public|protected|private|static|final|abstract)\s+)*function\s+&?(?P<name>\w+)",
    )
    .expect("valid regex")
});

static MCP_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:use|namespace)\s+\\?(?:Laravel\\Mcp|Mcp)\\").expect("valid regex")
});

static ANY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+(?P<name>\w+)[^{;]*\{").expect("valid regex"));

static HANDLER_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\s+(?:handle|schema|execute)\s*\(").expect("valid regex"));

/// Regex detector for PHP MCP servers (Laravel MCP and php-mcp).
#[derive(Debug, Default)]
pub struct PhpDetector;

impl PhpDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ToolDetector for PhpDetector {
    fn detect(&mut self, unit: &SourceUnit) -> Vec<ToolInfo> {
        let source = unit.text.as_str();
        let origin = unit.rel_path.as_str();
        let mut tools = Vec::new();

        for caps in TOOL_CLASS.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let description = class_body(source, whole.end())
                .and_then(|body| DESCRIPTION_PROPERTY.captures(body))
                .map(|found| unquote(&found["value"]))
                .or_else(|| doc_above(source, whole.start()));
            tools.push(ToolInfo::new(&caps["name"], description, origin));
        }

        for found in REGISTER_TOOL.find_iter(source) {
            let Some(arguments) = extract_balanced(source, found.end() - 1, '(', ')') else {
                continue;
            };
            let parts = split_top_level(arguments, ',');
            let Some(name) = parts.first().and_then(|first| literal(first)) else {
                continue;
            };
            let description = parts.get(1).and_then(|second| literal(second));
            tools.push(ToolInfo::new(name, description, origin));
        }

        for found in MCP_TOOL_ATTRIBUTE.find_iter(source) {
            if let Some(tool) = attribute_tool(source, found.end(), origin) {
                tools.push(tool);
            }
        }

        if tools.is_empty() && MCP_IMPORT.is_match(source) {
            for caps in ANY_CLASS.captures_iter(source) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let Some(body) = extract_balanced(source, whole.end() - 1, '{', '}') else {
                    continue;
                };
                if HANDLER_METHOD.is_match(body) {
                    let description = doc_above(source, whole.start());
                    tools.push(ToolInfo::new(&caps["name"], description, origin));
                }
            }
        }
        tools
    }
}

fn class_body(source: &str, from: usize) -> Option<&str> {
    let open = from + source.get(from..)?.find('{')?;
    extract_balanced(source, open, '{', '}')
}

fn literal(expr: &str) -> Option<String> {
    let expr = expr.trim();
    let found = leading_string_literal(expr)?;
    (found.len() == expr.len()).then(|| unquote(found))
}

/// First docblock line above the declaration at `index`, skipping attribute
/// lines such as `#[IsReadOnly]` in between.
fn doc_above(source: &str, index: usize) -> Option<String> {
    let mut head = source.get(..line_start(source, index))?;
    loop {
        let trimmed = head.trim_end();
        let last = line_start(trimmed, trimmed.len());
        if trimmed[last..].trim_start().starts_with("#[") {
            head = &trimmed[..last];
        } else {
            break;
        }
    }
    doc_comment_before(head, head.len())
}

/// `#[McpTool(name: 'x', description: '...')]` followed by a method.
fn attribute_tool(source: &str, after_name: usize, origin: &str) -> Option<ToolInfo> {
    let mut name = None;
    let mut description = None;
    let mut rest_start = after_name;
    let open = skip_whitespace(source, after_name);
    if source.as_bytes().get(open) == Some(&b'(') {
        let arguments = extract_balanced(source, open, '(', ')')?;
        rest_start = open + arguments.len() + 2;
        for (position, part) in split_top_level(arguments, ',').iter().enumerate() {
            match find_top_level(part, ':') {
                Some(colon) => {
                    let value = literal(&part[colon + 1..]);
                    match part[..colon].trim() {
                        "name" => name = value,
                        "description" => description = value,
                        _ => {}
                    }
                }
                None if position == 0 => name = literal(part),
                None if position == 1 => description = literal(part),
                None => {}
            }
        }
    }
    let name = match name {
        Some(name) => name,
        None => {
            let method = METHOD_AFTER_ATTRIBUTE.captures(source.get(rest_start..)?)?;
            method["name"].to_string()
        }
    };
    if name.trim().is_empty() {
        return None;
    }
    Some(ToolInfo::new(name, description, origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(source: &str) -> Vec<(String, Option<String>)> {
        PhpDetector::new()
            .detect(&SourceUnit::new("app/Mcp/Tools/Weather.php", source))
            .into_iter()
            .map(|tool| (tool.name, tool.description))
            .collect()
    }

    #[test]
    fn laravel_tool_class_with_description_property() {
        let source = r#"<?php
namespace App\Mcp\Tools;

use Laravel\Mcp\Server\Tool;

class CurrentWeatherTool extends Tool
{
    protected string $description = 'Fetches the current weather.';

    public function handle(Request $request): Response {}
}
"#;
        assert_eq!(
            detect(source),
            vec![(
                "CurrentWeatherTool".to_string(),
                Some("Fetches the current weather.".to_string())
            )]
        );
    }

    #[test]
    fn docblock_above_attributes_is_the_fallback() {
        let source = r#"<?php
/**
 * Lists open tickets.
 */
#[IsReadOnly]
final class ListTickets extends \Laravel\Mcp\Server\Tool
{
}
"#;
        assert_eq!(
            detect(source),
            vec![("ListTickets".to_string(), Some("Lists open tickets.".to_string()))]
        );
    }

    #[test]
    fn mcp_tool_attribute_and_register_call() {
        let source = r#"<?php
class Calculator
{
    #[McpTool(name: 'add_numbers', description: 'Adds two numbers')]
    public function add(int $a, int $b): int { return $a + $b; }

    #[McpTool]
    public function subtract(int $a, int $b): int { return $a - $b; }
}

$server->registerTool('ping', 'Replies with pong');
"#;
        assert_eq!(
            detect(source),
            vec![
                ("ping".to_string(), Some("Replies with pong".to_string())),
                ("add_numbers".to_string(), Some("Adds two numbers".to_string())),
                ("subtract".to_string(), None),
            ]
        );
    }

    #[test]
    fn handler_classes_count_only_under_mcp_imports() {
        let source = r#"<?php
use Mcp\Server\Contracts\ToolInterface;

/** Echo back. */
class EchoHandler
{
    public function execute(array $args) {}
}
"#;
        assert_eq!(
            detect(source),
            vec![("EchoHandler".to_string(), Some("Echo back.".to_string()))]
        );
        let plain = source.replace("use Mcp\\Server\\Contracts\\ToolInterface;", "");
        assert!(detect(&plain).is_empty());
    }
}
