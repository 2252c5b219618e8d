use crate::discovery::lexer::{extract_balanced, line_start, skip_whitespace, unquote};
use crate::discovery::{SourceUnit, ToolDetector};
use crate::model::ToolInfo;
use regex::Regex;
use std::sync::LazyLock;

const STRING_LITERAL: &str = r#""(?:[^"\\]|\\.)*""#;

static COMMAND_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bclass\s+(?P<name>\w+Command)(?:\s*<[^>{]*>)?(?:\s*\([^(){]*\))?\s*(?::|\bwhere\b)",
    )
    .expect("valid regex")
});

static DESCRIPTION_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?:(?:public|private|protected|internal)\s+)?(?:override\s+)?string\s+Description\s*(?:=>|=)\s*(?:(?P<raw>"""(?s:.*?)""")|(?P<value>{STRING_LITERAL}))"#
    ))
    .expect("valid regex")
});

static DESCRIPTION_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bDescription\s*\(\s*(?P<value>{STRING_LITERAL})"
    ))
    .expect("valid regex")
});

static TOOL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\[\s*(?:Mcp)?Tool\s*\(\s*(?P<value>{STRING_LITERAL})"
    ))
    .expect("valid regex")
});

static SERVER_TOOL_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*McpServerTool\b").expect("valid regex"));

static NAME_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bName\s*=\s*(?P<value>{STRING_LITERAL})")).expect("valid regex")
});

static METHOD_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static|async|virtual|override|sealed|partial|new|unsafe|extern)\s+)*[\w.]+(?:\s*<[^()]*?>)?(?:\[\])?\??\s+(?P<name>\w+)\s*(?:<[^()]*?>)?\s*\(",
    )
    .expect("valid regex")
});

static MCP_NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:global\s+)?(?:using|namespace)\s+(?:Azure|Microsoft|Fabric)\.Mcp\b")
        .expect("valid regex")
});

static ANY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bclass\s+(?P<name>\w+)[^{;]*\{").expect("valid regex"));

static HANDLER_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:ExecuteAsync|HandleAsync|Execute|Handle)\s*\(").expect("valid regex")
});

/// Regex detector for C# MCP servers: command classes and attribute-declared
/// tools.
#[derive(Debug, Default)]
pub struct CSharpDetector;

impl CSharpDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ToolDetector for CSharpDetector {
    fn detect(&mut self, unit: &SourceUnit) -> Vec<ToolInfo> {
        let source = unit.text.as_str();
        let origin = unit.rel_path.as_str();
        let mut tools = Vec::new();

        for caps in COMMAND_CLASS.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let description = class_body(source, whole.end())
                .and_then(description_property)
                .or_else(|| {
                    let trivia = trivia_above(source, whole.start());
                    xml_summary(&trivia).or_else(|| description_attribute(&trivia))
                });
            tools.push(ToolInfo::new(&caps["name"], description, origin));
        }

        for caps in TOOL_ATTRIBUTE.captures_iter(source) {
            let name = unquote(&caps["value"]);
            if !name.trim().is_empty() {
                tools.push(ToolInfo::new(name, None, origin));
            }
        }

        for found in SERVER_TOOL_ATTRIBUTE.find_iter(source) {
            if let Some(tool) = server_tool_method(source, found.start(), origin) {
                tools.push(tool);
            }
        }

        if tools.is_empty() && MCP_NAMESPACE.is_match(source) {
            for caps in ANY_CLASS.captures_iter(source) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let Some(body) = extract_balanced(source, whole.end() - 1, '{', '}') else {
                    continue;
                };
                if HANDLER_METHOD.is_match(body) {
                    let description = xml_summary(&trivia_above(source, whole.start()));
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

fn description_property(body: &str) -> Option<String> {
    let caps = DESCRIPTION_PROPERTY.captures(body)?;
    if let Some(raw) = caps.name("raw") {
        let inner = raw.as_str().trim_matches('"');
        let lines: Vec<&str> = inner
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        return Some(lines.join("\n"));
    }
    caps.name("value").map(|value| unquote(value.as_str()))
}

/// `///` doc lines and `[Attribute]` lines directly above `index`, top-down.
fn trivia_above(source: &str, index: usize) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut end = line_start(source, index);
    while end > 0 {
        let start = line_start(source, end - 1);
        let line = source[start..end].trim();
        if line.starts_with("///") || line.starts_with('[') {
            lines.push(line);
            end = start;
        } else {
            break;
        }
    }
    lines.reverse();
    lines
}

fn xml_summary(trivia: &[&str]) -> Option<String> {
    let docs: Vec<&str> = trivia
        .iter()
        .filter_map(|line| line.strip_prefix("///"))
        .map(str::trim)
        .collect();
    let open = docs.iter().position(|line| line.contains("<summary>"))?;
    let same_line = docs[open]
        .split_once("<summary>")
        .map(|(_, rest)| rest.replace("</summary>", ""))
        .unwrap_or_default();
    if !same_line.trim().is_empty() {
        return Some(same_line.trim().to_string());
    }
    docs.get(open + 1)
        .filter(|line| !line.starts_with("</summary>") && !line.is_empty())
        .map(|line| line.to_string())
}

fn description_attribute(trivia: &[&str]) -> Option<String> {
    trivia
        .iter()
        .filter(|line| line.starts_with('['))
        .find_map(|line| DESCRIPTION_ATTRIBUTE.captures(line))
        .map(|caps| unquote(&caps["value"]))
}

/// `[McpServerTool(Name = "x"), Description("...")]` and the method under it.
fn server_tool_method(source: &str, attribute_start: usize, origin: &str) -> Option<ToolInfo> {
    let mut attributes = String::new();
    let mut cursor = attribute_start;
    while source.as_bytes().get(cursor) == Some(&b'[') {
        let block = extract_balanced(source, cursor, '[', ']')?;
        attributes.push_str(block);
        attributes.push('\n');
        cursor = skip_whitespace(source, cursor + block.len() + 2);
    }
    let description = DESCRIPTION_ATTRIBUTE
        .captures(&attributes)
        .map(|caps| unquote(&caps["value"]));
    let name = match NAME_ARGUMENT.captures(&attributes) {
        Some(caps) => unquote(&caps["value"]),
        None => METHOD_SIGNATURE.captures(source.get(cursor..)?)?["name"].to_string(),
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
        CSharpDetector::new()
            .detect(&SourceUnit::new("src/Tools/Commands.cs", source))
            .into_iter()
            .map(|tool| (tool.name, tool.description))
            .collect()
    }

    fn named(name: &str, description: Option<&str>) -> (String, Option<String>) {
        (name.to_string(), description.map(str::to_string))
    }

    #[test]
    fn command_class_with_description_property() {
        let source = r#"
namespace Azure.Mcp.Tools.Storage;

public sealed class AccountGetCommand(ILogger<AccountGetCommand> logger) : BaseStorageCommand<AccountGetOptions>
{
    public override string Name => "get";
    public override string Description => "Gets storage account details.";
    public override Task<CommandResponse> ExecuteAsync(CommandContext context) => throw null;
}
"#;
        assert_eq!(
            detect(source),
            vec![named("AccountGetCommand", Some("Gets storage account details."))]
        );
    }

    #[test]
    fn raw_string_description() {
        let source = "public sealed class ListCommand : BaseCommand\n{\n    public override string Description =>\n        \"\"\"\n        Lists items.\n        Supports paging.\n        \"\"\";\n}\n";
        assert_eq!(
            detect(source),
            vec![named("ListCommand", Some("Lists items.\nSupports paging."))]
        );
    }

    #[test]
    fn summary_then_description_attribute() {
        let source = r#"
/// <summary>
/// Deletes a key.
/// </summary>
public class DeleteCommand : BaseCommand
{
}

[Description("Reads a key.")]
internal class ReadCommand where T : class
{
}
"#;
        assert_eq!(
            detect(source),
            vec![
                named("DeleteCommand", Some("Deletes a key.")),
                named("ReadCommand", Some("Reads a key.")),
            ]
        );
    }

    #[test]
    fn server_tool_methods_and_tool_attributes() {
        let source = r#"
[McpServerToolType]
public static class EchoTool
{
    [McpServerTool, Description("Echoes the message back.")]
    public static string Echo(string message) => message;

    [McpServerTool(Name = "get_weather")]
    [Description("Gets the weather.")]
    public static async Task<string> GetWeather(string city) => city;

    [Tool("legacy_tool")]
    public void Legacy() { }
}
"#;
        assert_eq!(
            detect(source),
            vec![
                named("legacy_tool", None),
                named("Echo", Some("Echoes the message back.")),
                named("get_weather", Some("Gets the weather.")),
            ]
        );
    }

    #[test]
    fn handler_fallback_needs_mcp_namespace() {
        let source = r#"
using Microsoft.Mcp.Core;

/// <summary>Pings the server.</summary>
public class Ping
{
    public Task HandleAsync() => Task.CompletedTask;
}
"#;
        assert_eq!(detect(source), vec![named("Ping", Some("Pings the server."))]);
        assert!(detect(&source.replace("using Microsoft.Mcp.Core;", "")).is_empty());
    }
}
