use crate::discovery::lexer::{extract_balanced, split_top_level};
use crate::discovery::literal::{Constants, GO_TOOL_STRUCT, literal_or_constant, parse_tool_object};
use crate::discovery::{SourceUnit, ToolDetector};
use crate::model::ToolInfo;
use regex::Regex;
use std::sync::LazyLock;

static NEW_TOOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bNewTool\s*\(").expect("valid regex"));

static WITH_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z_]\w*\.)?WithDescription\s*\(").expect("valid regex"));

static TOOL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<slice>\[\]\s*\*?)?(?:\b[A-Za-z_]\w*\.)?\bTool\s*\{").expect("valid regex")
});

/// Detector for the Go MCP SDKs: `NewTool(...)` builders and `Tool{...}`
/// composite literals.
#[derive(Debug, Default)]
pub struct GoDetector;

impl GoDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ToolDetector for GoDetector {
    fn detect(&mut self, unit: &SourceUnit) -> Vec<ToolInfo> {
        let source = unit.text.as_str();
        let origin = unit.rel_path.as_str();
        let constants = Constants::collect(source);
        let mut tools = Vec::new();

        for found in NEW_TOOL.find_iter(source) {
            let Some(arguments) = extract_balanced(source, found.end() - 1, '(', ')') else {
                continue;
            };
            if let Some((name, description)) = new_tool_arguments(arguments, &constants) {
                tools.push(ToolInfo::new(name, description, origin));
            }
        }

        let mut consumed = 0;
        for caps in TOOL_LITERAL.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.start() < consumed {
                continue;
            }
            let Some(block) = extract_balanced(source, whole.end() - 1, '{', '}') else {
                continue;
            };
            if caps.name("slice").is_some() {
                consumed = whole.end() + block.len();
                for element in split_top_level(block, ',') {
                    let Some(open) = element.find('{') else {
                        continue;
                    };
                    let Some(inner) = extract_balanced(&element, open, '{', '}') else {
                        continue;
                    };
                    if let Some((name, description)) =
                        parse_tool_object(inner, GO_TOOL_STRUCT, &constants)
                    {
                        tools.push(ToolInfo::new(name, description, origin));
                    }
                }
            } else if let Some((name, description)) =
                parse_tool_object(block, GO_TOOL_STRUCT, &constants)
            {
                tools.push(ToolInfo::new(name, description, origin));
            }
        }
        tools
    }
}

/// `NewTool(name, "description", ...)` or `NewTool(name, WithDescription("..."), ...)`.
fn new_tool_arguments(arguments: &str, constants: &Constants) -> Option<(String, Option<String>)> {
    let parts = split_top_level(arguments, ',');
    let name = literal_or_constant(parts.first()?, constants)?;
    if name.trim().is_empty() {
        return None;
    }
    let description = parts
        .get(1)
        .and_then(|second| literal_or_constant(second, constants))
        .or_else(|| {
            parts.iter().skip(1).find_map(|part| {
                let option = WITH_DESCRIPTION.find(part)?;
                let inner = extract_balanced(part, option.end() - 1, '(', ')')?;
                literal_or_constant(inner, constants)
            })
        });
    Some((name, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(source: &str) -> Vec<(String, Option<String>)> {
        GoDetector::new()
            .detect(&SourceUnit::new("main.go", source))
            .into_iter()
            .map(|tool| (tool.name, tool.description))
            .collect()
    }

    #[test]
    fn new_tool_with_description_option() {
        let source = r#"
tool := mcp.NewTool("hello_world",
    mcp.WithDescription("Say hello to someone"),
    mcp.WithString("name", mcp.Required()),
)
"#;
        assert_eq!(
            detect(source),
            vec![("hello_world".to_string(), Some("Say hello to someone".to_string()))]
        );
    }

    #[test]
    fn new_tool_with_literal_description_and_constant_name() {
        let source = "const toolName = \"calc\"\nt := NewTool(toolName, \"Calculator\")\n";
        assert_eq!(
            detect(source),
            vec![("calc".to_string(), Some("Calculator".to_string()))]
        );
    }

    #[test]
    fn struct_literals_and_slices() {
        let source = r#"
mcp.AddTool(server, &mcp.Tool{Name: "greet", Description: "say hi"}, SayHi)

var tools = []mcp.Tool{
    {Name: "a", Description: "first"},
    mcp.Tool{Name: "b"},
}
"#;
        assert_eq!(
            detect(source),
            vec![
                ("greet".to_string(), Some("say hi".to_string())),
                ("a".to_string(), Some("first".to_string())),
                ("b".to_string(), None),
            ]
        );
    }

    #[test]
    fn type_declaration_is_not_a_tool() {
        assert!(detect("type Tool struct {\n    Name string\n}\n").is_empty());
    }
}
