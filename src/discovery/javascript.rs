use crate::discovery::lexer::{
    doc_comment_before, extract_balanced, leading_string_literal, line_start, skip_whitespace,
    split_top_level, unquote,
};
use crate::discovery::literal::{
    Constants, JS_TOOL_OBJECT, literal_or_constant, object_field, parse_tool_object,
};
use crate::discovery::{SourceUnit, ToolDetector};
use crate::model::ToolInfo;
use regex::Regex;
use std::sync::LazyLock;

static DECLARED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:export\s+)?const\s+(?P<ident>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*\{")
        .expect("valid regex")
});

static CLASS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+(?P<name>[A-Za-z_$][\w$]*)").expect("valid regex")
});

static EXTENDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*extends\s+(?P<base>[A-Za-z_$][\w$.]*)").expect("valid regex")
});

static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:implements\s+[^{;]+)?\{").expect("valid regex"));

static CLASS_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:(?:public|private|protected|readonly|static|override|declare)\s+)*(?:this\.)?(?P<key>name|description)\b\s*[?!]?\s*(?::\s*[^=;\n]+)?=\s*",
    )
    .expect("valid regex")
});

static IDENT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<ident>[A-Za-z_$][\w$]*)\s*(?:;|\n|$)").expect("valid regex")
});

static CALL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<prefix>\bregister[A-Za-z]*|\baddTool\b|\bdefineTool\b|\bcreateTool\b|\btoolRegistry\.[A-Za-z]+|\btools?\s*:\s*\[|\baibitat\.function\b|\.?\btool\b)",
    )
    .expect("valid regex")
});

/// Segment-based detector for JavaScript and TypeScript sources.
#[derive(Debug, Default)]
pub struct JavascriptDetector;

impl JavascriptDetector {
    pub fn new() -> Self {
        Self
    }
}

impl ToolDetector for JavascriptDetector {
    fn detect(&mut self, unit: &SourceUnit) -> Vec<ToolInfo> {
        let source = unit.text.as_str();
        let origin = unit.rel_path.as_str();
        let mut constants = Constants::collect(source);
        let mut tools = Vec::new();

        declared_objects(source, origin, &mut constants, &mut tools);
        tool_classes(source, origin, &constants, &mut tools);
        registration_calls(source, origin, &constants, &mut tools);
        tools
    }
}

fn declared_objects(
    source: &str,
    origin: &str,
    constants: &mut Constants,
    out: &mut Vec<ToolInfo>,
) {
    for caps in DECLARED_OBJECT.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some(block) = extract_balanced(source, whole.end() - 1, '{', '}') else {
            continue;
        };
        let Some((name, description)) = parse_tool_object(block, JS_TOOL_OBJECT, constants)
        else {
            continue;
        };
        constants.bind_default(&caps["ident"], &name);
        out.push(ToolInfo::new(name, description, origin));
    }
}

fn tool_classes(source: &str, origin: &str, constants: &Constants, out: &mut Vec<ToolInfo>) {
    for caps in CLASS_NAME.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some((base, open)) = class_heritage(source, whole.end()) else {
            continue;
        };
        if !base.contains("Tool") {
            continue;
        }
        let Some(body) = extract_balanced(source, open, '{', '}') else {
            continue;
        };
        let mut name = None;
        let mut description = None;
        for field in CLASS_FIELD.captures_iter(body) {
            let Some(value_start) = field.get(0).map(|m| m.end()) else {
                continue;
            };
            let slot = match &field["key"] {
                "name" => &mut name,
                _ => &mut description,
            };
            if slot.is_none() {
                *slot = field_value(&body[value_start..], constants);
            }
        }
        if let Some(name) = name.filter(|name| !name.trim().is_empty()) {
            out.push(ToolInfo::new(name, description, origin));
        }
    }
}

/// Base class name and the index of the body `{` for the class header that
/// continues at `from`. Type arguments may nest (`Base<z.infer<typeof s>>`).
fn class_heritage(source: &str, from: usize) -> Option<(&str, usize)> {
    let after_params = skip_type_arguments(source, from)?;
    let extends = EXTENDS.captures(source.get(after_params..)?)?;
    let base = extends.name("base")?;
    let base_end = after_params + extends.get(0)?.end();
    let after_args = skip_type_arguments(source, base_end)?;
    let open = BODY_OPEN.find(source.get(after_args..)?)?;
    Some((
        &source[after_params + base.start()..after_params + base.end()],
        after_args + open.end() - 1,
    ))
}

fn skip_type_arguments(source: &str, from: usize) -> Option<usize> {
    let at = skip_whitespace(source, from);
    if source.as_bytes().get(at) != Some(&b'<') {
        return Some(from);
    }
    let inner = extract_balanced(source, at, '<', '>')?;
    Some(at + inner.len() + 2)
}

/// A class field initializer: a string literal, or a constant identifier.
fn field_value(rest: &str, constants: &Constants) -> Option<String> {
    if let Some(literal) = leading_string_literal(rest) {
        return Some(unquote(literal));
    }
    let caps = IDENT_VALUE.captures(rest)?;
    constants.get(&caps["ident"]).map(str::to_string)
}

fn registration_calls(source: &str, origin: &str, constants: &Constants, out: &mut Vec<ToolInfo>) {
    for caps in CALL_PREFIX.captures_iter(source) {
        let Some(prefix) = caps.name("prefix") else {
            continue;
        };
        if prefix.as_str().ends_with('[') {
            if let Some(block) = extract_balanced(source, prefix.end() - 1, '[', ']') {
                out.extend(array_tools(block, origin, constants));
            }
            continue;
        }

        let open = skip_whitespace(source, prefix.end());
        if source.as_bytes().get(open) != Some(&b'(') {
            continue;
        }
        let Some(arguments) = extract_balanced(source, open, '(', ')') else {
            continue;
        };
        let parts = split_top_level(arguments, ',');
        let Some(first) = parts.first() else {
            continue;
        };

        if first.starts_with('{') {
            if let Some((name, description)) = parse_tool_object(first, JS_TOOL_OBJECT, constants)
            {
                out.push(ToolInfo::new(name, description, origin));
            }
            continue;
        }
        if first.starts_with('[') {
            if let Some(block) = extract_balanced(first, 0, '[', ']') {
                out.extend(array_tools(block, origin, constants));
            }
            continue;
        }

        let Some(name) = literal_or_constant(first, constants) else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        let description = parts
            .get(1)
            .and_then(|second| {
                if second.starts_with('{') {
                    object_field(second, JS_TOOL_OBJECT.description_keys, constants)
                } else {
                    literal_or_constant(second, constants)
                }
            })
            .or_else(|| doc_comment_before(source, line_start(source, prefix.start())));
        out.push(ToolInfo::new(name, description, origin));
    }
}

fn array_tools(block: &str, origin: &str, constants: &Constants) -> Vec<ToolInfo> {
    split_top_level(block, ',')
        .iter()
        .filter(|element| element.starts_with('{'))
        .filter_map(|element| parse_tool_object(element, JS_TOOL_OBJECT, constants))
        .map(|(name, description)| ToolInfo::new(name, description, origin))
        .collect()
}
