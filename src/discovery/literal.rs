use crate::discovery::lexer::{
    extract_balanced, find_top_level, leading_string_literal, split_top_level, unquote,
};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

const STRING_LITERAL: &str = r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|`(?:[^`\\]|\\.)*`"#;

static CONST_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m)(?:export\s+)?const\s+(?P<ident>[A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?P<value>{STRING_LITERAL})\s*(?:;|$)"
    ))
    .expect("valid regex")
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid regex"));

/// Module-level string constants of one source unit.
#[derive(Debug, Default, Clone)]
pub struct Constants {
    values: HashMap<String, String>,
}

impl Constants {
    /// Collects `const NAME = "literal"` declarations.
    pub fn collect(source: &str) -> Self {
        let mut values = HashMap::new();
        for caps in CONST_LITERAL.captures_iter(source) {
            values.insert(caps["ident"].to_string(), unquote(&caps["value"]));
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Binds `name` unless it is already bound.
    pub fn bind_default(&mut self, name: &str, value: &str) {
        self.values
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }
}

/// Resolves an expression that should be a string: a literal, or a bare
/// identifier bound in `constants`.
pub fn literal_or_constant(expr: &str, constants: &Constants) -> Option<String> {
    let expr = expr.trim();
    if let Some(literal) = leading_string_literal(expr) {
        if literal.len() == expr.len() || !expr[literal.len()..].trim_start().starts_with('+') {
            return Some(unquote(literal));
        }
    }
    if IDENTIFIER.is_match(expr) {
        return constants.get(expr).map(str::to_string);
    }
    None
}

/// Field names that carry a tool's name and description in an object or
/// struct literal, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct ObjectShape {
    pub name_keys: &'static [&'static str],
    pub description_keys: &'static [&'static str],
}

pub const JS_TOOL_OBJECT: ObjectShape = ObjectShape {
    name_keys: &["name", "title"],
    description_keys: &["description", "summary"],
};

pub const GO_TOOL_STRUCT: ObjectShape = ObjectShape {
    name_keys: &["Name"],
    description_keys: &["Description"],
};

/// Strips the outer braces of an object literal if present.
pub fn object_body(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        if let Some(inner) = extract_balanced(trimmed, 0, '{', '}') {
            return inner;
        }
    }
    trimmed
}

/// Looks up the first of `keys` in an object literal. Top-level entries win;
/// otherwise the whole text is searched, which also finds fields of nested or
/// spread-built objects.
pub fn object_field(text: &str, keys: &[&str], constants: &Constants) -> Option<String> {
    let body = object_body(text);
    let entries = top_level_entries(body);
    for key in keys {
        if let Some(value) = entries
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .and_then(|(_, value)| literal_or_constant(value, constants))
        {
            return Some(value);
        }
    }
    keys.iter().find_map(|key| nested_field(body, key))
}

/// `(key, value)` pairs of an object body. Shorthand properties (`{ name }`)
/// map the key to itself so they resolve through the constants.
fn top_level_entries(body: &str) -> Vec<(String, String)> {
    split_top_level(body, ',')
        .into_iter()
        .filter_map(|entry| match find_top_level(&entry, ':') {
            Some(colon) => {
                let key = unquote(entry[..colon].trim());
                let value = entry[colon + 1..].trim().to_string();
                Some((key, value))
            }
            None if IDENTIFIER.is_match(&entry) => Some((entry.clone(), entry)),
            None => None,
        })
        .collect()
}

/// One compiled `key: "literal"` matcher per field name any shape uses.
static NESTED_FIELDS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    [JS_TOOL_OBJECT, GO_TOOL_STRUCT]
        .iter()
        .flat_map(|shape| shape.name_keys.iter().chain(shape.description_keys))
        .map(|key| {
            let pattern = format!(
                r#"(?s)(?:\b|["']){}["']?\s*:\s*(?P<value>{STRING_LITERAL})"#,
                regex::escape(key)
            );
            (*key, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
});

fn nested_field(text: &str, key: &str) -> Option<String> {
    let caps = NESTED_FIELDS.get(key)?.captures(text)?;
    Some(unquote(&caps["value"]))
}

/// Name and description of a tool object, if it has a name.
pub fn parse_tool_object(
    text: &str,
    shape: ObjectShape,
    constants: &Constants,
) -> Option<(String, Option<String>)> {
    let name = object_field(text, shape.name_keys, constants)?;
    if name.trim().is_empty() {
        return None;
    }
    let description = object_field(text, shape.description_keys, constants);
    Some((name, description))
}
