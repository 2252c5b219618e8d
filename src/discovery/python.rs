use crate::discovery::{SourceUnit, ToolDetector};
use crate::model::ToolInfo;
use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;
use tree_sitter::{Node, Parser};

const TOOL_DECORATORS: &[&str] = &["tool", "register_tool"];
const REGISTRATION_NEEDLES: &[&str] = &["register", "add_tool"];
/// Statements whose bodies still belong to the enclosing scope.
const SCOPE_TRANSPARENT: &[&str] = &[
    "block",
    "if_statement",
    "elif_clause",
    "else_clause",
    "try_statement",
    "except_clause",
    "finally_clause",
    "with_statement",
    "for_statement",
    "while_statement",
];

struct Context<'a> {
    origin: &'a str,
    source: &'a str,
    resolver: &'a ValueResolver,
    docstrings: &'a HashMap<String, String>,
}

pub struct PythonDetector {
    parser: Parser,
}

impl PythonDetector {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE;
        parser.set_language(&language.into())?;
        Ok(Self { parser })
    }
}

impl ToolDetector for PythonDetector {
    fn detect(&mut self, unit: &SourceUnit) -> Vec<ToolInfo> {
        let source = unit.text.as_str();
        let Some(tree) = self.parser.parse(source, None) else {
            debug!(path = %unit.rel_path, "python parse produced no tree");
            return Vec::new();
        };
        let root = tree.root_node();
        if root.has_error() {
            debug!(path = %unit.rel_path, "skipping python file with syntax errors");
            return Vec::new();
        }
        let resolver = ValueResolver::collect(root, source);
        let mut docstrings = HashMap::new();
        collect_docstrings(root, source, &mut docstrings);
        let ctx = Context {
            origin: &unit.rel_path,
            source,
            resolver: &resolver,
            docstrings: &docstrings,
        };
        let mut tools = Vec::new();
        walk_node(root, &ctx, &mut tools);
        tools
    }
}

/// Pre-order walk with an explicit stack; deeply nested sources must not
/// exhaust the thread stack.
fn walk_node(root: Node<'_>, ctx: &Context<'_>, out: &mut Vec<ToolInfo>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "decorated_definition" => {
                handle_decorated_definition(node, ctx, out, &mut stack);
                continue;
            }
            "class_definition" => {
                if let Some(tool) = class_tool(node, ctx) {
                    out.push(tool);
                }
            }
            "call" => {
                if let Some(tool) = call_tool(node, ctx) {
                    out.push(tool);
                }
            }
            _ => {}
        }
        push_children(node, &mut stack);
    }
}

/// Pushes the named children so that they pop in source order.
fn push_children<'a>(node: Node<'a>, stack: &mut Vec<Node<'a>>) {
    let mut cursor = node.walk();
    let children: Vec<_> = node.named_children(&mut cursor).collect();
    stack.extend(children.into_iter().rev());
}

/// Reports the decorated function, then queues the decorator expressions and
/// the definition. Decorator calls go through the ordinary call rules, so
/// `@mcp.tool(name="x")` also yields `x`.
fn handle_decorated_definition<'a>(
    node: Node<'a>,
    ctx: &Context<'_>,
    out: &mut Vec<ToolInfo>,
    stack: &mut Vec<Node<'a>>,
) {
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            if let Some(expr) = child.named_child(0) {
                decorators.push(expr);
            }
        }
    }
    let Some(definition) = node.child_by_field_name("definition") else {
        return;
    };
    if is_function(definition)
        && decorators
            .iter()
            .any(|expr| is_tool_decorator(*expr, ctx.source))
    {
        if let Some(name) = definition
            .child_by_field_name("name")
            .map(|n| node_text(n, ctx.source))
        {
            let description = definition
                .child_by_field_name("body")
                .and_then(|body| extract_docstring(body, ctx.source))
                .and_then(|doc| first_line(&doc));
            push_tool(out, name, description, ctx);
        }
    }
    stack.push(definition);
    stack.extend(decorators.into_iter().rev());
}

fn is_function(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_definition" | "async_function_definition"
    )
}

fn is_tool_decorator(expr: Node<'_>, source: &str) -> bool {
    let mut expr = expr;
    loop {
        match expr.kind() {
            "identifier" => return is_one_of(&node_text(expr, source), TOOL_DECORATORS),
            "attribute" => {
                return expr
                    .child_by_field_name("attribute")
                    .map(|attr| is_one_of(&node_text(attr, source), TOOL_DECORATORS))
                    .unwrap_or(false);
            }
            "call" => match expr.child_by_field_name("function") {
                Some(function) => expr = function,
                None => return false,
            },
            _ => return false,
        }
    }
}

fn is_one_of(name: &str, candidates: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    candidates.iter().any(|candidate| lower == *candidate)
}

fn class_tool(node: Node<'_>, ctx: &Context<'_>) -> Option<ToolInfo> {
    let class_name = node_text(node.child_by_field_name("name")?, ctx.source);
    let superclasses = node.child_by_field_name("superclasses")?;
    let mut cursor = superclasses.walk();
    let is_tool = superclasses
        .named_children(&mut cursor)
        .any(|base| base_mentions_tool(base, ctx.source));
    if !is_tool {
        return None;
    }
    let body = node.child_by_field_name("body");
    let mut name = class_name;
    let mut description = body.and_then(|body| extract_docstring(body, ctx.source));
    if let Some(body) = body {
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            let Some((target, value)) = simple_assignment(statement, ctx.source) else {
                continue;
            };
            match target.as_str() {
                "name" => {
                    if let Some(value) = ctx.resolver.resolve(value, ctx.source) {
                        name = value;
                    }
                }
                "description" => {
                    if let Some(value) = ctx.resolver.resolve(value, ctx.source) {
                        description = Some(value);
                    }
                }
                _ => {}
            }
        }
    }
    tool_info(name, description, ctx)
}

fn base_mentions_tool(base: Node<'_>, source: &str) -> bool {
    let mut base = base;
    loop {
        match base.kind() {
            "identifier" => return node_text(base, source).to_ascii_lowercase().contains("tool"),
            "attribute" => {
                return base
                    .child_by_field_name("attribute")
                    .map(|attr| node_text(attr, source).to_ascii_lowercase().contains("tool"))
                    .unwrap_or(false);
            }
            // BaseTool[Args]
            "subscript" | "generic_type" => match base.named_child(0) {
                Some(value) => base = value,
                None => return false,
            },
            _ => return false,
        }
    }
}

/// `target = value` (optionally annotated) as a standalone statement.
fn simple_assignment<'a>(statement: Node<'a>, source: &str) -> Option<(String, Node<'a>)> {
    if statement.kind() != "expression_statement" {
        return None;
    }
    let assignment = statement.named_child(0)?;
    if assignment.kind() != "assignment" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let right = assignment.child_by_field_name("right")?;
    Some((node_text(left, source), right))
}

/// Call recognizers, tried in order; the first that applies owns the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallRule {
    Constructor,
    Registration,
}

fn classify_call(node: Node<'_>, source: &str) -> Option<CallRule> {
    let function = node.child_by_field_name("function")?;
    if is_tool_constructor(function, source) {
        return Some(CallRule::Constructor);
    }
    let registration = match function.kind() {
        "attribute" => {
            let attr = node_text(function.child_by_field_name("attribute")?, source);
            let lower = attr.to_ascii_lowercase();
            REGISTRATION_NEEDLES
                .iter()
                .any(|needle| lower.contains(needle))
        }
        "identifier" => {
            let lower = node_text(function, source).to_ascii_lowercase();
            lower.contains("register") || lower.ends_with("tool")
        }
        _ => false,
    };
    registration.then_some(CallRule::Registration)
}

fn is_tool_constructor(function: Node<'_>, source: &str) -> bool {
    let mut function = function;
    loop {
        match function.kind() {
            "identifier" => return node_text(function, source).eq_ignore_ascii_case("tool"),
            "attribute" => {
                return function
                    .child_by_field_name("attribute")
                    .map(|attr| node_text(attr, source).eq_ignore_ascii_case("tool"))
                    .unwrap_or(false);
            }
            "call" => match function.child_by_field_name("function") {
                Some(inner) => function = inner,
                None => return false,
            },
            _ => return false,
        }
    }
}

fn call_tool(node: Node<'_>, ctx: &Context<'_>) -> Option<ToolInfo> {
    match classify_call(node, ctx.source)? {
        CallRule::Constructor => tool_from_constructor(node, ctx),
        CallRule::Registration => tool_from_registration(node, ctx),
    }
}

fn tool_from_constructor(node: Node<'_>, ctx: &Context<'_>) -> Option<ToolInfo> {
    let args = parse_call_arguments(node, ctx.source);
    let mut name = args.keyword("name").and_then(|v| ctx.resolve(v));
    let mut description = args.keyword("description").and_then(|v| ctx.resolve(v));

    if name.is_none() {
        if let Some(first) = args.positional.first() {
            name = ctx.resolve(*first);
            if name.is_none() {
                if let Some(callable) = callable_name(*first, ctx.source) {
                    if description.is_none() {
                        description = ctx.docstrings.get(&callable).cloned();
                    }
                    name = Some(callable);
                }
            }
        }
    }
    if description.is_none() {
        description = args.positional.get(1).and_then(|v| ctx.resolve(*v));
    }
    tool_info(name?, description, ctx)
}

fn tool_from_registration(node: Node<'_>, ctx: &Context<'_>) -> Option<ToolInfo> {
    let args = parse_call_arguments(node, ctx.source);
    let mut name = None;
    let mut description = None;
    for (keyword, value) in &args.keywords {
        match keyword.as_str() {
            "name" => name = ctx.resolve(*value),
            "description" => description = ctx.resolve(*value),
            "title" | "label" if name.is_none() => name = ctx.resolve(*value),
            "tool" | "tool_obj" => {
                let nested = value.kind() == "call"
                    && classify_call(*value, ctx.source) == Some(CallRule::Constructor);
                if nested {
                    if let Some(tool) = tool_from_constructor(*value, ctx) {
                        return Some(tool);
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(name) = name {
        return tool_info(name, description, ctx);
    }

    if let Some(first) = args.positional.first() {
        name = ctx.resolve(*first);
        if name.is_none() {
            if let Some(callable) = callable_name(*first, ctx.source) {
                if description.is_none() {
                    description = ctx.docstrings.get(&callable).cloned();
                }
                name = Some(callable);
            }
        }
    }
    if let Some(second) = args.positional.get(1).and_then(|v| ctx.resolve(*v)) {
        description = Some(second);
    }
    tool_info(name?, description, ctx)
}

fn callable_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source)),
        "attribute" => node
            .child_by_field_name("attribute")
            .map(|attr| node_text(attr, source)),
        _ => None,
    }
}

impl Context<'_> {
    fn resolve(&self, node: Node<'_>) -> Option<String> {
        self.resolver.resolve(node, self.source)
    }
}

fn tool_info(name: String, description: Option<String>, ctx: &Context<'_>) -> Option<ToolInfo> {
    if name.trim().is_empty() {
        return None;
    }
    Some(ToolInfo::new(name, description, ctx.origin))
}

fn push_tool(out: &mut Vec<ToolInfo>, name: String, description: Option<String>, ctx: &Context<'_>) {
    if let Some(tool) = tool_info(name, description, ctx) {
        out.push(tool);
    }
}

struct CallArgs<'a> {
    positional: Vec<Node<'a>>,
    keywords: Vec<(String, Node<'a>)>,
}

impl<'a> CallArgs<'a> {
    fn keyword(&self, name: &str) -> Option<Node<'a>> {
        self.keywords
            .iter()
            .find(|(keyword, _)| keyword == name)
            .map(|(_, value)| *value)
    }
}

fn parse_call_arguments<'a>(node: Node<'a>, source: &str) -> CallArgs<'a> {
    let mut positional = Vec::new();
    let mut keywords = Vec::new();
    let Some(args) = node.child_by_field_name("arguments") else {
        return CallArgs {
            positional,
            keywords,
        };
    };
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        match child.kind() {
            "keyword_argument" => {
                if let (Some(name_node), Some(value_node)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("value"),
                ) {
                    keywords.push((node_text(name_node, source), value_node));
                }
            }
            "comment" | "list_splat" | "dictionary_splat" => {}
            _ => positional.push(child),
        }
    }
    CallArgs {
        positional,
        keywords,
    }
}

/// Literal string values reachable by name within one module.
#[derive(Debug, Default)]
pub struct ValueResolver {
    constants: HashMap<String, String>,
    class_constants: HashMap<String, HashMap<String, String>>,
}

impl ValueResolver {
    pub fn collect(root: Node<'_>, source: &str) -> Self {
        let mut resolver = ValueResolver::default();
        // (scope node, enclosing class)
        let mut pending: Vec<(Node<'_>, Option<String>)> = vec![(root, None)];
        while let Some((scope, class)) = pending.pop() {
            resolver.collect_scope(scope, class, source, &mut pending);
        }
        resolver
    }

    fn collect_scope<'a>(
        &mut self,
        node: Node<'a>,
        class: Option<String>,
        source: &str,
        pending: &mut Vec<(Node<'a>, Option<String>)>,
    ) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "expression_statement" => {
                    let Some((target, value)) = simple_assignment(child, source) else {
                        continue;
                    };
                    let Some(value) = string_value(value, source) else {
                        continue;
                    };
                    match &class {
                        Some(class) => {
                            self.class_constants
                                .entry(class.clone())
                                .or_default()
                                .insert(target, value);
                        }
                        None => {
                            self.constants.insert(target, value);
                        }
                    }
                }
                "class_definition" => self.queue_class(child, source, pending),
                "decorated_definition" => {
                    if let Some(definition) = child.child_by_field_name("definition") {
                        if definition.kind() == "class_definition" {
                            self.queue_class(definition, source, pending);
                        }
                    }
                }
                kind if SCOPE_TRANSPARENT.contains(&kind) => {
                    pending.push((child, class.clone()));
                }
                _ => {}
            }
        }
    }

    fn queue_class<'a>(
        &mut self,
        node: Node<'a>,
        source: &str,
        pending: &mut Vec<(Node<'a>, Option<String>)>,
    ) {
        let (Some(name), Some(body)) = (
            node.child_by_field_name("name"),
            node.child_by_field_name("body"),
        ) else {
            return;
        };
        let name = node_text(name, source);
        self.class_constants.entry(name.clone()).or_default();
        pending.push((body, Some(name)));
    }

    /// Resolves a literal, `NAME`, `Class.ATTR` or `Enum.MEMBER.value`.
    pub fn resolve(&self, node: Node<'_>, source: &str) -> Option<String> {
        let mut node = node;
        loop {
            match node.kind() {
                "string" | "concatenated_string" => return string_value(node, source),
                "identifier" => return self.constants.get(&node_text(node, source)).cloned(),
                "attribute" => {
                    let object = node.child_by_field_name("object")?;
                    let attr = node_text(node.child_by_field_name("attribute")?, source);
                    if object.kind() == "identifier" {
                        let class = node_text(object, source);
                        if let Some(value) = self
                            .class_constants
                            .get(&class)
                            .and_then(|attrs| attrs.get(&attr))
                        {
                            return Some(value.clone());
                        }
                    }
                    if attr != "value" {
                        return None;
                    }
                    node = object;
                }
                _ => return None,
            }
        }
    }
}

fn collect_docstrings(root: Node<'_>, source: &str, out: &mut HashMap<String, String>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if matches!(
            node.kind(),
            "function_definition" | "async_function_definition" | "class_definition"
        ) {
            let name = node.child_by_field_name("name").map(|n| node_text(n, source));
            let doc = node
                .child_by_field_name("body")
                .and_then(|body| extract_docstring(body, source));
            if let (Some(name), Some(doc)) = (name, doc) {
                out.entry(name).or_insert(doc);
            }
        }
        push_children(node, &mut stack);
    }
}

fn node_text(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    source.get(start..end).unwrap_or("").trim().to_string()
}

fn extract_docstring(body: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    let raw = string_value(string_node, source)?;
    let cleaned = clean_docstring(&raw);
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Value of a plain string literal. f-strings and bytes are not constants.
fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => {
            let raw = node_text(node, source);
            let prefix: String = raw
                .chars()
                .take_while(|ch| ch.is_ascii_alphabetic())
                .collect::<String>()
                .to_ascii_lowercase();
            if prefix.contains('f') || prefix.contains('b') {
                return None;
            }
            let inner = unquote_string_literal(&raw)?;
            if prefix.contains('r') {
                Some(inner)
            } else {
                Some(unescape(&inner))
            }
        }
        "concatenated_string" => {
            let mut out = String::new();
            let mut cursor = node.walk();
            for part in node.named_children(&mut cursor) {
                out.push_str(&string_value(part, source)?);
            }
            Some(out)
        }
        _ => None,
    }
}

fn unquote_string_literal(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut idx = 0;
    for (offset, ch) in trimmed.char_indices() {
        if ch.is_ascii_alphabetic() {
            idx = offset + ch.len_utf8();
        } else {
            break;
        }
    }
    let rest = &trimmed[idx..];
    for quote in ["'''", "\"\"\""] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 6 {
            return Some(rest[3..rest.len() - 3].to_string());
        }
    }
    for quote in ['"', '\''] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 2 {
            return Some(rest[1..rest.len() - 1].to_string());
        }
    }
    None
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Normalizes docstring indentation: the first line is stripped, the common
/// indentation of the remaining lines removed, blank edges dropped.
pub fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };
    let margin = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut cleaned = vec![first.trim().to_string()];
    for line in rest {
        let stripped = line.get(margin..).unwrap_or_else(|| line.trim_start());
        cleaned.push(stripped.trim_end().to_string());
    }
    while cleaned.first().is_some_and(|line| line.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|line| line.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

fn first_line(doc: &str) -> Option<String> {
    doc.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
