use mcpscan::discovery::python::PythonDetector;
use mcpscan::discovery::{SourceUnit, ToolDetector, dedupe_tools};
use mcpscan::model::ToolInfo;
use pretty_assertions::assert_eq;

fn detect(source: &str) -> Vec<ToolInfo> {
    let mut detector = PythonDetector::new().unwrap();
    detector.detect(&SourceUnit::new("server.py", source))
}

fn summary(tools: &[ToolInfo]) -> Vec<(&str, Option<&str>)> {
    tools
        .iter()
        .map(|tool| (tool.name.as_str(), tool.description.as_deref()))
        .collect()
}

#[test]
fn decorated_function_with_docstring() {
    let source = "@tool\ndef search(query):\n    \"\"\"Search the web.\"\"\"\n    ...\n";
    assert_eq!(
        detect(source),
        vec![ToolInfo::new(
            "search",
            Some("Search the web.".to_string()),
            "server.py"
        )]
    );
}

#[test]
fn fastmcp_decorator_uses_first_docstring_line() {
    let source = r#"
from mcp.server.fastmcp import FastMCP

mcp = FastMCP("demo")


@mcp.tool()
async def add(a: int, b: int) -> int:
    """Add two numbers.

    Returns the sum.
    """
    return a + b


@mcp.resource("greeting://{name}")
def greeting(name: str) -> str:
    return name


def helper():
    return 1
"#;
    assert_eq!(summary(&detect(source)), vec![("add", Some("Add two numbers."))]);
}

#[test]
fn decorator_calls_are_not_constructors() {
    let source = r#"
@server.call_tool()
async def handle_call(name, arguments):
    return []
"#;
    assert!(detect(source).is_empty());
}

#[test]
fn constructor_calls_resolve_constants() {
    let source = r#"
from enum import Enum

SEARCH_NAME = "web_search"

if True:
    FALLBACK = "fallback"


class Names:
    FETCH = "fetch_url"


class Kind(Enum):
    LOOKUP = "lookup"


def build(x):
    return [
        Tool(name=SEARCH_NAME, description="Search" " the web"),
        types.Tool(name=Names.FETCH, description=f"Fetch {x}"),
        Tool(name=Kind.LOOKUP.value),
        Tool(name=FALLBACK),
        Tool(name=unknown_name),
    ]
"#;
    assert_eq!(
        summary(&detect(source)),
        vec![
            ("web_search", Some("Search the web")),
            ("fetch_url", None),
            ("lookup", None),
            ("fallback", None),
        ]
    );
}

#[test]
fn registration_calls() {
    let source = r#"
def read_file(path):
    """Read a file from disk."""


registry.register_tool(read_file)
server.add_tool(name="ping", description="Reply with pong")
app.register(tool=Tool(name="nested", description="From nested"))
register_handler("legacy", "Legacy handler")
menu.add_item(title="not a tool")
"#;
    let tools = dedupe_tools(detect(source));
    assert_eq!(
        summary(&tools),
        vec![
            ("read_file", Some("Read a file from disk.")),
            ("ping", Some("Reply with pong")),
            ("nested", Some("From nested")),
            ("legacy", Some("Legacy handler")),
        ]
    );
}

#[test]
fn decorator_call_arguments_name_extra_tools() {
    let source = r#"
@mcp.tool(name="custom_search", description="Search with a custom name")
def search(query):
    """Search the web."""


@mcp.tool("positional_name")
def other():
    pass
"#;
    assert_eq!(
        summary(&detect(source)),
        vec![
            ("search", Some("Search the web.")),
            ("custom_search", Some("Search with a custom name")),
            ("other", None),
            ("positional_name", None),
        ]
    );
}

#[test]
fn registration_name_fallbacks() {
    let source = r#"
server.add_tool(title="titled")
registry.register(label="labelled", description="From a label")
app.register(name="outer", tool=Tool(name="inner", description="Nested wins"))
"#;
    let tools = dedupe_tools(detect(source));
    assert_eq!(
        summary(&tools),
        vec![
            ("titled", None),
            ("labelled", Some("From a label")),
            ("inner", Some("Nested wins")),
        ]
    );
}

#[test]
fn deeply_nested_literals_do_not_exhaust_the_stack() {
    let depth = 5000;
    let source = format!(
        "x = {}1{}\n\n@tool\ndef ok():\n    pass\n",
        "[".repeat(depth),
        "]".repeat(depth)
    );
    let names = std::thread::spawn(move || {
        detect(&source)
            .into_iter()
            .map(|tool| tool.name)
            .collect::<Vec<_>>()
    })
    .join()
    .unwrap();
    assert_eq!(names, vec!["ok"]);
}

#[test]
fn classes_deriving_from_tool_bases() {
    let source = r#"
class SearchTool(BaseTool):
    """Searches documents.

    Uses the index."""

    name: str = "doc_search"


class Helper(object):
    pass


class Weather(tools.Tool):
    description = "Current weather"
"#;
    assert_eq!(
        summary(&detect(source)),
        vec![
            ("doc_search", Some("Searches documents.\n\nUses the index.")),
            ("Weather", Some("Current weather")),
        ]
    );
}

#[test]
fn syntax_errors_skip_the_file() {
    let source = "def broken(:\n    pass\n\n@tool\ndef fine():\n    \"\"\"Fine.\"\"\"\n";
    assert!(detect(source).is_empty());
}

#[test]
fn origin_is_the_unit_path() {
    let mut detector = PythonDetector::new().unwrap();
    let tools = detector.detect(&SourceUnit::new(
        "pkg/tools/search.py",
        "@register_tool\ndef lookup():\n    pass\n",
    ));
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].origin, "pkg/tools/search.py");
    assert_eq!(tools[0].description, None);
}
