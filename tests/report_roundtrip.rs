use mcpscan::model::ToolInfo;
use mcpscan::report::{format_report, parse_report};
use pretty_assertions::assert_eq;

#[test]
fn parses_rendered_reports() {
    let tools = vec![
        ToolInfo::new("search", Some("Search the web.".to_string()), "server.py"),
        ToolInfo::new(
            "summarize",
            Some("Summarize a document.\n\nLong inputs are chunked first.".to_string()),
            "tools/extra.py",
        ),
        ToolInfo::new("echo", None, "src/index.ts"),
    ];
    assert_eq!(parse_report(&format_report(&tools)), tools);
}

#[test]
fn tolerates_hand_edited_spacing() {
    let text = [
        "Discovered MCP tools:",
        "",
        "- Name:   fetch  ",
        "  Description:",
        "  Fetch a URL.",
        "  Declared in:   src/fetch.go",
        "",
        "- Name: noop",
        "  Declared in: a.py",
        "",
    ]
    .join("\n");
    let parsed = parse_report(&text);
    assert_eq!(
        parsed,
        vec![
            ToolInfo::new("fetch", Some("Fetch a URL.".to_string()), "src/fetch.go"),
            ToolInfo::new("noop", None, "a.py"),
        ]
    );
}
