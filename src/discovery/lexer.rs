//! String- and comment-aware scanning over raw source text.
//!
//! These helpers are shared by every detector that does not have a real
//! parser. They understand `'`, `"` and `` ` `` string literals with backslash
//! escapes, `//` line comments and `/* */` block comments, which covers the
//! C-family syntax of JavaScript, TypeScript, Go, PHP and C# well enough to cut
//! argument lists and object literals out of a file.
//!
//! Delimiters are all ASCII, so scanning bytes is safe for UTF-8 input: a
//! continuation byte never equals an ASCII delimiter and every returned slice
//! starts and ends on a char boundary.

const QUOTES: &[u8] = b"'\"`";

/// Outcome of looking at one byte position outside of a string.
enum Step {
    /// Skip to this byte index (a comment was consumed).
    Jump(usize),
    /// The comment never terminates.
    Unterminated,
    /// Ordinary character.
    Char,
}

fn skip_comment(bytes: &[u8], index: usize) -> Step {
    if bytes[index] != b'/' || index + 1 >= bytes.len() {
        return Step::Char;
    }
    match bytes[index + 1] {
        b'/' => match find_byte(bytes, index + 2, b'\n') {
            Some(newline) => Step::Jump(newline + 1),
            None => Step::Unterminated,
        },
        b'*' => match find_seq(bytes, index + 2, b"*/") {
            Some(end) => Step::Jump(end + 2),
            None => Step::Unterminated,
        },
        _ => Step::Char,
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|byte| *byte == needle)
        .map(|pos| from + pos)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

/// Returns the text strictly between `source[start]` (which must be `open`) and
/// its matching `close`, or `None` if the source ends first.
pub fn extract_balanced(source: &str, start: usize, open: char, close: char) -> Option<&str> {
    let bytes = source.as_bytes();
    let (open, close) = (ascii(open)?, ascii(close)?);
    if bytes.get(start) != Some(&open) {
        return None;
    }
    let mut depth = 1usize;
    let mut in_string: Option<u8> = None;
    let mut escape = false;
    let mut index = start + 1;

    while index < bytes.len() {
        let byte = bytes[index];
        if let Some(quote) = in_string {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == quote {
                in_string = None;
            }
            index += 1;
            continue;
        }
        match skip_comment(bytes, index) {
            Step::Jump(next) => {
                index = next;
                continue;
            }
            Step::Unterminated => return None,
            Step::Char => {}
        }
        if QUOTES.contains(&byte) {
            in_string = Some(byte);
        } else if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return source.get(start + 1..index);
            }
        }
        index += 1;
    }
    None
}

fn ascii(ch: char) -> Option<u8> {
    if ch.is_ascii() { Some(ch as u8) } else { None }
}

/// Walks `text` and calls `visit(index, byte)` for every byte that sits at
/// nesting depth zero outside strings and comments. Comment bytes are never
/// visited. Stops early when `visit` returns `false`.
fn scan_top_level(text: &str, mut visit: impl FnMut(usize, u8, bool) -> bool) {
    let bytes = text.as_bytes();
    let (mut paren, mut brace, mut bracket) = (0usize, 0usize, 0usize);
    let mut in_string: Option<u8> = None;
    let mut escape = false;
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        if let Some(quote) = in_string {
            if escape {
                escape = false;
            } else if byte == b'\\' {
                escape = true;
            } else if byte == quote {
                in_string = None;
            }
            if !visit(index, byte, false) {
                return;
            }
            index += 1;
            continue;
        }
        match skip_comment(bytes, index) {
            Step::Jump(next) => {
                index = next;
                continue;
            }
            Step::Unterminated => return,
            Step::Char => {}
        }
        if QUOTES.contains(&byte) {
            in_string = Some(byte);
        }
        match byte {
            b'(' => paren += 1,
            b')' => paren = paren.saturating_sub(1),
            b'{' => brace += 1,
            b'}' => brace = brace.saturating_sub(1),
            b'[' => bracket += 1,
            b']' => bracket = bracket.saturating_sub(1),
            _ => {}
        }
        let top = in_string.is_none() && paren == 0 && brace == 0 && bracket == 0;
        if !visit(index, byte, top) {
            return;
        }
        index += 1;
    }
}

/// Splits `text` on `separator` wherever it appears outside brackets, strings
/// and comments. Parts are trimmed; empty parts are dropped.
pub fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let Some(separator) = ascii(separator) else {
        return vec![text.trim().to_string()];
    };
    let mut parts = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    scan_top_level(text, |_, byte, top| {
        if top && byte == separator {
            push_part(&mut parts, &current);
            current.clear();
        } else {
            current.push(byte);
        }
        true
    });
    push_part(&mut parts, &current);
    parts
}

fn push_part(parts: &mut Vec<String>, raw: &[u8]) {
    let part = String::from_utf8_lossy(raw);
    let trimmed = part.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
}

/// Byte index of the first top-level occurrence of `ch` in `text`.
pub fn find_top_level(text: &str, ch: char) -> Option<usize> {
    let needle = ascii(ch)?;
    let mut found = None;
    scan_top_level(text, |index, byte, top| {
        if top && byte == needle {
            found = Some(index);
            return false;
        }
        true
    });
    found
}

/// The quoted literal (quotes included) at the very start of `text`.
pub fn leading_string_literal(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let quote = *bytes.first()?;
    if !QUOTES.contains(&quote) {
        return None;
    }
    let mut escape = false;
    for (index, byte) in bytes.iter().enumerate().skip(1) {
        if escape {
            escape = false;
        } else if *byte == b'\\' {
            escape = true;
        } else if *byte == quote {
            return text.get(..=index);
        }
    }
    None
}

/// Strips matching outer quotes and unescapes escaped quote characters.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    let bytes = value.as_bytes();
    let inner = if bytes.len() >= 2
        && bytes[0] == bytes[bytes.len() - 1]
        && QUOTES.contains(&bytes[0])
    {
        &value[1..value.len() - 1]
    } else {
        value
    };
    inner
        .replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("\\`", "`")
}

/// Byte index of the start of the line containing `index`.
pub fn line_start(source: &str, index: usize) -> usize {
    source
        .get(..index)
        .and_then(|head| head.rfind('\n'))
        .map(|newline| newline + 1)
        .unwrap_or(0)
}

/// First prose line of the `/** ... */` block that ends right before `index`,
/// with only whitespace in between. Tag lines (`@param`) are not prose.
pub fn doc_comment_before(source: &str, index: usize) -> Option<String> {
    let before = source.get(..index)?.trim_end();
    let inner = before.strip_suffix("*/")?;
    let start = inner.rfind("/**")?;
    inner[start + 3..]
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .find(|line| !line.is_empty() && !line.starts_with('@'))
        .map(str::to_string)
}

/// Skips ASCII whitespace starting at `index`.
pub fn skip_whitespace(source: &str, mut index: usize) -> usize {
    let bytes = source.as_bytes();
    while index < bytes.len() && bytes[index].is_ascii_whitespace() {
        index += 1;
    }
    index
}
