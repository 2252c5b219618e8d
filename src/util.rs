use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn normalize_rel_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(repo_root).with_context(|| {
        format!(
            "strip prefix {} from {}",
            repo_root.display(),
            path.display()
        )
    })?;
    Ok(normalize_path(rel))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Repository identifiers from a list file: one per line, blank lines and
/// `#` comments ignored.
pub fn parse_identifier_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_paths() {
        let root = Path::new("/repo");
        assert_eq!(
            normalize_rel_path(root, Path::new("/repo/src/./server.py")).unwrap(),
            "src/server.py"
        );
        assert_eq!(normalize_path(Path::new("")), ".");
        assert!(normalize_rel_path(root, Path::new("/elsewhere/a.py")).is_err());
    }

    #[test]
    fn identifier_list_skips_comments() {
        let list = "# servers\nowner/a\n\n  https://github.com/owner/b.git  # mirror\n#owner/c\n";
        assert_eq!(
            parse_identifier_list(list),
            vec!["owner/a", "https://github.com/owner/b.git"]
        );
    }
}
