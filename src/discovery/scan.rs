use anyhow::{Result, bail};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Directory and file names never descended into: dependency trees, build
/// output, tests and fixtures, virtual environments.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "public",
    "coverage",
    "out",
    "__pycache__",
    "venv",
    "tmp",
    "temp",
    "frontend",
    "locales",
    "__tests__",
    "tests",
    "spec",
    "models",
    "vendor",
    "target",
    "fixtures",
];

const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub language: &'static str,
}

#[derive(Debug, Clone)]
struct LanguageSpec {
    name: &'static str,
    extensions: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Honor `.gitignore`/`.ignore` files. Off by default: the skip list is
    /// the only filter.
    pub use_ignore_files: bool,
    pub max_file_bytes: u64,
    skip_dirs: Arc<[String]>,
}

impl ScanOptions {
    pub fn new(use_ignore_files: bool) -> Self {
        Self {
            use_ignore_files,
            ..Self::default()
        }
    }

    pub fn with_skip_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_dirs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    /// True when `name` (a single path component) must not be walked.
    pub fn is_skipped_name(&self, name: &str) -> bool {
        name.starts_with('.') || self.skip_dirs.iter().any(|skip| skip == name)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            use_ignore_files: false,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        name: "python",
        extensions: &["py"],
    },
    LanguageSpec {
        name: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageSpec {
        name: "typescript",
        extensions: &["ts", "tsx", "mts", "cts"],
    },
    LanguageSpec {
        name: "go",
        extensions: &["go"],
    },
    LanguageSpec {
        name: "php",
        extensions: &["php"],
    },
    LanguageSpec {
        name: "csharp",
        extensions: &["cs"],
    },
    LanguageSpec {
        name: "kotlin",
        extensions: &["kt", "kts"],
    },
];

pub fn scan_repo_with_options(repo_root: &Path, options: &ScanOptions) -> Result<Vec<ScannedFile>> {
    if !repo_root.is_dir() {
        bail!("repository root is not a directory: {}", repo_root.display());
    }
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.use_ignore_files {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .parents(false)
            .require_git(false);
    } else {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    }
    let filter = options.clone();
    let walker = builder
        .hidden(false)
        .filter_entry(move |entry| {
            entry.depth() == 0 || !filter.is_skipped_name(&entry.file_name().to_string_lossy())
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "walk error");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let Some(language) = detect_language(path) else {
            continue;
        };
        let too_large = entry
            .metadata()
            .map(|meta| meta.len() > options.max_file_bytes)
            .unwrap_or(false);
        if too_large {
            debug!(path = %path.display(), "skipping oversized file");
            continue;
        }
        let rel_path = match crate::util::normalize_rel_path(repo_root, path) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "cannot relativize path");
                continue;
            }
        };
        files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            language,
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    LANGUAGE_SPECS
        .iter()
        .find(|spec| spec.extensions.iter().any(|candidate| *candidate == ext))
        .map(|spec| spec.name)
}

pub fn language_for_path(path: &Path) -> Option<&'static str> {
    detect_language(path)
}

/// Bundled/minified assets are noise for the pattern detectors.
pub fn is_minified(rel_path: &str) -> bool {
    rel_path.ends_with(".min.js") || rel_path.ends_with(".min.ts")
}
