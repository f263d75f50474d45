//! Ignore-rule collection and evaluation.
//!
//! Ignore files hold one glob pattern per line (`#` comments and blank lines
//! skipped) and apply to the directory containing the file and everything
//! below it. Rules from deeper directories take precedence over ancestors,
//! and a `!` prefix re-includes a previously ignored path. Evaluation is a
//! pure function of the rule set, so the same set can be reused across scans
//! and the answer never depends on traversal order.

use globset::{GlobBuilder, GlobMatcher};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File names recognized as ignore-pattern files.
pub const IGNORE_FILENAMES: &[&str] = &[".gitignore", ".bsignore"];

/// A single compiled ignore pattern, scoped to one directory.
#[derive(Debug)]
struct IgnoreRule {
    /// Directory containing the ignore file; the rule applies below it.
    scope: PathBuf,
    /// Component count of `scope`, used for precedence ordering.
    depth: usize,
    /// `!`-prefixed patterns re-include matching paths.
    negated: bool,
    /// Matches the path itself.
    matcher: GlobMatcher,
    /// Matches anything nested under a matched directory.
    children_matcher: GlobMatcher,
}

/// Ordered, precedence-resolved set of ignore rules.
///
/// Rules are held shallowest scope first; `is_ignored` takes the last
/// matching rule's verdict, which gives deeper files precedence and makes
/// negation within one file last-match-wins.
#[derive(Debug, Default)]
pub struct IgnoreRuleSet {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRuleSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether `path` (absolute) is excluded by the rule set.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            let Ok(rel) = path.strip_prefix(&rule.scope) else {
                continue;
            };
            let rel = slash_path(rel);
            if rel.is_empty() {
                continue;
            }
            if rule.matcher.is_match(&rel) || rule.children_matcher.is_match(&rel) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

/// Parse one ignore file into its raw pattern lines.
///
/// Blank lines and `#` comments are dropped; `!` prefixes are preserved for
/// the caller to interpret.
pub fn parse_ignore_file(path: &Path) -> io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Collect and merge every ignore file found under the given roots.
///
/// The merged set is ordered by scope depth (shallowest first) so that
/// evaluation precedence is deterministic no matter which order the roots or
/// directories were visited in.
pub fn collect_ignore_rules(roots: &[PathBuf]) -> io::Result<IgnoreRuleSet> {
    let mut rules = Vec::new();

    for root in roots {
        let walker = WalkDir::new(root).sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !IGNORE_FILENAMES.contains(&name.as_ref()) {
                continue;
            }

            let scope = entry
                .path()
                .parent()
                .unwrap_or(Path::new("/"))
                .to_path_buf();
            for pattern in parse_ignore_file(entry.path())? {
                match compile_rule(&scope, &pattern) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => {
                        tracing::warn!(
                            "Skipping malformed ignore pattern {:?} in {}: {}",
                            pattern,
                            entry.path().display(),
                            e
                        );
                    }
                }
            }
        }
    }

    // Shallow scopes first; stable sort keeps in-file order within a scope.
    rules.sort_by_key(|r| r.depth);

    Ok(IgnoreRuleSet { rules })
}

/// Compile a single pattern line into a scoped rule.
fn compile_rule(scope: &Path, pattern: &str) -> Result<IgnoreRule, globset::Error> {
    let (negated, pattern) = match pattern.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let pattern = pattern.trim_end_matches('/');

    // A pattern with no slash matches at any depth below the scope; a
    // slashed pattern is anchored to the scope directory.
    let anchored = if let Some(rest) = pattern.strip_prefix('/') {
        rest.to_string()
    } else if pattern.contains('/') {
        pattern.to_string()
    } else {
        format!("**/{pattern}")
    };

    let matcher = build_glob(&anchored)?;
    let children_matcher = build_glob(&format!("{anchored}/**"))?;

    Ok(IgnoreRule {
        scope: scope.to_path_buf(),
        depth: scope.components().count(),
        negated,
        matcher,
        children_matcher,
    })
}

fn build_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Relative path as a forward-slash string.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
