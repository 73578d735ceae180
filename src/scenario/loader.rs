//! Scenario discovery: walk a root directory, match file paths against a
//! glob, and parse whatever looks like a scenario.
//!
//! Discovery is permissive. Any matching file with a top-level `steps` list
//! is a scenario; other matching files are skipped, not rejected. A file that
//! cannot be read is an infrastructure failure, a file that cannot be parsed
//! is a scenario failure, and both are handed to the runner so they show up
//! in the report next to the scenarios that did load.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::core::errors::{AdselError, Result};
use crate::scenario::format::{self, Scenario, SourceFormat};

/// Shell-style glob compiled to a regex.
///
/// - `**` matches any run of characters, separators included
/// - `*` matches anything except `/`
/// - `?` matches one character except `/`
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: glob_to_regex(pattern)?,
        })
    }

    #[must_use]
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(&candidate.replace('\\', "/"))
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Validate that a glob pattern can be compiled.
pub fn validate_glob_pattern(pattern: &str) -> Result<()> {
    glob_to_regex(pattern).map(|_| ())
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let normalized = pattern.replace('\\', "/");
    let chars: Vec<char> = normalized.chars().collect();
    let mut regex_str = String::with_capacity(chars.len() * 2);
    regex_str.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex_str.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c => {
                regex_str.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }
    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| AdselError::InvalidConfig {
        details: format!("invalid glob pattern {pattern:?}: {err}"),
    })
}

/// What to discover and where.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub root: PathBuf,
    /// Glob over paths relative to `root`.
    pub pattern: String,
    /// Optional glob over scenario ids.
    pub filter: Option<String>,
    pub max_depth: usize,
}

/// A matching file that could not become a scenario.
#[derive(Debug)]
pub struct LoadFailure {
    pub id: String,
    pub path: PathBuf,
    pub error: AdselError,
}

/// Everything found under a root, sorted by id.
#[derive(Debug, Default)]
pub struct Discovery {
    pub scenarios: Vec<Scenario>,
    pub failures: Vec<LoadFailure>,
    /// Matching files without `steps`.
    pub skipped: Vec<PathBuf>,
}

/// Walk `config.root` and load every matching scenario.
pub fn discover(config: &DiscoveryConfig) -> Result<Discovery> {
    let pattern = GlobMatcher::new(&config.pattern)?;
    let filter = config.filter.as_deref().map(GlobMatcher::new).transpose()?;

    let mut files = Vec::new();
    collect_files(&config.root, &config.root, 0, config.max_depth, &mut files)?;
    files.sort();

    let mut out = Discovery::default();
    for relative in files {
        let rel_str = slash_path(&relative);
        if !pattern.is_match(&rel_str) {
            continue;
        }
        let id = scenario_id(&relative);
        if filter.as_ref().is_some_and(|f| !f.is_match(&id)) {
            continue;
        }

        let path = config.root.join(&relative);
        let format = SourceFormat::from_extension(relative.extension().and_then(|e| e.to_str()));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => {
                out.failures.push(LoadFailure {
                    id,
                    error: AdselError::io(&path, source),
                    path,
                });
                continue;
            }
        };

        match format::parse(&id, &text, format) {
            Ok(Some(spec)) => out.scenarios.push(Scenario {
                id,
                source: Some(path),
                spec,
            }),
            Ok(None) => out.skipped.push(path),
            Err(error) => out.failures.push(LoadFailure { id, path, error }),
        }
    }

    Ok(out)
}

/// Keep only scenarios whose id matches `filter`.
pub fn filter_by_id(scenarios: Vec<Scenario>, filter: Option<&str>) -> Result<Vec<Scenario>> {
    let Some(filter) = filter else {
        return Ok(scenarios);
    };
    let matcher = GlobMatcher::new(filter)?;
    Ok(scenarios
        .into_iter()
        .filter(|s| matcher.is_match(&s.id))
        .collect())
}

/// `greendoc/h4.toml` → `greendoc/h4`.
#[must_use]
pub fn scenario_id(relative: &Path) -> String {
    slash_path(&relative.with_extension(""))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_files(
    root: &Path,
    dir: &Path,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // Nested directories that vanish or deny access are skipped; only the
        // root itself must be readable.
        Err(err)
            if depth > 0
                && matches!(err.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) =>
        {
            return Ok(());
        }
        Err(source) => return Err(AdselError::io(dir, source)),
    };

    for entry in entries {
        let entry = entry.map_err(|source| AdselError::io(dir, source))?;
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if depth + 1 < max_depth {
                collect_files(root, &path, depth + 1, max_depth, out)?;
            }
        } else if file_type.is_file()
            && let Ok(relative) = path.strip_prefix(root)
        {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn config(root: &Path) -> DiscoveryConfig {
        DiscoveryConfig {
            root: root.to_path_buf(),
            pattern: "**/*.toml".into(),
            filter: None,
            max_depth: 8,
        }
    }

    const SCENARIO: &str = "devices = [\"Internal\"]\nsteps = [\"plug A\", \"expect A\"]\n";

    #[test]
    fn glob_star_stays_within_component() {
        let m = GlobMatcher::new("greendoc/*").unwrap();
        assert!(m.is_match("greendoc/h4"));
        assert!(!m.is_match("greendoc/deep/h4"));
        assert!(!m.is_match("dd/dd1_1"));
    }

    #[test]
    fn glob_double_star_crosses_components() {
        let m = GlobMatcher::new("**/*.toml").unwrap();
        assert!(m.is_match("h4.toml"));
        assert!(m.is_match("greendoc/h4.toml"));
        assert!(!m.is_match("greendoc/h4.json"));
    }

    #[test]
    fn glob_metacharacters_are_literal() {
        let m = GlobMatcher::new("dd/dd1_?.toml").unwrap();
        assert!(m.is_match("dd/dd1_1.toml"));
        assert!(!m.is_match("dd/dd1_1xtoml"));
    }

    #[test]
    fn ids_are_relative_without_extension() {
        assert_eq!(scenario_id(Path::new("greendoc/h4.toml")), "greendoc/h4");
        assert_eq!(scenario_id(Path::new("top.json")), "top");
    }

    #[test]
    fn discovers_sorted_scenarios_and_skips_non_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b/second.toml", SCENARIO);
        write(dir.path(), "a/first.toml", SCENARIO);
        write(dir.path(), "a/notes.toml", "title = \"not a scenario\"\n");
        write(dir.path(), "a/readme.md", "ignored");

        let found = discover(&config(dir.path())).unwrap();
        let ids: Vec<&str> = found.scenarios.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a/first", "b/second"]);
        assert_eq!(found.skipped.len(), 1);
        assert!(found.failures.is_empty());
    }

    #[test]
    fn parse_failures_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.toml", SCENARIO);
        write(dir.path(), "broken.toml", "steps = [\"plug\"\n");

        let found = discover(&config(dir.path())).unwrap();
        assert_eq!(found.scenarios.len(), 1);
        assert_eq!(found.failures.len(), 1);
        assert_eq!(found.failures[0].id, "broken");
        assert_eq!(found.failures[0].error.code(), "ADSEL-2002");
    }

    #[test]
    fn filter_applies_to_ids() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "greendoc/h4.toml", SCENARIO);
        write(dir.path(), "dd/dd2_2.toml", SCENARIO);

        let mut cfg = config(dir.path());
        cfg.filter = Some("dd/*".into());
        let found = discover(&cfg).unwrap();
        assert_eq!(found.scenarios.len(), 1);
        assert_eq!(found.scenarios[0].id, "dd/dd2_2");
    }

    #[test]
    fn missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&config(&dir.path().join("nope"))).unwrap_err();
        assert_eq!(err.code(), "ADSEL-3001");
    }
}
