// src/pipeline/report.rs
// =============================================================================
// What the pipeline produces, and how it is shown.
//
// Every repository ends in exactly one `Outcome`. Only `Outcome::Checked`
// produces a line of output: a repository without a `.travis.yml`, or whose
// `.travis.yml` has no `python:` key, is silently skipped.
//
// Output streams:
// - matching repositories go to stdout (green on a terminal)
// - mismatching repositories go to stderr (red on a terminal)
// so `travis-pyversion ... 2>/dev/null` lists exactly the matches.
// =============================================================================

use std::io::{self, Write};

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::tty::IsTty;
use serde::Serialize;

use crate::github::FetchError;
use crate::travis::{ConfigError, DeclaredVersions};

/// The result of checking one repository's declared versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub repo_name: String,
    /// String forms of the declared versions, sorted for lists
    pub declared_versions: Vec<String>,
    pub is_match: bool,
}

impl MatchResult {
    pub fn new(repo_name: impl Into<String>, declared: &DeclaredVersions, target: &str) -> Self {
        Self {
            repo_name: repo_name.into(),
            declared_versions: declared.rendered(),
            is_match: declared.matches(target),
        }
    }

    /// "3.6, 3.7, 3.8"
    pub fn versions_display(&self) -> String {
        self.declared_versions.join(", ")
    }
}

/// How processing a single repository (or listing page) ended
#[derive(Debug)]
pub enum Outcome {
    /// A fork, and forks weren't requested. Nothing was fetched.
    SkippedFork { repo: String },
    /// The repository has no `.travis.yml` (404)
    NoConfig { repo: String },
    /// The `.travis.yml` couldn't be parsed
    InvalidConfig { repo: String, error: ConfigError },
    /// The `.travis.yml` has no `python:` key
    NoPythonKey { repo: String },
    /// Versions were found and compared
    Checked(MatchResult),
    /// Fetching the `.travis.yml` failed
    Failed { repo: String, error: FetchError },
    /// Fetching a listing page (2 or later) failed
    PageFailed { url: String, error: FetchError },
}

/// Counters for a complete run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Repositories seen in the listing (forks included)
    pub repositories: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub skipped_forks: usize,
    pub without_config: usize,
    pub invalid_config: usize,
    pub without_python: usize,
    pub failed_repositories: usize,
    pub failed_pages: usize,
}

impl RunSummary {
    /// Updates the counters with one outcome
    pub fn record(&mut self, outcome: &Outcome) {
        if !matches!(outcome, Outcome::PageFailed { .. }) {
            self.repositories += 1;
        }

        match outcome {
            Outcome::SkippedFork { .. } => self.skipped_forks += 1,
            Outcome::NoConfig { .. } => self.without_config += 1,
            Outcome::InvalidConfig { .. } => self.invalid_config += 1,
            Outcome::NoPythonKey { .. } => self.without_python += 1,
            Outcome::Checked(result) if result.is_match => self.matched += 1,
            Outcome::Checked(_) => self.mismatched += 1,
            Outcome::Failed { .. } => self.failed_repositories += 1,
            Outcome::PageFailed { .. } => self.failed_pages += 1,
        }
    }

    /// Returns true if any page or repository could not be fetched
    pub fn has_failures(&self) -> bool {
        self.failed_repositories > 0 || self.failed_pages > 0
    }
}

/// How result lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Prints one result: matches to stdout, mismatches to stderr.
///
/// Colors are only used when the chosen stream is a terminal.
pub fn print_result(result: &MatchResult, format: OutputFormat) -> io::Result<()> {
    if result.is_match {
        let use_color = io::stdout().is_tty();
        write_result(&mut io::stdout().lock(), result, format, use_color)
    } else {
        let use_color = io::stderr().is_tty();
        write_result(&mut io::stderr().lock(), result, format, use_color)
    }
}

/// Writes one result line to any writer
pub fn write_result<W: Write>(
    writer: &mut W,
    result: &MatchResult,
    format: OutputFormat,
    use_color: bool,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer(&mut *writer, result)?;
        return writeln!(writer);
    }

    let color = if result.is_match {
        Color::Green
    } else {
        Color::Red
    };

    if use_color {
        write!(writer, "{}", SetForegroundColor(color))?;
    }

    write!(writer, "{}: {}", result.repo_name, result.versions_display())?;

    if use_color {
        write!(writer, "{}", ResetColor)?;
    }
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::travis::TravisConfig;

    fn declared(yaml: &str) -> DeclaredVersions {
        TravisConfig::parse(yaml).unwrap().python.unwrap()
    }

    #[test]
    fn test_match_result_from_declaration() {
        let python = declared("python: [3.7, \"3.6\", 3.8]");
        let result = MatchResult::new("alice/project", &python, "3.8");

        assert!(result.is_match);
        assert_eq!(result.declared_versions, vec!["3.6", "3.7", "3.8"]);
        assert_eq!(result.versions_display(), "3.6, 3.7, 3.8");
    }

    #[test]
    fn test_write_plain_line() {
        let result = MatchResult::new("alice/old", &declared("python: 2.7"), "3.8");
        let mut out = Vec::new();

        write_result(&mut out, &result, OutputFormat::Text, false).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "alice/old: 2.7\n");
    }

    #[test]
    fn test_write_colored_line() {
        let result = MatchResult::new("alice/new", &declared("python: \"3.8\""), "3.8");
        let mut out = Vec::new();

        write_result(&mut out, &result, OutputFormat::Text, true).unwrap();

        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("\x1b["), "should start with a color code: {:?}", line);
        assert!(line.contains("alice/new: 3.8"));
        assert!(line.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn test_write_json_line() {
        let result = MatchResult::new("alice/new", &declared("python: [\"3.8\"]"), "3.8");
        let mut out = Vec::new();

        write_result(&mut out, &result, OutputFormat::Json, true).unwrap();

        let line = String::from_utf8(out).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["repo_name"], "alice/new");
        assert_eq!(value["declared_versions"], serde_json::json!(["3.8"]));
        assert_eq!(value["is_match"], true);
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = RunSummary::default();

        let yes = MatchResult::new("a/yes", &declared("python: 3.8"), "3.8");
        let no = MatchResult::new("a/no", &declared("python: 2.7"), "3.8");

        summary.record(&Outcome::SkippedFork { repo: "a/fork".into() });
        summary.record(&Outcome::NoConfig { repo: "a/none".into() });
        summary.record(&Outcome::NoPythonKey { repo: "a/rust".into() });
        summary.record(&Outcome::Checked(yes));
        summary.record(&Outcome::Checked(no));

        assert_eq!(summary.repositories, 5);
        assert_eq!(summary.skipped_forks, 1);
        assert_eq!(summary.without_config, 1);
        assert_eq!(summary.without_python, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.mismatched, 1);
        assert!(!summary.has_failures());
    }
}
