use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    /// Program runs to completion; stdout is compared.
    RuntimeSuccess,
    /// A lexer/parser/type-checker diagnostic stops the pipeline.
    CompileError,
    /// The interpreter starts and raises exactly one fault.
    RuntimeError,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedOutcome {
    pub exit_code: i32,
    pub stdout_file: Option<String>,
    pub stderr_contains_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    pub expected: ExpectedOutcome,
    /// Scripted stdin lines, one per line.
    #[serde(default)]
    pub input_file: Option<String>,
    /// JSON limits file passed to the run.
    #[serde(default)]
    pub config_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    /// Reads one case directory and checks it is self-consistent, so a
    /// broken fixture fails at load time instead of as a confusing
    /// mid-run mismatch.
    fn load(dir: PathBuf) -> Result<Self> {
        let name = dir
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Case directory {} has a non-UTF-8 name", dir.display()))?;

        let spec_path = dir.join("case.yaml");
        let spec_raw = fs::read_to_string(&spec_path)
            .with_context(|| format!("Reading {}", spec_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&spec_raw)
            .with_context(|| format!("Parsing {}", spec_path.display()))?;

        let program_path = dir.join("program.aud");
        ensure!(
            program_path.is_file(),
            "Case {name} has no program.aud next to its case.yaml"
        );

        let case = Self {
            name,
            dir,
            program_path,
            spec,
        };
        case.validate()?;
        Ok(case)
    }

    /// Every fixture the spec names must exist, and each case class must
    /// name the output it is judged by.
    fn validate(&self) -> Result<()> {
        let referenced = [
            self.spec.expected.stdout_file.as_deref(),
            self.spec.expected.stderr_contains_file.as_deref(),
            self.spec.input_file.as_deref(),
            self.spec.config_file.as_deref(),
        ];
        for fixture in referenced.into_iter().flatten() {
            ensure!(
                self.dir.join(fixture).is_file(),
                "Case {} references missing fixture file {fixture}",
                self.name
            );
        }

        match self.spec.class {
            CaseClass::RuntimeSuccess => ensure!(
                self.spec.expected.stdout_file.is_some(),
                "Case {} is runtime_success but names no stdout_file",
                self.name
            ),
            CaseClass::CompileError | CaseClass::RuntimeError => ensure!(
                self.spec.expected.stderr_contains_file.is_some(),
                "Case {} expects an error but names no stderr_contains_file",
                self.name
            ),
        }
        Ok(())
    }

    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading fixture {relative_path} of case {}", self.name))
    }

    pub fn read_source(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading program for {}", self.name))
    }

    pub fn input_lines(&self) -> Result<Vec<String>> {
        let Some(input_file) = self.spec.input_file.as_deref() else {
            return Ok(Vec::new());
        };
        Ok(self
            .read_text(input_file)?
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// Loads every `<case>/case.yaml` directory under `programs_dir`,
/// validated and sorted by name.
pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let listing = fs::read_dir(programs_dir)
        .with_context(|| format!("Listing case directories in {}", programs_dir.display()))?;
    let mut case_dirs: Vec<PathBuf> = listing
        .flatten()
        .map(|entry| entry.path())
        .filter(|dir| dir.is_dir() && dir.join("case.yaml").is_file())
        .collect();
    ensure!(
        !case_dirs.is_empty(),
        "{} holds no case directories",
        programs_dir.display()
    );
    case_dirs.sort();
    case_dirs.into_iter().map(Case::load).collect()
}

/// Canonicalizes interpreter output for comparison: any line ending
/// becomes `\n`, per-line trailing whitespace and trailing blank lines
/// are dropped.
pub fn normalize_output(output: &str) -> String {
    let mut lines: Vec<&str> = output.lines().map(str::trim_end).collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

/// Matches an expected diagnostic against a `[line, column] <Message>`
/// stream. An expectation that itself starts with a `[line, column]`
/// prefix must match position and message; a bare expectation matches
/// the message of any line, whatever its position.
pub fn contains_diagnostic(stderr: &str, expected: &str) -> bool {
    let expected = expected.trim();
    if expected.starts_with('[') {
        return stderr.contains(expected);
    }
    stderr
        .lines()
        .any(|line| strip_position(line).contains(expected))
}

fn strip_position(line: &str) -> &str {
    let line = line.trim_start();
    if !line.starts_with('[') {
        return line;
    }
    match line.split_once(']') {
        Some((_, message)) => message.trim_start(),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_trailing_noise() {
        assert_eq!(normalize_output("a \r\nb\n\n\n"), "a\nb");
        assert_eq!(normalize_output(""), "");
    }

    #[test]
    fn positioned_expectation_requires_the_position() {
        let stderr = "[2, 7] Division by zero\n";
        assert!(contains_diagnostic(stderr, "[2, 7] Division by zero"));
        assert!(!contains_diagnostic(stderr, "[1, 1] Division by zero"));
    }

    #[test]
    fn bare_expectation_ignores_positions() {
        let stderr = "[14, 3] Call stack limit exceeded\n";
        assert!(contains_diagnostic(stderr, "Call stack limit exceeded"));
        assert!(!contains_diagnostic(stderr, "Invalid type"));
    }
}
