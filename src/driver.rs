use std::io::Write;

use crate::config::Config;
use crate::diagnostics::{Diagnostic, Fault};
use crate::interpreter::{Interpreter, Io};
use crate::lexer;
use crate::parser;
use crate::printer;
use crate::typecheck;

/// How far the pipeline runs before stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Emit tokens, then stop.
    Lex,
    /// Emit the parse tree as canonical source, then stop.
    Parse,
    /// Run the type checker, then stop.
    TypeCheck,
    /// Full execution.
    Execute,
}

/// Terminal state of a pipeline run. Any diagnostic or fault maps to a
/// non-zero exit status.
#[derive(Debug)]
pub enum Outcome {
    Success,
    Diagnostics(Vec<Diagnostic>),
    Fault(Fault),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Diagnostics(_) | Outcome::Fault(_) => 1,
        }
    }

    /// Writes diagnostics one per line, in source order.
    pub fn report(&self, out: &mut dyn Write) {
        match self {
            Outcome::Success => {}
            Outcome::Diagnostics(diagnostics) => {
                for diagnostic in diagnostics {
                    let _ = writeln!(out, "{diagnostic}");
                }
            }
            Outcome::Fault(fault) => {
                let _ = writeln!(out, "{fault}");
            }
        }
    }
}

/// Runs the pipeline over `source`, honoring the requested stop point.
/// Each stage's diagnostics prevent the next stage from running.
pub fn run_source(source: &str, config: &Config, mode: RunMode, mut io: Io) -> Outcome {
    let (tokens, lex_diagnostics) = lexer::tokenize(source, config);
    if mode == RunMode::Lex {
        for token in &tokens {
            io.write_line(&format!("{} {:?}", token.position, token.kind));
        }
        return finish(lex_diagnostics);
    }
    if !lex_diagnostics.is_empty() {
        return Outcome::Diagnostics(lex_diagnostics);
    }

    let (program, parse_diagnostics) = parser::parse_tokens(tokens);
    if mode == RunMode::Parse {
        if parse_diagnostics.is_empty() {
            io.write_line(printer::print_program(&program).trim_end());
        }
        return finish(parse_diagnostics);
    }
    if !parse_diagnostics.is_empty() {
        return Outcome::Diagnostics(parse_diagnostics);
    }

    let check_diagnostics = typecheck::check_program(&program);
    if !check_diagnostics.is_empty() {
        return Outcome::Diagnostics(check_diagnostics);
    }
    if mode == RunMode::TypeCheck {
        return Outcome::Success;
    }

    let mut interpreter = Interpreter::with_io(config.clone(), io);
    match interpreter.run(&program) {
        Ok(()) => Outcome::Success,
        Err(fault) => Outcome::Fault(fault),
    }
}

fn finish(diagnostics: Vec<Diagnostic>) -> Outcome {
    if diagnostics.is_empty() {
        Outcome::Success
    } else {
        Outcome::Diagnostics(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::Io;

    fn run_captured(source: &str, mode: RunMode) -> (Outcome, String) {
        let (io, capture) = Io::capture(Vec::new());
        let outcome = run_source(source, &Config::default(), mode, io);
        (outcome, capture.text())
    }

    #[test]
    fn executes_by_default() {
        let (outcome, output) = run_captured(r#"print("hi");"#, RunMode::Execute);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(output, "hi\n");
    }

    #[test]
    fn lex_mode_emits_tokens_and_stops() {
        let (outcome, output) = run_captured("int x = 1;", RunMode::Lex);
        assert_eq!(outcome.exit_code(), 0);
        assert!(output.contains("IntKw"));
        assert!(output.contains("Int(1)"));
    }

    #[test]
    fn lex_mode_still_reports_diagnostics() {
        let (outcome, _) = run_captured("int x = 34a7;", RunMode::Lex);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn parse_mode_prints_canonical_source() {
        let (outcome, output) = run_captured("int   x=1;", RunMode::Parse);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(output, "int x = 1;\n");
    }

    #[test]
    fn lexer_diagnostics_skip_parsing() {
        let (outcome, _) = run_captured("int x = 34a7;", RunMode::Execute);
        let Outcome::Diagnostics(diagnostics) = outcome else {
            panic!("expected diagnostics");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].to_string(), "[1, 9] Invalid value");
    }

    #[test]
    fn type_errors_skip_the_interpreter() {
        let (outcome, output) = run_captured(r#"int x = "abc"; print("side");"#, RunMode::Execute);
        assert_eq!(outcome.exit_code(), 1);
        // The interpreter never ran.
        assert_eq!(output, "");
        let Outcome::Diagnostics(diagnostics) = outcome else {
            panic!("expected diagnostics");
        };
        assert_eq!(diagnostics[0].to_string(), "[1, 9] Invalid type");
    }

    #[test]
    fn type_check_mode_stops_before_execution() {
        let (outcome, output) = run_captured(r#"print("hi");"#, RunMode::TypeCheck);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(output, "");
    }

    #[test]
    fn runtime_fault_reports_position_and_kind() {
        let (outcome, _) = run_captured("int x = 10 / 0;", RunMode::Execute);
        let Outcome::Fault(fault) = outcome else {
            panic!("expected fault");
        };
        assert_eq!(fault.to_string(), "[1, 9] Division by zero");
    }
}
