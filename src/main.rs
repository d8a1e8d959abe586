use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use aud::config::Config;
use aud::driver::{self, RunMode};
use aud::interpreter::Io;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let mut config_path: Option<String> = None;
    let mut file: Option<String> = None;
    let mut inline: Option<String> = None;
    let mut mode = RunMode::Execute;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                config_path = Some(
                    args.next()
                        .with_context(|| format!("Missing path after {arg}"))?,
                );
            }
            "-f" | "--file" => {
                file = Some(
                    args.next()
                        .with_context(|| format!("Missing path after {arg}"))?,
                );
            }
            "-s" | "--string" => {
                inline = Some(
                    args.next()
                        .with_context(|| format!("Missing code after {arg}"))?,
                );
            }
            "-l" | "--lex" => set_mode(&mut mode, RunMode::Lex)?,
            "-p" | "--parse" => set_mode(&mut mode, RunMode::Parse)?,
            "-t" | "--type-check" => set_mode(&mut mode, RunMode::TypeCheck)?,
            other => bail!("Unknown argument '{other}'"),
        }
    }

    let source = match (file, inline) {
        (Some(path), None) => fs::read_to_string(&path)
            .with_context(|| format!("Reading source file {path}"))?,
        (None, Some(code)) => code,
        (None, None) => bail!("Provide a source with --file or --string"),
        (Some(_), Some(_)) => bail!("--file and --string are mutually exclusive"),
    };

    let config = match config_path {
        Some(path) => Config::from_json_file(Path::new(&path))?,
        None => Config::default(),
    };

    let outcome = driver::run_source(&source, &config, mode, Io::stdio());
    outcome.report(&mut std::io::stderr());
    let _ = std::io::stdout().flush();

    if outcome.exit_code() == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn set_mode(mode: &mut RunMode, requested: RunMode) -> Result<()> {
    if *mode != RunMode::Execute {
        bail!("Run modes are mutually exclusive");
    }
    *mode = requested;
    Ok(())
}
