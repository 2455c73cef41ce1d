//! Ember command line front end: `ember run <file>` and `ember repl`.
//!
//! Diagnostics are printed (and cleared) between pipeline stages; they do not
//! affect the exit code. Non-zero exits are reserved for argument and file
//! errors.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ember_diagnostics::Diagnostics;
use ember_interpreter::{meta, Flow, Interpreter, Scope};
use ember_parser::parse_source;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match args.as_slice() {
        [] => run_repl(),
        [command] if command == "repl" => run_repl(),
        [command, file] if command == "run" => run_file(Path::new(file)),
        _ => {
            eprintln!("usage: ember run <file>\n       ember repl");
            2
        }
    };
    std::process::exit(code);
}

fn run_file(path: &Path) -> i32 {
    match try_run_file(path) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("{:#}", error);
            1
        }
    }
}

fn try_run_file(path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if format!(".{}", extension) != meta::FILE_EXTENSION {
        bail!(
            "The file extension of '{}' should be '{}'",
            path.display(),
            meta::FILE_EXTENSION
        );
    }
    let source =
        std::fs::read(path).with_context(|| format!("Couldn't read '{}'", path.display()))?;

    let diags = Diagnostics::new();
    let program = parse_source(&source, &diags);
    if print_errors(&diags) {
        return Ok(());
    }

    let mut interpreter = Interpreter::new(diags.clone());
    let scope = Scope::new();
    interpreter.eval(&program, &scope);
    print_errors(&diags);
    Ok(())
}

fn run_repl() -> i32 {
    println!("{}", meta::name_version_environment());
    println!("Use CTRL+C or quit() to exit.");

    let diags = Diagnostics::new();
    let scope = Scope::new();
    let stdin = io::stdin();

    loop {
        print!("{}", meta::REPL_SIGNAL);
        if io::stdout().flush().is_err() {
            return 1;
        }
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => {
                // EOF
                println!();
                break;
            }
            Ok(_) => {}
            Err(_) => return 1,
        }
        if line.trim().is_empty() {
            continue;
        }
        let program = parse_source(line.as_bytes(), &diags);
        if print_errors(&diags) {
            continue;
        }
        // only the scope persists between lines; each line gets a fresh
        // interpreter
        let mut interpreter = Interpreter::new(diags.clone());
        let flow = interpreter.eval(&program, &scope);
        if print_errors(&diags) {
            continue;
        }
        match flow {
            Flow::Value(value) | Flow::Return(value) => println!("{}", value.check()),
            _ => {}
        }
    }
    0
}

/// Print and clear pending diagnostics; true when there were any.
fn print_errors(diags: &Diagnostics) -> bool {
    if !diags.has_errors() {
        return false;
    }
    eprintln!("Found Errors:");
    for diagnostic in diags.take() {
        eprintln!("{}", diagnostic);
    }
    true
}
