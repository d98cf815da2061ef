use anyhow::Result;
use clap::Parser;
use colored::*;
use lib::lox::{Lox, LoxOptions, LoxParseError, LoxResolveError, LoxRuntimeError, LoxScanError};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::fs;

/// Tree-walking interpreter for the Lox scripting language
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Script to run; starts a REPL when omitted
    #[clap()]
    script: Vec<String>,

    /// Pretty-print the parsed statement list before executing it
    #[clap(short, long)]
    debug_ast: bool,
}

fn run_file(script_path: &str, debug_ast: bool) -> Result<()> {
    let mut lox = Lox::new(LoxOptions { debug_ast });
    let data = fs::read_to_string(script_path)?;
    lox.run(data)
}

fn run_prompt(debug_ast: bool) -> Result<()> {
    let mut lox = Lox::new(LoxOptions { debug_ast });
    let mut rl = Editor::<()>::new()?;

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                // Diagnostics were already printed; a bad line must not end
                // the session.
                let _ = lox.run(line);
                lox.reset_errors();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {}", "error:".red(), err);
                break;
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let rv = match args.script.as_slice() {
        [] => run_prompt(args.debug_ast),
        [script] => run_file(script, args.debug_ast),
        _ => {
            eprintln!("Usage: interpreter [script]");
            ::std::process::exit(64);
        }
    };

    if let Err(e) = &rv {
        if e.downcast_ref::<LoxScanError>().is_some()
            || e.downcast_ref::<LoxParseError>().is_some()
            || e.downcast_ref::<LoxResolveError>().is_some()
        {
            ::std::process::exit(65);
        } else if e.downcast_ref::<LoxRuntimeError>().is_some() {
            ::std::process::exit(70);
        }
    }
    rv
}
