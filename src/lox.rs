use crate::interpreter::Interpreter;
use crate::lox_error::LoxError;
use crate::parser;
use crate::resolver::Resolver;
use crate::scanner;
use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use derive_more::Display;

pub use crate::interpreter::LoxRuntimeError;

/// Marker contexts attached to the phase that failed so the entry point can
/// map them onto exit codes.
#[derive(Debug, Display)]
#[display(fmt = "scan failed")]
pub struct LoxScanError {}
#[derive(Debug, Display)]
#[display(fmt = "parse failed")]
pub struct LoxParseError {}
#[derive(Debug, Display)]
#[display(fmt = "resolve failed")]
pub struct LoxResolveError {}

#[derive(Parser, Debug)]
pub struct LoxOptions {
    /// Pretty-print the parsed statement list before executing it
    #[clap(short, long)]
    pub debug_ast: bool,
}

/// Owns the pipeline state that survives across runs: the interpreter (and
/// with it the global environment plus accumulated resolutions) and the
/// error flags the embedding checks after each run.
pub struct Lox {
    pub has_error: bool,
    pub has_runtime_error: bool,
    interpreter: Interpreter,
    opts: LoxOptions,
}

impl Lox {
    pub fn new(opts: LoxOptions) -> Lox {
        Lox {
            has_error: false,
            has_runtime_error: false,
            interpreter: Interpreter::new(),
            opts,
        }
    }

    /// Runs one source string through scan, parse, resolve, interpret. Each
    /// phase only starts if the previous ones left the reporter clean.
    pub fn run(&mut self, source: String) -> Result<()> {
        let tokens = scanner::scan_tokens(self, &source);
        if self.has_error {
            return Err(anyhow!("failed to scan")).context(LoxScanError {});
        }

        let mut tok = tokens.iter().peekable();
        let statements = {
            let mut parser = parser::Parser::new(&mut tok, self);
            parser.parse()
        };
        if self.opts.debug_ast {
            println!("AST: {:#?}", statements);
        }
        if self.has_error {
            return Err(anyhow!("failed to parse")).context(LoxParseError {});
        }

        let locals = {
            let resolver = Resolver::new(self);
            resolver.resolve(&statements)
        };
        if self.has_error {
            return Err(anyhow!("failed to resolve")).context(LoxResolveError {});
        }

        self.interpreter.resolve(locals);
        if let Err(e) = self.interpreter.interpret(&statements) {
            self.runtime_error(&e);
            return Err(anyhow!("runtime failure")).context(e);
        }

        Ok(())
    }

    /// Clears per-run error state so a REPL session survives bad entries.
    pub fn reset_errors(&mut self) {
        self.has_error = false;
        self.has_runtime_error = false;
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new(LoxOptions { debug_ast: false })
    }
}

impl LoxError for Lox {
    fn error(&mut self, line: i32, message: &str) {
        self.report(line, "", message);
    }

    fn report(&mut self, line: i32, wh: &str, message: &str) {
        eprintln!("[line {line}] Error{wh}: {message}");
        self.has_error = true;
    }

    fn runtime_error(&mut self, error: &LoxRuntimeError) {
        eprintln!("{}", error);
        self.has_runtime_error = true;
    }

    fn has_error(&self) -> bool {
        self.has_error
    }

    fn has_runtime_error(&self) -> bool {
        self.has_runtime_error
    }
}
