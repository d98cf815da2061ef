use anyhow::anyhow;
use anyhow::Result;
use clap::Parser;
use colored::*;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

lazy_static! {
    static ref EXPECTED_OUTPUT_PATTERN: Regex = Regex::new(r"// expect: ?(.*)").unwrap();
    static ref EXPECTED_ERROR_PATTERN: Regex = Regex::new(r"// (Error.*)").unwrap();
    static ref EXPECTED_RUNTIME_ERROR_PATTERN: Regex =
        Regex::new(r"// expect runtime error: (.+)").unwrap();
    static ref SYNTAX_ERROR_PATTERN: Regex = Regex::new(r"\[line (\d+)\] (Error.+)").unwrap();
    static ref NON_TEST_PATTERN: Regex = Regex::new(r"// nontest").unwrap();
}

#[derive(Debug)]
struct ExpectedOutput {
    line: usize,
    output: String,
}

/// One `.lox` script annotated with the behavior it expects, encoded in
/// comments:
///
///   print 1 + 2; // expect: 3
///   print 1 / 0; // expect runtime error: Can not divide by zero.
///   var = 1;     // Error: Expect variable name.
#[derive(Debug)]
struct Test {
    test_file: PathBuf,
    expected_output: Vec<ExpectedOutput>,
    /// The set of expected compile error messages.
    expected_errors: Vec<String>,
    /// The expected runtime error message or `None` if there should not be one.
    expected_runtime_error: Option<ExpectedOutput>,
    expected_exit_code: i32,
}

impl Test {
    fn try_parse(test_input_path: &Path) -> Option<Self> {
        let mut test = Test {
            test_file: test_input_path.to_path_buf(),
            expected_output: vec![],
            expected_errors: vec![],
            expected_exit_code: 0,
            expected_runtime_error: None,
        };
        let file = File::open(test_input_path).ok()?;
        let lines: Vec<String> = io::BufReader::new(file)
            .lines()
            .filter_map(|l| l.ok())
            .collect();

        for (lineno, line) in lines.iter().enumerate() {
            if NON_TEST_PATTERN.is_match(line) {
                return None;
            }

            if let Some(eo) = EXPECTED_OUTPUT_PATTERN.captures(line) {
                test.expected_output.push(ExpectedOutput {
                    line: lineno + 1,
                    output: eo[1].to_string(),
                });
                continue;
            }

            if let Some(rte) = EXPECTED_RUNTIME_ERROR_PATTERN.captures(line) {
                test.expected_runtime_error = Some(ExpectedOutput {
                    line: lineno + 1,
                    output: rte[1].to_owned(),
                });
                // A runtime error should exit with EX_SOFTWARE.
                test.expected_exit_code = 70;
                continue;
            }

            if let Some(ee) = EXPECTED_ERROR_PATTERN.captures(line) {
                test.expected_errors.push(ee[1].to_string());
                // A compile error should exit with EX_DATAERR.
                test.expected_exit_code = 65;
            }
        }

        if !test.expected_errors.is_empty() && test.expected_runtime_error.is_some() {
            println!(
                "{} {} Cannot expect both compile and runtime errors.",
                "TEST ERROR".magenta(),
                test.test_file.display()
            );
            return None;
        }
        Some(test)
    }

    fn validate_exit_code(&self, exit_code: i32) -> Result<()> {
        if exit_code == self.expected_exit_code {
            Ok(())
        } else {
            Err(anyhow!(
                "Expected return code {} and got {}",
                self.expected_exit_code,
                exit_code
            ))
        }
    }

    fn validate_runtime_error(&self, std_err: &[String]) -> Result<()> {
        let expected = match &self.expected_runtime_error {
            Some(expected) => expected,
            None => return Ok(()),
        };

        if std_err.is_empty() {
            return Err(anyhow!(
                "Expected runtime error '{}' and got none.",
                expected.output
            ));
        }
        if std_err[0] != expected.output {
            return Err(anyhow!(
                "Expected runtime error '{}' and got:\n{}",
                expected.output,
                std_err[0]
            ));
        }
        Ok(())
    }

    fn validate_compile_errors(&self, std_err: &[String]) -> Result<()> {
        if self.expected_errors.is_empty() {
            return Ok(());
        }

        let reported: Vec<String> = std_err
            .iter()
            .filter_map(|line| SYNTAX_ERROR_PATTERN.captures(line))
            .map(|m| m[2].to_string())
            .collect();

        for expected in &self.expected_errors {
            if !reported.iter().any(|r| r == expected) {
                return Err(anyhow!("Missing expected error: {}", expected));
            }
        }
        for report in &reported {
            if !self.expected_errors.iter().any(|e| e == report) {
                return Err(anyhow!("Unexpected error: {}", report));
            }
        }
        Ok(())
    }

    fn validate_output(&self, std_out: &[String]) -> Result<()> {
        if std_out.len() != self.expected_output.len() {
            return Err(anyhow!(
                "Expected {} output lines and got {}:\n{:?}",
                self.expected_output.len(),
                std_out.len(),
                std_out
            ));
        }
        for (expected, actual) in self.expected_output.iter().zip_eq(std_out) {
            if &expected.output != actual {
                return Err(anyhow!(
                    "Expected output '{}' on line {} and got '{}'",
                    expected.output,
                    expected.line,
                    actual
                ));
            }
        }
        Ok(())
    }
}

fn run_test(test: &Test, prog: &str) -> Result<()> {
    let mut process = Command::new(prog)
        .arg(&test.test_file)
        .stderr(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;

    let exit_code = process.wait()?.code().unwrap_or(-1);

    let output_lines: Vec<String> = match process.stdout.take() {
        Some(out) => io::BufReader::new(out)
            .lines()
            .filter_map(|x| x.ok())
            .collect(),
        None => vec![],
    };
    let error_lines: Vec<String> = match process.stderr.take() {
        Some(err) => io::BufReader::new(err)
            .lines()
            .filter_map(|x| x.ok())
            .collect(),
        None => vec![],
    };

    test.validate_exit_code(exit_code)?;
    test.validate_runtime_error(&error_lines)?;
    test.validate_compile_errors(&error_lines)?;
    test.validate_output(&output_lines)?;

    Ok(())
}

fn collect_test_files(paths: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for path in paths {
        let path = PathBuf::from(path);
        if path.is_dir() {
            for entry in std::fs::read_dir(&path)? {
                let entry = entry?.path();
                if entry.extension().map(|e| e == "lox").unwrap_or(false) {
                    files.push(entry);
                }
            }
        } else {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Runs `.lox` test files against the interpreter binary and validates the
/// expectations embedded in their comments.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Test files or directories of .lox files
    #[clap(default_value = "test_lox_files")]
    paths: Vec<String>,

    /// Interpreter binary to exercise
    #[clap(long, default_value = "target/debug/interpreter")]
    interpreter: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let files = collect_test_files(&args.paths)?;

    let mut passed: u32 = 0;
    let mut failed: u32 = 0;
    let mut skipped: u32 = 0;

    for file in &files {
        let test = match Test::try_parse(file) {
            Some(test) => test,
            None => {
                skipped += 1;
                continue;
            }
        };
        match run_test(&test, &args.interpreter) {
            Ok(()) => {
                passed += 1;
                println!("{} {}", "PASS".green(), file.display());
            }
            Err(e) => {
                failed += 1;
                println!("{} {}", "FAIL".red(), file.display());
                println!("     {}", e.to_string().magenta());
            }
        }
    }

    println!(
        "Passed: {} Failed: {} Skipped: {}",
        passed.to_string().green(),
        failed.to_string().red(),
        skipped.to_string().yellow(),
    );

    if failed > 0 {
        return Err(anyhow!("{} test(s) failed", failed));
    }
    Ok(())
}
