//! Yes/no confirmation prompt.
//!
//! Prompts block and must run on the foreground thread; the scheduler
//! never calls them directly.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crate::error::{Error, Result};

pub trait ConfirmationPrompt {
    fn ask_yes_no(&self, title: &str, message: &str) -> Result<bool>;
}

/// Interactive prompt on the controlling terminal.
///
/// Unrecognized answers re-ask; end of input counts as "no".
pub struct TerminalPrompt<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl TerminalPrompt<io::BufReader<io::Stdin>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }
}

impl<R: BufRead, W: Write> ConfirmationPrompt for TerminalPrompt<R, W> {
    fn ask_yes_no(&self, title: &str, message: &str) -> Result<bool> {
        let mut input = self.input.lock().map_err(|_| prompt_poisoned())?;
        let mut output = self.output.lock().map_err(|_| prompt_poisoned())?;

        writeln!(output, "\n== {title} ==")?;
        writeln!(output, "{message}")?;
        loop {
            write!(output, "[y/n] ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                return Ok(false);
            }
            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => writeln!(output, "please answer y or n")?,
            }
        }
    }
}

fn prompt_poisoned() -> Error {
    Error::Prompt("prompt lock poisoned".to_string())
}

/// `y`/`yes` or `n`/`no`, case-insensitive
pub fn parse_answer(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Prompt that always gives the same answer (`run --assume`)
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl ConfirmationPrompt for FixedAnswer {
    fn ask_yes_no(&self, _title: &str, _message: &str) -> Result<bool> {
        Ok(self.0)
    }
}
