//! Interactive `[y/N]` confirmation.

use colored::Colorize;
use fleet_core::Confirm;
use std::io::{self, Write};

/// Prompts on stdout and reads the answer from stdin.
pub struct StdinConfirm {
    assume_yes: bool,
}

impl StdinConfirm {
    /// With `assume_yes` every prompt is answered yes without asking.
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        print!("{} {} [y/N]: ", "⚠".yellow().bold(), prompt);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(_) => is_yes(&input),
            Err(_) => false,
        }
    }
}

fn is_yes(input: &str) -> bool {
    let answer = input.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
