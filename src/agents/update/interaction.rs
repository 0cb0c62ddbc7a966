use crate::error::Result;
use crate::output::Console;
use colored::Colorize;
use std::io::{self, BufRead};

/// Yes/no confirmations for the release steps.
///
/// With `--confirm` every question is answered yes without prompting.
pub struct UpdateInteraction {
    auto_confirm: bool,
}

impl UpdateInteraction {
    pub fn new(auto_confirm: bool) -> Self {
        Self { auto_confirm }
    }

    pub fn confirm(&self, console: &Console, question: &str) -> Result<bool> {
        let stdin = io::stdin();
        self.confirm_from(console, question, &mut stdin.lock())
    }

    fn confirm_from(&self, console: &Console, question: &str, input: &mut impl BufRead) -> Result<bool> {
        if self.auto_confirm {
            return Ok(true);
        }

        loop {
            console.prompt(format!("{} {}", question.bold(), "[Y/n]: ".bold()));

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                console.blank();
                console.warn("No answer received, treating as 'no'.");
                return Ok(false);
            }

            match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => console.error("Please answer with y(es) or n(o)."),
            }
        }
    }
}
