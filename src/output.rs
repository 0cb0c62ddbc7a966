use colored::Colorize;
use std::cell::RefCell;
use std::fmt::Display;
use std::io::{self, Write};

/// Output sink threaded through every workflow.
///
/// Status lines go to `status`; machine-readable results (JSON, `--short`)
/// go to `output`. In machine mode status is routed to stderr so stdout
/// carries only the result.
pub struct Console {
    status: RefCell<Box<dyn Write>>,
    output: RefCell<Box<dyn Write>>,
    machine: bool,
}

impl Console {
    /// Human mode: everything on stdout.
    pub fn human() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stdout()), false)
    }

    /// Machine mode: status on stderr, results on stdout.
    pub fn machine() -> Self {
        Self::with_writers(Box::new(io::stderr()), Box::new(io::stdout()), true)
    }

    pub fn with_writers(status: Box<dyn Write>, output: Box<dyn Write>, machine: bool) -> Self {
        Self {
            status: RefCell::new(status),
            output: RefCell::new(output),
            machine,
        }
    }

    pub fn is_machine(&self) -> bool {
        self.machine
    }

    pub fn line(&self, message: impl Display) {
        let mut status = self.status.borrow_mut();
        let _ = writeln!(status, "{message}");
    }

    pub fn blank(&self) {
        self.line("");
    }

    /// Writes a prompt without a newline and flushes it.
    pub fn prompt(&self, message: impl Display) {
        let mut status = self.status.borrow_mut();
        let _ = write!(status, "{message}");
        let _ = status.flush();
    }

    pub fn warn(&self, message: impl Display) {
        self.line(format!("{}", message.to_string().yellow()));
    }

    pub fn error(&self, message: impl Display) {
        self.line(format!("{}", message.to_string().red()));
    }

    /// Machine result, always on the output stream.
    pub fn emit(&self, message: impl Display) {
        let mut output = self.output.borrow_mut();
        let _ = writeln!(output, "{message}");
        let _ = output.flush();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::capture;

    #[test]
    fn status_and_results_are_separated() {
        let (console, status, output) = capture(true);
        console.line("Checking versions...");
        console.emit("1.2.3");
        assert_eq!(status.contents(), "Checking versions...\n");
        assert_eq!(output.contents(), "1.2.3\n");
        assert!(console.is_machine());
    }
}
