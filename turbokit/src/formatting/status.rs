//! Status lines.

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy)]
enum Status {
    Success,
    Error,
    Warning,
}

impl Status {
    fn symbol(&self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Error => "✗",
            Status::Warning => "⚠",
        }
    }

    fn format(&self, message: &str) -> String {
        match self {
            Status::Success => format!("{} {}", self.symbol().green(), message.green().bold()),
            Status::Error => format!("{} {}", self.symbol().red(), message.red().bold()),
            Status::Warning => format!("{} {}", self.symbol().yellow(), message.yellow().bold()),
        }
    }
}

pub fn print_success(message: &str) {
    println!("  {}", Status::Success.format(message));
}

pub fn print_warning(message: &str) {
    println!("  {}", Status::Warning.format(message));
}

/// Prints a single-line error to stderr.
pub fn print_error(message: &str) {
    eprintln!("{}", Status::Error.format(message));
}
