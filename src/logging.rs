//! Pretty-printing messages to the console

use colored::Colorize;

/// Pretty-print an error message to the console
pub fn error(message: &str) {
    let title = "error:".red().bold();
    eprintln!("{} {}", title, message);
}

/// Pretty-print a warning message tied to a source line to the console
pub fn warning(message: &str, line_number: usize) {
    let title = "warning:".yellow().bold();
    eprintln!("{} line {}: {}", title, line_number, message);
}
