//! Colored status messages for the terminal
//!
//! Everything goes to stderr: stdout is reserved for `--remote-expr` output.

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

fn print_tagged(color: Color, tag: &str, msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(color),
        Print(tag),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    print_tagged(Color::Red, "✗ ", msg);
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    print_tagged(Color::Yellow, "⚠ ", msg);
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    print_tagged(Color::Cyan, "ℹ ", msg);
}
