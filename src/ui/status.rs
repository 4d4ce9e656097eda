//! Severity-colored status lines for operator output.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Progress,
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

/// Format one status line. Color is applied only when requested.
pub fn format_line(severity: Severity, msg: &str, color: bool) -> String {
    let (symbol, plain) = match severity {
        Severity::Info => ("\u{2192}", "[info]"),
        Severity::Success => ("\u{2713}", "[ ok ]"),
        Severity::Warning => ("!", "[warn]"),
        Severity::Error => ("\u{2717}", "[fail]"),
        Severity::Progress => ("\u{2026}", "[wait]"),
    };
    if !color {
        return format!("  {} {}", plain, msg);
    }
    let symbol = match severity {
        Severity::Info => symbol.cyan().to_string(),
        Severity::Success => symbol.green().to_string(),
        Severity::Warning => symbol.yellow().to_string(),
        Severity::Error => symbol.red().to_string(),
        Severity::Progress => symbol.dimmed().to_string(),
    };
    let msg = match severity {
        Severity::Error => msg.red().to_string(),
        Severity::Warning => msg.yellow().to_string(),
        Severity::Progress => msg.dimmed().to_string(),
        _ => msg.to_string(),
    };
    format!("  {} {}", symbol, msg)
}

pub fn info(msg: &str) {
    println!("{}", format_line(Severity::Info, msg, use_color()));
}

pub fn success(msg: &str) {
    println!("{}", format_line(Severity::Success, msg, use_color()));
}

pub fn warn(msg: &str) {
    println!("{}", format_line(Severity::Warning, msg, use_color()));
}

pub fn error(msg: &str) {
    eprintln!(
        "{}",
        format_line(Severity::Error, msg, std::io::stderr().is_terminal())
    );
}

pub fn progress(msg: &str) {
    println!("{}", format_line(Severity::Progress, msg, use_color()));
}

/// Bold section header, e.g. before a table.
pub fn header(title: &str) {
    println!();
    if use_color() {
        println!("  {}", title.bold());
    } else {
        println!("  {}", title);
    }
}
