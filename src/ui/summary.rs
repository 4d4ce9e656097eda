use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::health::{healthy_count, HealthStatus};
use crate::orchestrator::{RunState, ServiceStatus, StartOutcome, StartReport};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).set_alignment(CellAlignment::Left))
            .collect::<Vec<_>>(),
    );
    table
}

fn dot(label: &str, good: Option<bool>, color: bool) -> String {
    if !color {
        return format!("\u{25cf} {}", label);
    }
    match good {
        Some(true) => format!("{} {}", "\u{25cf}".green(), label.green()),
        Some(false) => format!("{} {}", "\u{25cf}".red(), label.red()),
        None => format!("{} {}", "\u{25cf}".yellow(), label.yellow()),
    }
}

// Indent the table by 2 spaces
fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("  {}", line);
    }
}

pub fn status_table(statuses: &[ServiceStatus], color: bool) -> Table {
    let mut table = new_table(&["Service", "Kind", "Handle", "Port", "Status"]);
    for s in statuses {
        let handle = match (&s.pid, &s.container) {
            (Some(pid), _) => format!("pid {}", pid),
            (None, Some(container)) => container.clone(),
            (None, None) => "-".to_string(),
        };
        let port = s
            .port
            .map(|p| format!("localhost:{}", p))
            .unwrap_or_else(|| "-".to_string());
        let good = match s.state {
            RunState::Running => Some(true),
            RunState::Stopped => Some(false),
            RunState::Unknown(_) => None,
        };
        table.add_row(vec![
            Cell::new(&s.name),
            Cell::new(s.kind.to_string()),
            Cell::new(handle),
            Cell::new(port),
            Cell::new(dot(&s.state.to_string(), good, color)),
        ]);
    }
    table
}

pub fn print_status(project: &str, statuses: &[ServiceStatus]) {
    let color = std::io::stdout().is_terminal();
    println!();
    if color {
        println!("  {} {}", "stackctl".bold(), project.cyan());
    } else {
        println!("  stackctl {}", project);
    }
    println!();
    print_indented(&status_table(statuses, color));
    println!();
}

pub fn health_table(report: &[HealthStatus], color: bool) -> Table {
    let mut table = new_table(&["Service", "Health", "Checked", "Detail"]);
    for h in report {
        let label = if h.healthy { "healthy" } else { "unhealthy" };
        table.add_row(vec![
            Cell::new(&h.service),
            Cell::new(dot(label, Some(h.healthy), color)),
            Cell::new(h.checked_at.format("%H:%M:%S").to_string()),
            Cell::new(&h.detail),
        ]);
    }
    table
}

/// `k/N healthy`
pub fn health_line(report: &[HealthStatus]) -> String {
    format!("{}/{} healthy", healthy_count(report), report.len())
}

pub fn print_health(report: &[HealthStatus]) {
    let color = std::io::stdout().is_terminal();
    println!();
    print_indented(&health_table(report, color));
    println!();
    let line = health_line(report);
    let all = healthy_count(report) == report.len();
    if color {
        if all {
            println!("  {}", line.green().bold());
        } else {
            println!("  {}", line.yellow().bold());
        }
    } else {
        println!("  {}", line);
    }
    println!();
}

/// Post-start summary: what happened to each service.
pub fn print_start_report(report: &StartReport) {
    let color = std::io::stdout().is_terminal();
    let mut table = new_table(&["Service", "Result"]);
    for (name, outcome) in &report.outcomes {
        let cell = match outcome {
            StartOutcome::Started => dot("started", Some(true), color),
            StartOutcome::AlreadyRunning(_) => dot("already running", Some(true), color),
            StartOutcome::Skipped => dot("skipped", None, color),
            StartOutcome::Failed(_) => dot("failed", Some(false), color),
        };
        table.add_row(vec![Cell::new(name), Cell::new(cell)]);
    }
    println!();
    print_indented(&table);
    println!();
}
