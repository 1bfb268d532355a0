use std::fmt::Write as _;
use std::io;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use colored::*;
use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::UIConfig;
use crate::event_bus::Metrics;
use crate::recommender::Recommendation;
use crate::task_store::{MergeReport, PriorityLevel, TaskRecord};

pub const INFO_BANNER: &str =
    "List will be ranked with AI recommendation. Type `help` to see every command.";

const HEADERS: [&str; 5] = ["#", "Task", "Created", "Deadline", "Priority"];

/// Terminal front end: table, banners and spinners
pub struct TerminalUI {
    colorful: bool,
    spinner: bool,
    date_format: String,
}

impl TerminalUI {
    pub fn new(config: &UIConfig) -> Self {
        if !config.colorful {
            colored::control::set_override(false);
        }
        Self {
            colorful: config.colorful,
            spinner: config.spinner,
            date_format: config.date_format.clone(),
        }
    }

    pub fn start(&self, greeting: &str) -> Result<()> {
        if self.colorful {
            execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))?;
        }
        println!("{}", "=".repeat(80).bright_blue());
        println!("{}", greeting.bright_white().bold());
        println!("{}", "=".repeat(80).bright_blue());
        println!("{}", "Priority recommendations from AI".cyan());
        println!();
        Ok(())
    }

    pub fn info_banner(&self) {
        println!("{} {}", "ℹ".bright_blue(), INFO_BANNER.bright_blue());
    }

    /// Spinner shown while a model call is in flight.
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.spinner {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green(), message.green());
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", "!".yellow(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        println!("{} {}", "✗".red(), message.red());
    }

    pub fn table(&self, records: &[TaskRecord]) {
        if records.is_empty() {
            println!("{}", "No tasks yet. Type a task description to add one.".dimmed());
            return;
        }
        print!("{}", format_table(records, &self.date_format));
    }

    pub fn recommendation(&self, recommendation: &Recommendation) {
        println!("{}", "Recommendation".bright_white().bold());
        if recommendation.items.is_empty() {
            println!("  {}", recommendation.raw.dimmed());
            return;
        }
        for item in &recommendation.items {
            println!(
                "  {} {}: {}",
                paint_priority(Some(item.priority), &format!("[{}]", item.priority)),
                item.task.bold(),
                item.explanation
            );
        }
    }

    pub fn merge_report(&self, report: &MergeReport) {
        self.success(&format!("Updated {} task priorities", report.updated.len()));
        if !report.unmatched.is_empty() {
            self.warning(&format!(
                "No task matched: {}",
                report.unmatched.join(", ")
            ));
        }
    }

    pub fn status(&self, task_count: usize, metrics: &Metrics) {
        println!(
            "{}",
            format!(
                "{} tasks | {} added, {} rejected | {} rankings ({} failed) | {} API calls ({} failed) | {} tokens | ${:.4}",
                task_count,
                metrics.tasks_added,
                metrics.tasks_rejected,
                metrics.recommendations,
                metrics.failed_recommendations,
                metrics.total_api_calls,
                metrics.failed_api_calls,
                metrics.total_tokens,
                metrics.total_cost
            )
            .dimmed()
        );
    }

    pub fn help(&self) {
        println!("{}", "Commands".bright_white().bold());
        println!("  <text> | add <text>   add a task from a free-text description");
        println!("  rec | recommend       rank the list with AI recommendations");
        println!("  list                  show the list");
        println!("  why                   show the last recommendation's explanations");
        println!("  dismiss               hide the info banner");
        println!("  help                  show this help");
        println!("  quit | exit           leave (the list is not saved)");
    }
}

fn paint_priority(priority: Option<PriorityLevel>, text: &str) -> ColoredString {
    match priority {
        Some(PriorityLevel::High) => text.red().bold(),
        Some(PriorityLevel::Medium) => text.yellow(),
        Some(PriorityLevel::Low) => text.green(),
        None => text.normal(),
    }
}

/// Falls back to ISO format when `date_format` is not a valid chrono pattern.
fn format_date(date: NaiveDate, date_format: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", date.format(date_format)) {
        Ok(()) => out,
        Err(_) => date.to_string(),
    }
}

/// Plain-text grid of the task list; priority cells are colored.
pub fn format_table(records: &[TaskRecord], date_format: &str) -> String {
    let rows: Vec<[String; 5]> = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            [
                (i + 1).to_string(),
                r.task.clone(),
                format_date(r.created, date_format),
                r.deadline.clone().unwrap_or_else(|| crate::extractor::NO_DEADLINE.to_string()),
                r.priority.map(|p| p.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| format!("{:<w$}", h, w = *w))
        .collect();
    out.push_str(&header.join("  ").bold().to_string());
    out.push('\n');

    for (row, record) in rows.iter().zip(records) {
        let cells: Vec<String> = row
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(col, (cell, w))| {
                let padded = format!("{:<w$}", cell, w = *w);
                if col == 4 {
                    paint_priority(record.priority, &padded).to_string()
                } else {
                    padded
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}
