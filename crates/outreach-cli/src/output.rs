//! Output formatting

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Print `data` as-is for json/yaml, or `rows` as a table
    pub fn print<T: Serialize, R: Tabled>(&self, data: &T, rows: &[R]) {
        if self.emit(data) {
            return;
        }
        if rows.is_empty() {
            println!("{}", "(none)".dimmed());
        } else {
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }

    /// Print structured output; returns false for the table format
    pub fn emit<T: Serialize>(&self, data: &T) -> bool {
        match self {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                true
            }
            OutputFormat::Yaml => {
                println!("{}", serde_yaml::to_string(data).unwrap_or_default());
                true
            }
            OutputFormat::Table => false,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, OutputFormat::Table)
    }
}

pub fn success(message: impl AsRef<str>) {
    println!("{} {}", "✓".green(), message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.as_ref());
}
