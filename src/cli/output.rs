//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Agora CLI.

use crate::types::{AgentWarning, WarningKind};
use owo_colors::OwoColorize;

const COLUMN_WIDTH: usize = 14;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Agora banner
    pub fn banner(&self) {
        let art = [
            "   _   ___  ___  ___    _   ",
            "  /_\\ / __|/ _ \\| _ \\  /_\\  ",
            " / _ \\ (_ | (_) |   / / _ \\ ",
            "/_/ \\_\\___|\\___/|_|_\\/_/ \\_\\",
        ];
        if self.colored {
            println!();
            for (i, line) in art.iter().enumerate() {
                if i < 2 {
                    println!("   {}", line.bright_cyan().bold());
                } else {
                    println!("   {}", line.blue().bold());
                }
            }
            println!(
                "\n   {} {}\n",
                "Multi-agent research orchestration".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!();
            for line in art {
                println!("   {}", line);
            }
            println!(
                "\n   Multi-agent research orchestration v{}\n",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print every per-agent warning of an operation
    pub fn agent_warnings(&self, warnings: &[AgentWarning]) {
        for warning in warnings {
            let tag = match warning.kind {
                WarningKind::SkippedContribution => "skipped",
                WarningKind::SkippedRating => "no rating",
                WarningKind::RetrievalFailed => "retrieval",
                WarningKind::ImprovementRejected => "unchanged",
            };
            if self.colored {
                println!(
                    "  {} {} {} {}",
                    "⚠".yellow().bold(),
                    warning.agent_id.to_string().bright_white(),
                    format!("({})", tag).dimmed(),
                    warning.message.yellow()
                );
            } else {
                println!("  [WARN] {} ({}) {}", warning.agent_id, tag, warning.message);
            }
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a satisfaction rating as a ten-cell bar
    pub fn rating(&self, agent: &str, value: u8) {
        let filled = usize::from(value.min(10));
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled));
        if self.colored {
            let bar = if value >= 8 {
                bar.green().to_string()
            } else if value >= 5 {
                bar.yellow().to_string()
            } else {
                bar.red().to_string()
            };
            println!("    {:<width$} {} {}", agent, bar, value, width = COLUMN_WIDTH);
        } else {
            println!("    {:<width$} {} {}", agent, bar, value, width = COLUMN_WIDTH);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header = pad_columns(columns);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * (COLUMN_WIDTH + 1)).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * (COLUMN_WIDTH + 1)));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        println!("    {}", pad_columns(values));
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

fn pad_columns(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("{:<width$}", v, width = COLUMN_WIDTH))
        .collect::<Vec<_>>()
        .join(" ")
}
