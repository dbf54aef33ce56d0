//! Display formatting for CLI output
//!
//! Provides structured display for sync passes: one line per created,
//! updated, or deleted object and a per-kind summary line.

#![allow(dead_code)]

use console::style;
use skiff_kube::SyncSummary;
use std::io::{self, Write};

/// Renderer for sync pass output
pub struct SyncRenderer {
    writer: Box<dyn Write>,
}

impl Default for SyncRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncRenderer {
    /// Create a new renderer that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: Box::new(io::stdout()),
        }
    }

    /// Create a renderer that writes to a custom writer (for testing)
    pub fn with_writer<W: Write + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Render one sync pass: per-object lines, then the summary
    pub fn render_pass(&mut self, kind: &str, summary: &SyncSummary) -> io::Result<()> {
        for name in &summary.created {
            writeln!(self.writer, "  {} {}", style("+").green(), name)?;
        }
        for name in &summary.updated {
            writeln!(self.writer, "  {} {}", style("~").yellow(), name)?;
        }
        for name in &summary.deleted {
            writeln!(self.writer, "  {} {}", style("-").red(), name)?;
        }

        if summary.is_empty() {
            writeln!(
                self.writer,
                "{} {}: nothing to do",
                style("✓").green(),
                style(kind).bold()
            )?;
        } else {
            writeln!(
                self.writer,
                "{} {}: {}",
                style("✓").green().bold(),
                style(kind).bold(),
                summary
            )?;
        }

        Ok(())
    }

    /// Render the closing line of a sync run
    pub fn render_footer(&mut self, total: usize) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} sync complete: {}",
            style("✓").green().bold(),
            pluralize(total, "change", "changes")
        )
    }
}

/// Format count with proper pluralization
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
