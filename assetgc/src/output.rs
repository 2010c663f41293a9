//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use assetgc_core::{ContentId, ContentItem, ContentKind, RunState, RunSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error chain directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub root_folder: ContentId,
}

/// Output for `mkdir` and `add` commands.
#[derive(Debug, Serialize)]
pub struct CreatedOutput {
    pub success: bool,
    pub result_code: u8,
    pub id: ContentId,
    pub kind: ContentKind,
    pub parent: ContentId,
    pub name: String,
}

/// Output for `ref` command.
#[derive(Debug, Serialize)]
pub struct RefOutput {
    pub success: bool,
    pub result_code: u8,
    pub from: ContentId,
    pub to: ContentId,
}

/// Child information for `ls` command.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub id: ContentId,
    pub kind: ContentKind,
    pub name: String,
    pub created: DateTime<Utc>,
    pub references: usize,
}

impl EntryInfo {
    pub fn new(item: ContentItem, references: usize) -> Self {
        Self {
            id: item.id,
            kind: item.kind,
            name: item.name,
            created: item.created,
            references,
        }
    }
}

/// Output for `ls` command.
#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub success: bool,
    pub result_code: u8,
    pub folder: ContentId,
    pub entries: Vec<EntryInfo>,
}

/// Output for `gc` command.
#[derive(Debug, Serialize)]
pub struct GcOutput {
    pub success: bool,
    pub result_code: u8,
    pub total: usize,
    pub deleted: usize,
    pub blobs_deleted: usize,
    pub orphaned_blobs: usize,
    pub flushes: usize,
    pub state: RunState,
    pub message: String,
}

impl From<RunSummary> for GcOutput {
    fn from(summary: RunSummary) -> Self {
        Self {
            success: true,
            result_code: 0,
            message: summary.message(),
            total: summary.total,
            deleted: summary.deleted,
            blobs_deleted: summary.blobs_deleted,
            orphaned_blobs: summary.orphaned_blobs,
            flushes: summary.flushes,
            state: summary.state,
        }
    }
}
