//! Error type for the tools crate.

use combat_core::error::CombatError;
use thiserror::Error;

/// Errors raised while loading files or running scenarios.
#[derive(Error, Debug)]
pub enum ToolError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Config rejected by the combat core.
    #[error("Invalid combat config: {0}")]
    Config(#[from] CombatError),
    /// A command named a unit label that was never placed.
    #[error("Unknown unit label: {0}")]
    UnknownUnit(String),
    /// Two units share a label.
    #[error("Duplicate unit label: {0}")]
    DuplicateUnit(String),
    /// A decimal does not fit the fixed-point range.
    #[error("Value out of range: {0}")]
    OutOfRange(f64),
    /// Failed to encode the report.
    #[error("Failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

/// Result alias for tool operations.
pub type Result<T> = std::result::Result<T, ToolError>;
