//! Error types for tool invocation and report parsing.

use std::path::PathBuf;

/// Errors produced while running an external tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("command has no program to run")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with code {exit_code}: {stderr}")]
    Failed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{program} finished but did not produce {}", path.display())]
    MissingOutput { program: String, path: PathBuf },
}

/// Errors produced while reading a diff report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read report {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {} has a malformed {field} value: {value:?}", path.display())]
    MalformedValue {
        path: PathBuf,
        field: String,
        value: String,
    },

    #[error("report {} has no mean error", path.display())]
    MissingMean { path: PathBuf },
}
