//! Error taxonomy shared by every tool.
//!
//! Each variant of [`AdminError`] is terminal for the current invocation and
//! maps to one process exit code. The `Display` output is the `cause: detail`
//! line printed on stderr.

use thiserror::Error;

/// Exit status for a successful run.
pub const EXIT_OK: i32 = 0;
/// Exit status when an external call failed.
pub const EXIT_INVOCATION: i32 = 1;
/// Exit status for command-line usage errors.
pub const EXIT_USAGE: i32 = 2;
/// Exit status for missing configuration or tooling.
pub const EXIT_PRECONDITION: i32 = 3;
/// Exit status when a handler's own pre-check refused the operation.
pub const EXIT_CONFLICT: i32 = 4;
/// Exit status after SIGINT/SIGTERM.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors in the command line itself, always detected before any external call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("unknown object '{0}'")]
    UnknownObject(String),

    #[error("unknown action '{action}' for object '{object}'")]
    UnknownAction { object: String, action: String },

    #[error("missing required flag {0}")]
    MissingFlag(String),

    #[error("flag {0} expects a value")]
    MissingValue(String),

    #[error("unexpected argument '{0}'")]
    UnknownFlag(String),

    #[error("flag {0} given more than once")]
    RepeatedFlag(String),

    #[error("invalid value for {flag}: {reason}")]
    InvalidValue { flag: String, reason: String },

    #[error("unknown format selector '{selector}' (expected one of: {expected})")]
    UnknownSelector { selector: String, expected: String },
}

/// Errors in a tool's own route, flag or transform definitions.
///
/// These surface when the tool is assembled at startup, never mid-run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("malformed flag entry '{0}'")]
    MalformedFlag(String),

    #[error("flag {flag} declared twice in '{spec}'")]
    DuplicateFlag { flag: String, spec: String },

    #[error("route '{object} {action}' declared twice")]
    DuplicateRoute { object: String, action: String },

    #[error("route for object '{0}' has no actions")]
    EmptyRoute(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("usage: {0}")]
    Usage(#[from] UsageError),

    #[error("config: {0}")]
    Precondition(String),

    #[error("definition: {0}")]
    Definition(#[from] SpecError),

    #[error("{context}: {message}")]
    Invocation { context: String, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("output: {0}")]
    Output(String),

    #[error("workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("interrupted: received termination signal")]
    Interrupted,
}

impl AdminError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AdminError::Usage(_) => EXIT_USAGE,
            AdminError::Precondition(_) | AdminError::Definition(_) | AdminError::Workspace(_) => {
                EXIT_PRECONDITION
            }
            AdminError::Invocation { .. } | AdminError::Output(_) => EXIT_INVOCATION,
            AdminError::Conflict(_) => EXIT_CONFLICT,
            AdminError::Interrupted => EXIT_INTERRUPTED,
        }
    }
}
