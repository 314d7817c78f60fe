//! Error handling for teazer
//!
//! This module provides the error taxonomy of the sweep planner and the
//! user-facing rendering of failures. The error system follows two rules:
//! 1. **Strongly-typed errors** ([`TeazerError`]) so callers can match on the
//!    failure mode (configuration, resume, scheduler).
//! 2. **User-friendly messages** ([`ErrorContext`]) with details and a
//!    suggestion when the CLI reports the failure.
//!
//! # Error Categories
//!
//! - **Configuration** (always fatal, raised before any job is built):
//!   [`TeazerError::MalformedRange`], [`TeazerError::GroupLengthMismatch`],
//!   [`TeazerError::CyclicReference`], [`TeazerError::MissingKey`],
//!   [`TeazerError::UnknownReference`], [`TeazerError::DuplicateSeed`],
//!   [`TeazerError::InvalidValue`], [`TeazerError::UnknownEngine`],
//!   [`TeazerError::InvalidSubset`], [`TeazerError::ConfigParse`]
//! - **Resume**: [`TeazerError::ResumeInconsistency`] is never returned from
//!   planning; it is logged and the seed is excluded.
//! - **Scheduler**: [`TeazerError::SchedulerSubmission`] is propagated to the
//!   caller unchanged.
//!
//! Every configuration variant names the offending key and its raw value.
//!
//! # Examples
//!
//! ```rust,no_run
//! use teazer_cli::core::{TeazerError, user_friendly_error};
//!
//! let error = TeazerError::MissingKey {
//!     section: "config".to_string(),
//!     key: "script".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for teazer operations.
#[derive(Error, Debug)]
pub enum TeazerError {
    /// A range or list specification could not be expanded.
    ///
    /// Raised for non-numeric slice bounds, a zero step, a slice that yields
    /// no values, or an empty list entry.
    #[error("Malformed range for '{key}': '{raw}' ({reason})")]
    MalformedRange {
        /// Parameter (or `seeds`) whose value is malformed
        key: String,
        /// The raw specification as written in the configuration
        raw: String,
        /// What is wrong with it
        reason: String,
    },

    /// Members of a parameter group expand to different lengths.
    #[error("Parameters in group '{group}' have unequal lengths: {lengths} ({raw})")]
    GroupLengthMismatch {
        /// Group name
        group: String,
        /// `name=len` pairs of all members
        lengths: String,
        /// `name = 'raw'` of all members
        raw: String,
    },

    /// Parameters reference each other in a cycle.
    #[error("Cyclic parameter reference: {chain} ({raw})")]
    CyclicReference {
        /// The cycle, e.g. `A → B → A`
        chain: String,
        /// `name = 'raw'` of every parameter on the cycle
        raw: String,
    },

    /// A required configuration key is absent from every layer.
    #[error("Missing required key '{key}' in section [{section}]")]
    MissingKey {
        /// Section the key belongs to
        section: String,
        /// The missing key
        key: String,
    },

    /// A `%(name)s` reference names a parameter that does not exist.
    #[error("Parameter '{key}' references unknown parameter '{reference}' in '{raw}'")]
    UnknownReference {
        /// Referencing parameter
        key: String,
        /// Name inside `%(...)s`
        reference: String,
        /// Raw template value
        raw: String,
    },

    /// The expanded seed list contains the same seed twice.
    #[error("Duplicate seed {seed} in seed specification '{raw}'")]
    DuplicateSeed {
        /// The repeated seed
        seed: u64,
        /// Raw seed specification
        raw: String,
    },

    /// A configuration value has the wrong shape.
    #[error("Invalid value for '{key}': '{raw}' ({reason})")]
    InvalidValue {
        /// Key holding the value
        key: String,
        /// Raw value
        raw: String,
        /// What is wrong with it
        reason: String,
    },

    /// `--class` names an engine that is not registered.
    #[error("Unknown sweep engine '{name}'")]
    UnknownEngine {
        /// Requested engine name
        name: String,
        /// Registered engine names
        available: Vec<String>,
    },

    /// A `--subset` expression could not be parsed.
    #[error("Invalid subset expression '{raw}': {reason}")]
    InvalidSubset {
        /// Raw expression
        raw: String,
        /// What is wrong with it
        reason: String,
    },

    /// A configuration file is not valid TOML or does not match the schema.
    #[error("Invalid configuration file {file}")]
    ConfigParse {
        /// Path of the offending file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Existing output for a seed cannot be classified.
    #[error("Ambiguous resume state for seed {seed} in {dir}: {reason}")]
    ResumeInconsistency {
        /// Seed whose files are ambiguous
        seed: u64,
        /// Trajectory directory
        dir: String,
        /// What was found
        reason: String,
    },

    /// The external scheduler rejected a submission.
    #[error("Failed to submit {stage} stage for {target}")]
    SchedulerSubmission {
        /// Stage name (`simulate`, `average`, `postprocess`)
        stage: String,
        /// Ensemble directory the stage belongs to
        target: String,
        /// Scheduler output or spawn error
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl TeazerError {
    /// Whether this error belongs to the fatal configuration category.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedRange { .. }
                | Self::GroupLengthMismatch { .. }
                | Self::CyclicReference { .. }
                | Self::MissingKey { .. }
                | Self::UnknownReference { .. }
                | Self::DuplicateSeed { .. }
                | Self::InvalidValue { .. }
                | Self::UnknownEngine { .. }
                | Self::InvalidSubset { .. }
                | Self::ConfigParse { .. }
        )
    }
}

/// User-facing wrapper around a [`TeazerError`] with optional details and a
/// suggestion for resolving it.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: TeazerError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: TeazerError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: message in red, details in yellow,
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] for CLI display.
///
/// [`TeazerError`] values (also when wrapped in `anyhow` context) get a
/// tailored suggestion; IO errors get filesystem guidance; everything else is
/// reported with its full context chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = format!("{error:#}");

    let error = match error.downcast::<TeazerError>() {
        Ok(teazer_error) => {
            let message = teazer_error.to_string();
            let ctx = create_error_context(teazer_error);
            return if ctx.details.is_none() && chain != message {
                ctx.with_details(chain)
            } else {
                ctx
            };
        }
        Err(error) => error,
    };

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(TeazerError::Other {
                    message: chain,
                })
                .with_suggestion("Check permissions of the output directory tree");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(TeazerError::Other {
                    message: chain,
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    ErrorContext::new(TeazerError::Other {
        message: chain,
    })
}

fn create_error_context(error: TeazerError) -> ErrorContext {
    match &error {
        TeazerError::MalformedRange { .. } => ErrorContext::new(error).with_suggestion(
            "Use a single value, a ';'-separated list, or start:stop / start:step:stop",
        ),
        TeazerError::GroupLengthMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("Give every member of the group the same number of values")
            .with_details("Grouped parameters are iterated in lock-step"),
        TeazerError::CyclicReference { .. } => ErrorContext::new(error)
            .with_suggestion("Remove one of the %(name)s references to break the cycle"),
        TeazerError::MissingKey { section, key } => {
            let hint = format!("Add '{key} = ...' to the [{section}] section of the sweep file");
            ErrorContext::new(error).with_suggestion(hint)
        }
        TeazerError::UnknownReference { .. } => ErrorContext::new(error)
            .with_suggestion("Check the spelling of the referenced parameter name"),
        TeazerError::DuplicateSeed { .. } => ErrorContext::new(error)
            .with_suggestion("Every seed may appear only once; check overlapping ranges"),
        TeazerError::UnknownEngine { name, available } => {
            let similar = crate::engine::similar_names(name, available);
            let listing = available
                .iter()
                .map(|engine| match crate::engine::engine_by_name(engine) {
                    Ok(found) => format!("  {engine}: {}", found.description()),
                    Err(_) => format!("  {engine}"),
                })
                .collect::<Vec<_>>()
                .join("\n");
            let details = format!("Registered engines:\n{listing}");
            let ctx = ErrorContext::new(error).with_details(details);
            if similar.is_empty() {
                ctx
            } else {
                ctx.with_suggestion(format!("Did you mean: {}", similar.join(", ")))
            }
        }
        TeazerError::InvalidSubset { .. } => ErrorContext::new(error)
            .with_suggestion("Use the form 'par=v1,v2;other=v' and '|' between alternatives"),
        TeazerError::ConfigParse { reason, .. } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check the TOML syntax: quotes, brackets and section headers")
        }
        TeazerError::SchedulerSubmission { reason, .. } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Nothing after the failed stage was submitted; fix the problem and resubmit, finished seeds are skipped")
        }
        _ => ErrorContext::new(error),
    }
}
