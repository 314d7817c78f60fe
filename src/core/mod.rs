//! Core types shared by every planning stage.
//!
//! At the moment this is the error taxonomy: [`TeazerError`] for typed
//! failures and [`ErrorContext`] / [`user_friendly_error`] for reporting them
//! on the command line.

pub mod error;

pub use error::{ErrorContext, TeazerError, user_friendly_error};
