//! The shared `Result` alias.
//!
//! Errors are reported through rootcause so callers can attach context as
//! they propagate. The error enums themselves live next to the code that
//! raises them: [`crate::NamespaceError`] here, scheduler and workflow
//! errors in their own crates.

use rootcause::Report;

/// A result whose error is a rootcause report with context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
