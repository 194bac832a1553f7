//! Error handling for this crate.
//!
//! Every stage of the pipeline has its own error type
//! ([`ParseErr`](crate::parse::ParseErr), [`AsmErr`](crate::asm::AsmErr),
//! [`SimErr`](crate::sim::SimErr)); this module holds what they share: the
//! [`Error`] trait, which exposes the offending line (when there is one) and
//! an optional help message, and [`report`], which renders any of them as the
//! single diagnostic line the command-line front end prints.

use std::borrow::Cow;

pub use crate::parse::lex::LexErr;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// The 0-based source line this error points at, if it has one.
    ///
    /// Body-line errors use body-relative indices (which coincide with the
    /// line's address); header errors use 0 and 1.
    fn line(&self) -> Option<usize> {
        None
    }

    /// A possible help message to aid the user.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}

/// Renders an error as a one-line diagnostic, e.g. `error: line 3: invalid opcode FOO`.
pub fn report(err: &dyn Error) -> String {
    format!("error: {err}")
}
