//! garnet-util - Shared infrastructure for the Garnet Ruby parser.
//!
//! This crate holds the pieces both phases lean on:
//!
//! - [`Span`] and [`LineIndex`]: byte-offset source locations with on-demand
//!   line/column derivation from the newline index built during lexing.
//! - [`Diagnostic`] and [`Handler`]: the append-only diagnostic list. The
//!   parser always produces a tree; everything wrong with the source lands
//!   here instead of in a `Result`.
//! - [`UnescapeError`] / [`RegexpError`]: the few operations that fail with
//!   typed errors rather than diagnostics.

pub mod diagnostic;
pub mod error;
pub mod span;

pub use diagnostic::{Diagnostic, Handler, Level};
pub use error::{RegexpError, UnescapeError};
pub use span::{LineColumn, LineIndex, Span};
