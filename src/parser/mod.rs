//! Log line parsing.
//!
//! Lines arrive in logfmt (`key=value key2="quoted value" flag`). The
//! [`decode`] function turns one line into ordered [`Tuples`], and the
//! accessors on [`Tuples`] derive the metric fields from them.

pub mod error;
pub mod logfmt;
pub mod number;
pub mod tuple;

pub use error::ParseError;
pub use logfmt::decode;
pub use number::{float_prefix, render_general, strip_numeric_prefix};
pub use tuple::{Tuple, Tuples};
