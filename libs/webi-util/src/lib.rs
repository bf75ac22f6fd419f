//! Macros shared between the webi crates.

pub mod warn;
pub mod boxed_error;

pub use warn::{set_trace, trace_enabled, WEBI_TRACE};
