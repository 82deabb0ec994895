//! Purpose: Define the stable public Rust API boundary for ringpipe.
//! Exports: Pipe, stream adapters, stats, and error types.
//! Role: Public, additive-only surface over `core`.
//! Invariants: Ring internals stay crate-private.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::handle::{PipeReader, PipeWriter, channel};
pub use crate::core::pipe::{BoundedPipe, PipeStats};
