// Core modules implementing the ring, the blocking pipe, stream adapters, and errors.
pub mod error;
pub mod handle;
pub mod pipe;
pub(crate) mod ring;
