//! Purpose: Library crate behind the `ringpipe` CLI and its tests.
//! Exports: `api` (stable surface), `core` (pipe, ring, stream adapters, errors).
//! Role: In-process, cross-thread byte pipe; no cross-process use.
//! Invariants: All shared pipe state lives behind one per-instance lock.
//! Invariants: Short transfers signal closure; only construction returns `Err`.
pub mod api;
pub mod core;
