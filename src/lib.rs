//! rigenera: an incremental page regeneration engine.
//!
//! Serves cached page artifacts instantly and rebuilds them in the
//! background once they outlive their revalidation window, with at most one
//! rebuild per key in flight. Keys never seen before are handled by a
//! deployment-wide fallback policy: reject, block until generated, or
//! answer with a placeholder while generation runs.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
