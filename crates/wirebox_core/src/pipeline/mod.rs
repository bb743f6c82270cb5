//! Bidirectional middleware pipeline.
//!
//! A `Kernel` threads one state value through an ordered pipe list, forward
//! for `handle` and in reverse for `terminate`. Execution is synchronous
//! continuation passing: a pipe "suspends" only by not yet running `next`.

pub mod kernel;
pub mod pipe;
