//! Inversion-of-control container.
//!
//! # Responsibility
//! - Map aliases to values, constructors and factories.
//! - Resolve dependencies lazily with cycle detection and singleton caching.
//! - Drive service-provider lifecycle (register, boot, deferred boot).
//! - Expose shared services to host objects through `$alias` accessors.
//!
//! # Invariants
//! - All container state is owned by one `Container`; nothing is global.
//! - Every failure raised while resolving, booting or sharing is a
//!   `ContainerError` routed through `Container::handle_error`.

pub mod binding;
pub mod error;
pub mod provider;
pub mod service_container;
pub mod sharing;
mod trace;
