//! Container error contract and error-handler seam.
//!
//! # Responsibility
//! - Produce named container errors (`"<container name> <kind label>"`).
//! - Define the handler contract that decides the value at a failure site.
//!
//! # Invariants
//! - Every user-facing container failure is one `ContainerError`.
//! - `name` is derived from the owning container name and the kind label.

use crate::container::binding::Instance;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ContainerResult<T> = Result<T, ContainerError>;

/// Boxed source error carried by instantiation failures.
pub type BoxError = Box<dyn Error + 'static>;

/// Failure classification for container operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerErrorKind {
    /// Unbound alias, empty factory result or type mismatch.
    Binding,
    /// Alias requested while already in flight.
    CircularDependency,
    /// Share request for an alias that is unbound or not sharable.
    Sharing,
    /// Factory reported its own error.
    Instantiation,
}

impl ContainerErrorKind {
    /// Label appended to the container name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Binding => "Binding Exception",
            Self::CircularDependency => "Circular Dependency Exception",
            Self::Sharing => "Sharing Exception",
            Self::Instantiation => "Instantiation Exception",
        }
    }
}

/// Named container error.
#[derive(Debug)]
pub struct ContainerError {
    name: String,
    kind: ContainerErrorKind,
    message: String,
    source: Option<BoxError>,
}

impl ContainerError {
    pub fn new(
        container_name: &str,
        kind: ContainerErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: format!("{container_name} {}", kind.label()),
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying error reported by a factory.
    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }

    /// Composed error name, e.g. `Container Binding Exception`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ContainerErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ContainerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl Error for ContainerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref()
    }
}

/// Handler consulted at every container failure site.
///
/// Returning `Ok(instance)` substitutes `instance` for the failed value.
/// Returning `Err` re-raises to the caller unchanged.
pub trait ErrorHandler {
    fn handle(&self, error: ContainerError) -> ContainerResult<Instance>;
}

impl<F> ErrorHandler for F
where
    F: Fn(ContainerError) -> ContainerResult<Instance>,
{
    fn handle(&self, error: ContainerError) -> ContainerResult<Instance> {
        self(error)
    }
}
