//! Host-supplied container configuration.

use serde::Deserialize;

/// Default container name used in error names and trace lines.
pub const DEFAULT_CONTAINER_NAME: &str = "Container";

/// Container construction options.
///
/// Deserializable so hosts can ship it inside their own config files.
/// Missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Prefix of every error name, e.g. `Container Binding Exception`.
    pub name: String,
    /// Starts the container with debug tracing enabled.
    pub debug: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONTAINER_NAME.to_string(),
            debug: false,
        }
    }
}

impl ContainerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Name with surrounding whitespace removed; blank names use the default.
    pub(crate) fn normalized_name(&self) -> String {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            DEFAULT_CONTAINER_NAME.to_string()
        } else {
            trimmed.to_string()
        }
    }
}
