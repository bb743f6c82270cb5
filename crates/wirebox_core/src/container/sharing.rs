//! Cross-object sharing table.
//!
//! # Responsibility
//! - Name host objects (`TargetId`) that receive lazy `$alias` accessors.
//! - Track alias -> targets and target -> accessor -> alias.
//!
//! # Invariants
//! - A target appears at most once per alias.
//! - Un-sharing an alias removes its accessor from every target it reached.

use crate::container::service_container::Container;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static ALIAS_WORD_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid alias separator regex"));

/// Host-side identifier of an object that can receive accessors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for hosts without stable object names.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TargetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accessor property name for `alias`: `$` + lower camel case.
///
/// Words are split on anything that is not a Unicode letter or digit.
/// A leading capital run is an acronym and is lowered as a whole, keeping the
/// capital that opens the next word: `HTTPClient` -> `$httpClient`,
/// `URL` -> `$url`. Later words only get their first letter capitalised.
///
/// `X` -> `$x`, `http_client` -> `$httpClient`, `AppConfig` -> `$appConfig`.
pub fn accessor_name(alias: &str) -> String {
    let mut name = String::from("$");
    let words = ALIAS_WORD_SEPARATOR_RE
        .split(alias.trim())
        .filter(|word| !word.is_empty());
    for (position, word) in words.enumerate() {
        if position == 0 {
            push_lowered_head(&mut name, word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name
}

fn push_lowered_head(name: &mut String, word: &str) {
    let chars: Vec<char> = word.chars().collect();
    let capitals = chars.iter().take_while(|c| c.is_uppercase()).count();
    let lowered = if capitals > 1 && chars.get(capitals).is_some_and(|c| c.is_lowercase()) {
        capitals - 1
    } else {
        capitals.max(1)
    };
    for (index, c) in chars.into_iter().enumerate() {
        if index < lowered {
            name.extend(c.to_lowercase());
        } else {
            name.push(c);
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SharedRegistry {
    shared_with: BTreeMap<String, Vec<TargetId>>,
    accessors: BTreeMap<TargetId, BTreeMap<String, String>>,
}

impl SharedRegistry {
    /// Attaches the accessor for `alias` to `target`. Returns `false` when
    /// `target` already holds it.
    pub(crate) fn attach(&mut self, alias: &str, target: &TargetId) -> bool {
        let targets = self.shared_with.entry(alias.to_string()).or_default();
        if targets.contains(target) {
            return false;
        }
        targets.push(target.clone());
        self.accessors
            .entry(target.clone())
            .or_default()
            .insert(accessor_name(alias), alias.to_string());
        true
    }

    /// Removes every accessor attached for `alias`. Returns the targets it left.
    pub(crate) fn detach(&mut self, alias: &str) -> Vec<TargetId> {
        let Some(targets) = self.shared_with.remove(alias) else {
            return vec![];
        };
        let property = accessor_name(alias);
        for target in &targets {
            let Some(properties) = self.accessors.get_mut(target) else {
                continue;
            };
            if properties.get(&property).is_some_and(|bound| bound == alias) {
                properties.remove(&property);
            }
            if properties.is_empty() {
                self.accessors.remove(target);
            }
        }
        targets
    }

    pub(crate) fn is_shared(&self, alias: &str) -> bool {
        self.shared_with.contains_key(alias)
    }

    pub(crate) fn targets(&self, alias: &str) -> &[TargetId] {
        self.shared_with
            .get(alias)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn alias_for(&self, target: &TargetId, property: &str) -> Option<&str> {
        self.accessors
            .get(target)
            .and_then(|properties| properties.get(property))
            .map(String::as_str)
    }

    pub(crate) fn accessors(&self, target: &TargetId) -> Vec<String> {
        self.accessors
            .get(target)
            .map(|properties| properties.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Second step of `share(..).with_others(..)`.
///
/// Holds the aliases that passed validation. Dropping the builder discards them.
pub struct ShareBuilder<'c> {
    container: &'c mut Container,
    staged: Vec<String>,
}

impl<'c> ShareBuilder<'c> {
    pub(crate) fn new(container: &'c mut Container, staged: Vec<String>) -> Self {
        Self { container, staged }
    }

    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    /// Attaches every staged alias to every target.
    ///
    /// Returns how many new accessors were attached.
    pub fn with_others(self, targets: &[TargetId]) -> usize {
        let Self { container, staged } = self;
        container.attach_shared(&staged, targets)
    }
}
