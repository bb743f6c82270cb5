//! Binding model for container aliases.
//!
//! # Responsibility
//! - Define the tagged binding variants (`Value | Constructor | Factory`).
//! - Carry the declared, ordered dependency aliases of each callable binding.
//! - Give factories typed access to their resolved positional arguments.
//!
//! # Invariants
//! - Binding kind is fixed at bind time and never inferred at resolve time.
//! - Dependency order is the positional order of `Arguments`.

use crate::container::error::BoxError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::{type_name, Any};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

static BLOCK_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));
static LINE_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//[^\n]*").expect("valid line comment regex"));
static PARAMETER_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^(]*\(([^)]*)\)").expect("valid parameter list regex"));

/// A resolved service value. Identity is `Rc::ptr_eq`.
pub type Instance = Rc<dyn Any>;

/// Result of a fallible factory. `Ok(None)` means the factory produced nothing.
pub type FactoryResult = Result<Option<Instance>, BoxError>;

type ConstructorFn = Rc<dyn Fn(&Arguments) -> Instance>;
type FactoryFn = Rc<dyn Fn(&Arguments) -> FactoryResult>;

/// Binding discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Value,
    Constructor,
    Factory,
}

/// What one alias is bound to.
#[derive(Clone)]
pub enum Binding {
    /// Concrete value returned as-is.
    Value(Instance),
    /// Infallible constructor over resolved dependencies.
    Constructor {
        dependencies: Vec<String>,
        build: ConstructorFn,
    },
    /// Fallible factory over resolved dependencies.
    Factory {
        dependencies: Vec<String>,
        build: FactoryFn,
    },
}

impl Binding {
    /// Binds a concrete value.
    pub fn value<T: Any>(value: T) -> Self {
        Self::Value(Rc::new(value))
    }

    /// Binds an already type-erased instance.
    pub fn instance(instance: Instance) -> Self {
        Self::Value(instance)
    }

    /// Binds a constructor that receives `dependencies` resolved in order.
    pub fn constructor<I, D, T, F>(dependencies: I, build: F) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
        T: Any,
        F: Fn(&Arguments) -> T + 'static,
    {
        Self::Constructor {
            dependencies: collect_dependencies(dependencies),
            build: Rc::new(move |args| Rc::new(build(args)) as Instance),
        }
    }

    /// Binds a factory that may fail or produce nothing.
    pub fn factory<I, D, F>(dependencies: I, build: F) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
        F: Fn(&Arguments) -> FactoryResult + 'static,
    {
        Self::Factory {
            dependencies: collect_dependencies(dependencies),
            build: Rc::new(build),
        }
    }

    pub fn kind(&self) -> BindingKind {
        match self {
            Self::Value(_) => BindingKind::Value,
            Self::Constructor { .. } => BindingKind::Constructor,
            Self::Factory { .. } => BindingKind::Factory,
        }
    }

    /// Declared dependency aliases; empty for value bindings.
    pub fn dependencies(&self) -> &[String] {
        match self {
            Self::Value(_) => &[],
            Self::Constructor { dependencies, .. } | Self::Factory { dependencies, .. } => {
                dependencies
            }
        }
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("kind", &self.kind())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

fn collect_dependencies<I, D>(dependencies: I) -> Vec<String>
where
    I: IntoIterator<Item = D>,
    D: Into<String>,
{
    dependencies
        .into_iter()
        .map(Into::into)
        .map(|alias: String| alias.trim().to_string())
        .filter(|alias| !alias.is_empty())
        .collect()
}

/// Extracts dependency aliases from a parameter-list declaration.
///
/// Accepts `"(config, logger)"`, `"build(config, /* optional */ logger)"` or a
/// bare `"config, logger"`. Comments are dropped, entries trimmed, and empty
/// entries filtered out. Default values (`name = ...`) keep only the name.
pub fn parse_dependency_list(signature: &str) -> Vec<String> {
    let without_blocks = BLOCK_COMMENT_RE.replace_all(signature, "");
    let cleaned = LINE_COMMENT_RE.replace_all(&without_blocks, "");
    let parameters = match PARAMETER_LIST_RE.captures(&cleaned) {
        Some(captures) => captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        None => cleaned.to_string(),
    };

    parameters
        .split(',')
        .map(|entry| entry.split('=').next().unwrap_or_default().trim())
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positional dependency values handed to constructors and factories.
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Instance>,
}

impl Arguments {
    pub fn new(values: Vec<Instance>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Type-erased value at `index`.
    pub fn raw(&self, index: usize) -> Option<&Instance> {
        self.values.get(index)
    }

    /// Value at `index` downcast to `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<Rc<T>> {
        self.values
            .get(index)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Like `get`, but reports why the value is unusable.
    pub fn require<T: Any>(&self, index: usize) -> Result<Rc<T>, ArgumentError> {
        let value = self
            .values
            .get(index)
            .cloned()
            .ok_or(ArgumentError::Missing(index))?;
        value.downcast::<T>().map_err(|_| ArgumentError::TypeMismatch {
            index,
            expected: type_name::<T>(),
        })
    }
}

impl Debug for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish()
    }
}

/// Positional argument access errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    Missing(usize),
    TypeMismatch {
        index: usize,
        expected: &'static str,
    },
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(index) => write!(f, "argument {index} was not resolved"),
            Self::TypeMismatch { index, expected } => {
                write!(f, "argument {index} is not a `{expected}`")
            }
        }
    }
}

impl Error for ArgumentError {}
