//! Pipe contract and continuation plumbing.
//!
//! # Responsibility
//! - Define the middleware unit (`Pipe`) and its polymorphic carrier (`PipeUnit`).
//! - Thread state through pipes with single-use continuations (`Next`).
//!
//! # Invariants
//! - `Handle` visits pipes in list order, `Terminate` in reverse list order.
//! - A continuation is consumed by `run`, so each pipe advances at most once.
//! - A pipe that never runs its continuation halts the traversal.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use std::str::FromStr;

/// Method name selecting the forward traversal.
pub const METHOD_HANDLE: &str = "handle";
/// Method name selecting the reverse traversal.
pub const METHOD_TERMINATE: &str = "terminate";

/// Traversal direction; also names the pipe method invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// First pipe first.
    Handle,
    /// Last pipe first.
    Terminate,
}

impl Direction {
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Handle => METHOD_HANDLE,
            Self::Terminate => METHOD_TERMINATE,
        }
    }

    /// List index of the pipe visited at traversal `step`.
    fn index_at(self, step: usize, len: usize) -> usize {
        match self {
            Self::Handle => step,
            Self::Terminate => len - 1 - step,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for Direction {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            METHOD_HANDLE => Ok(Self::Handle),
            METHOD_TERMINATE => Ok(Self::Terminate),
            other => Err(PipelineError::UnknownMethod(other.to_string())),
        }
    }
}

/// Pipeline configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    UnknownMethod(String),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMethod(value) => write!(
                f,
                "unknown pipe method `{value}`; expected {METHOD_HANDLE}|{METHOD_TERMINATE}"
            ),
        }
    }
}

impl Error for PipelineError {}

/// Middleware unit.
pub trait Pipe<S> {
    /// Forward step. Call `next.run(state)` to continue.
    fn handle(&self, state: S, next: Next<'_, S>);

    /// Reverse step. Passes the state through unless overridden.
    fn terminate(&self, state: S, next: Next<'_, S>) {
        next.run(state);
    }
}

type PipeFn<S> = Rc<dyn Fn(S, Next<'_, S>)>;
type PipeConstructor<S> = Rc<dyn Fn() -> Box<dyn Pipe<S>>>;

/// One entry of a pipe list.
pub enum PipeUnit<S> {
    /// Same pipe instance on every run.
    Shared(Rc<dyn Pipe<S>>),
    /// Fresh pipe instance each time the pipe is reached.
    Constructed(PipeConstructor<S>),
    /// Plain function, invoked the same way in both directions.
    Function(PipeFn<S>),
}

impl<S: 'static> PipeUnit<S> {
    pub fn shared(pipe: impl Pipe<S> + 'static) -> Self {
        Self::Shared(Rc::new(pipe))
    }

    pub fn constructed<P, F>(build: F) -> Self
    where
        P: Pipe<S> + 'static,
        F: Fn() -> P + 'static,
    {
        Self::Constructed(Rc::new(move || Box::new(build()) as Box<dyn Pipe<S>>))
    }

    pub fn function(pipe: impl Fn(S, Next<'_, S>) + 'static) -> Self {
        Self::Function(Rc::new(pipe))
    }
}

impl<S> PipeUnit<S> {
    fn invoke(&self, direction: Direction, state: S, next: Next<'_, S>) {
        match self {
            Self::Shared(pipe) => call_pipe(pipe.as_ref(), direction, state, next),
            Self::Constructed(build) => {
                let pipe = build();
                call_pipe(pipe.as_ref(), direction, state, next);
            }
            Self::Function(pipe) => pipe(state, next),
        }
    }
}

impl<S> Clone for PipeUnit<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Shared(pipe) => Self::Shared(Rc::clone(pipe)),
            Self::Constructed(build) => Self::Constructed(Rc::clone(build)),
            Self::Function(pipe) => Self::Function(Rc::clone(pipe)),
        }
    }
}

impl<S> Debug for PipeUnit<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Shared(_) => "Shared",
            Self::Constructed(_) => "Constructed",
            Self::Function(_) => "Function",
        };
        f.debug_tuple("PipeUnit").field(&kind).finish()
    }
}

fn call_pipe<S>(pipe: &dyn Pipe<S>, direction: Direction, state: S, next: Next<'_, S>) {
    match direction {
        Direction::Handle => pipe.handle(state, next),
        Direction::Terminate => pipe.terminate(state, next),
    }
}

/// Single-use continuation handed to each pipe.
pub struct Next<'a, S> {
    threading: &'a Threading<'a, S>,
    step: usize,
}

impl<'a, S> Next<'a, S> {
    /// Hands `state` to the next pipe, or to the terminal callback after the last one.
    pub fn run(self, state: S) {
        advance(self.threading, self.step, state);
    }

    pub fn direction(&self) -> Direction {
        self.threading.direction
    }

    /// Pipes left after the one holding this continuation.
    pub fn remaining(&self) -> usize {
        self.threading.pipes.len() - self.step
    }
}

/// Execution record of one traversal.
pub(crate) struct Threading<'a, S> {
    pipes: &'a [PipeUnit<S>],
    direction: Direction,
    delivered: RefCell<Option<S>>,
    entered: Cell<Option<usize>>,
}

/// How a traversal ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Traversal<S> {
    Delivered(S),
    /// List index of the last pipe entered before the chain stopped.
    Stopped(usize),
}

impl<'a, S> Threading<'a, S> {
    pub(crate) fn new(pipes: &'a [PipeUnit<S>], direction: Direction) -> Self {
        Self {
            pipes,
            direction,
            delivered: RefCell::new(None),
            entered: Cell::new(None),
        }
    }

    pub(crate) fn start(&self, state: S) {
        advance(self, 0, state);
    }

    pub(crate) fn finish(self) -> Traversal<S> {
        match self.delivered.into_inner() {
            Some(state) => Traversal::Delivered(state),
            None => Traversal::Stopped(self.entered.get().unwrap_or_default()),
        }
    }
}

fn advance<'t, S>(threading: &'t Threading<'t, S>, step: usize, state: S) {
    let len = threading.pipes.len();
    if step >= len {
        *threading.delivered.borrow_mut() = Some(state);
        return;
    }
    let index = threading.direction.index_at(step, len);
    threading.entered.set(Some(index));
    let next = Next {
        threading,
        step: step + 1,
    };
    threading.pipes[index].invoke(threading.direction, state, next);
}
