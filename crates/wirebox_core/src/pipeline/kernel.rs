//! Kernel: middleware configuration and the send/through/via builder.
//!
//! # Responsibility
//! - Hold the configured middleware list.
//! - Run one traversal per `via`, `handle` or `terminate` call.
//!
//! # Invariants
//! - `handle(input, cb)` behaves exactly like
//!   `send(input).through(middleware).via("handle")?.then(cb)`; same for `terminate`.
//! - The terminal callback runs only when every pipe continued.

use crate::pipeline::pipe::{Direction, PipeUnit, PipelineError, Threading, Traversal};
use log::debug;

/// Observable kernel/run stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelStage {
    /// No middleware configured.
    Idle,
    /// Middleware configured, nothing sent.
    Configured,
    /// Input captured, direction not chosen yet.
    Sending,
    /// Every pipe continued and the state reached the callback.
    Completed,
    /// Some pipe never continued.
    Halted,
}

/// Result of one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome<T> {
    Completed(T),
    /// `pipe` is the list index of the pipe that did not continue.
    Halted { direction: Direction, pipe: usize },
}

impl<T> PipelineOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Halted { .. } => None,
        }
    }

    pub fn stage(&self) -> KernelStage {
        match self {
            Self::Completed(_) => KernelStage::Completed,
            Self::Halted { .. } => KernelStage::Halted,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PipelineOutcome<U> {
        match self {
            Self::Completed(value) => PipelineOutcome::Completed(f(value)),
            Self::Halted { direction, pipe } => PipelineOutcome::Halted { direction, pipe },
        }
    }
}

/// Middleware executor.
pub struct Kernel<S> {
    middleware: Vec<PipeUnit<S>>,
}

impl<S> Default for Kernel<S> {
    fn default() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }
}

impl<S> std::fmt::Debug for Kernel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("middleware", &self.middleware)
            .finish()
    }
}

impl<S> Kernel<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_middleware(pipes: Vec<PipeUnit<S>>) -> Self {
        Self { middleware: pipes }
    }

    /// Replaces the middleware list.
    pub fn set_middleware(&mut self, pipes: Vec<PipeUnit<S>>) -> &mut Self {
        self.middleware = pipes;
        self
    }

    pub fn middleware(&self) -> &[PipeUnit<S>] {
        &self.middleware
    }

    pub fn stage(&self) -> KernelStage {
        if self.middleware.is_empty() {
            KernelStage::Idle
        } else {
            KernelStage::Configured
        }
    }

    /// Captures `state`; the builder starts with this kernel's middleware.
    pub fn send(&self, state: S) -> Sending<S> {
        Sending {
            state,
            pipes: self.middleware.clone(),
        }
    }

    /// Runs the middleware forward, then `callback` on the final state.
    pub fn handle<R>(&self, initial: S, callback: impl FnOnce(S) -> R) -> PipelineOutcome<R> {
        self.send(initial)
            .via_direction(Direction::Handle)
            .then(callback)
    }

    /// Runs the middleware in reverse, then `callback` on the final state.
    pub fn terminate<R>(&self, initial: S, callback: impl FnOnce(S) -> R) -> PipelineOutcome<R> {
        self.send(initial)
            .via_direction(Direction::Terminate)
            .then(callback)
    }
}

/// Captured input awaiting a pipe list and a direction.
pub struct Sending<S> {
    state: S,
    pipes: Vec<PipeUnit<S>>,
}

impl<S> Sending<S> {
    /// Starts a run outside any kernel.
    pub fn new(state: S) -> Self {
        Self {
            state,
            pipes: Vec::new(),
        }
    }

    /// Replaces the pipe list for this run.
    pub fn through(mut self, pipes: Vec<PipeUnit<S>>) -> Self {
        self.pipes = pipes;
        self
    }

    pub fn stage(&self) -> KernelStage {
        KernelStage::Sending
    }

    /// Selects the pipe method by name (`handle` | `terminate`) and runs.
    pub fn via(self, method: &str) -> Result<Threaded<S>, PipelineError> {
        let direction = method.parse::<Direction>()?;
        Ok(self.via_direction(direction))
    }

    pub fn via_direction(self, direction: Direction) -> Threaded<S> {
        let Self { state, pipes } = self;
        let threading = Threading::new(&pipes, direction);
        threading.start(state);
        let outcome = match threading.finish() {
            Traversal::Delivered(state) => PipelineOutcome::Completed(state),
            Traversal::Stopped(pipe) => PipelineOutcome::Halted { direction, pipe },
        };
        debug!(
            "event=pipeline_run module=pipeline direction={} pipes={} status={}",
            direction,
            pipes.len(),
            if outcome.is_completed() { "completed" } else { "halted" }
        );
        Threaded { outcome }
    }
}

/// Finished traversal exposing the terminal continuation.
#[derive(Debug)]
pub struct Threaded<S> {
    outcome: PipelineOutcome<S>,
}

impl<S> Threaded<S> {
    /// Runs `callback` on the final state; skipped when the run halted.
    pub fn then<R>(self, callback: impl FnOnce(S) -> R) -> PipelineOutcome<R> {
        self.outcome.map(callback)
    }

    pub fn outcome(self) -> PipelineOutcome<S> {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::{Kernel, KernelStage, PipelineOutcome, Sending};
    use crate::pipeline::pipe::{Direction, Next, PipeUnit, PipelineError};

    fn add(delta: i32) -> PipeUnit<i32> {
        PipeUnit::function(move |state: i32, next: Next<'_, i32>| next.run(state + delta))
    }

    #[test]
    fn kernel_stage_tracks_configuration() {
        let mut kernel = Kernel::<i32>::new();
        assert_eq!(kernel.stage(), KernelStage::Idle);
        kernel.set_middleware(vec![add(1)]);
        assert_eq!(kernel.stage(), KernelStage::Configured);
        assert_eq!(kernel.send(0).stage(), KernelStage::Sending);
    }

    #[test]
    fn via_rejects_unknown_method() {
        let err = Sending::new(0)
            .through(vec![add(1)])
            .via("dispatch")
            .expect_err("unknown method must fail");
        assert_eq!(err, PipelineError::UnknownMethod("dispatch".to_string()));
    }

    #[test]
    fn through_overrides_kernel_middleware() {
        let kernel = Kernel::with_middleware(vec![add(100)]);
        let outcome = kernel
            .send(1)
            .through(vec![add(1), add(1)])
            .via("handle")
            .expect("handle is a known method")
            .then(|state| state);
        assert_eq!(outcome, PipelineOutcome::Completed(3));
    }

    #[test]
    fn middleware_and_outcome_expose_the_run() {
        let kernel = Kernel::with_middleware(vec![add(2), add(3)]);
        assert_eq!(kernel.middleware().len(), 2);

        let outcome = kernel
            .send(1)
            .via("terminate")
            .expect("terminate is a known method")
            .outcome();
        assert_eq!(outcome, PipelineOutcome::Completed(6));
    }

    #[test]
    fn halted_run_skips_callback() {
        let kernel = Kernel::with_middleware(vec![
            add(1),
            PipeUnit::function(|_state: i32, _next: Next<'_, i32>| {}),
        ]);
        let mut called = false;
        let outcome = kernel.handle(0, |state| {
            called = true;
            state
        });
        assert!(!called);
        assert_eq!(
            outcome,
            PipelineOutcome::Halted {
                direction: Direction::Handle,
                pipe: 1
            }
        );
        assert_eq!(outcome.stage(), KernelStage::Halted);
    }
}
