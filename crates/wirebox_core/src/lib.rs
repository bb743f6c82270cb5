//! Embeddable service container and middleware pipeline.
//! This crate owns binding resolution, provider lifecycle and pipe execution.

pub mod config;
pub mod container;
pub mod logging;
pub mod pipeline;

pub use config::{ContainerConfig, DEFAULT_CONTAINER_NAME};
pub use container::binding::{
    parse_dependency_list, ArgumentError, Arguments, Binding, BindingKind, FactoryResult, Instance,
};
pub use container::error::{
    BoxError, ContainerError, ContainerErrorKind, ContainerResult, ErrorHandler,
};
pub use container::provider::ServiceProvider;
pub use container::service_container::Container;
pub use container::sharing::{accessor_name, ShareBuilder, TargetId};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use pipeline::kernel::{Kernel, KernelStage, PipelineOutcome, Sending, Threaded};
pub use pipeline::pipe::{Direction, Next, Pipe, PipeUnit, PipelineError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
