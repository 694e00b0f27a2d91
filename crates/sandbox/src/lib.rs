//! `mt-sandbox`: embedded command directives and their sandboxed execution.
//!
//! The pipeline is:
//!
//! 1. [`DirectiveExtractor`] pulls `#cli` lines out of note content.
//! 2. [`CommandPolicy`] parses each into a [`CommandSpec`], runs it through
//!    the recognizer chain and drops anything unsafe.
//! 3. [`SandboxExecutor`] acquires a container through a [`ContainerManager`]
//!    and runs the survivors one at a time, halting at the first failure
//!    that was not marked allow-failure.

pub mod commands;
pub mod container;
pub mod directives;
pub mod executor;

pub use commands::{
    CommandPolicy, CommandSpec, DenyList, EchoRecognizer, FlagValue, GenericRecognizer,
    GitRecognizer, Recognizer, Verdict,
};
pub use container::{
    ContainerManager, ContainerStatus, DockerContainerManager, ShellOutput, TIMEOUT_EXIT_CODE,
};
pub use directives::{Directive, DirectiveExtractor};
pub use executor::{BoxStream, CommandResult, ExecutorState, SandboxExecutor};
