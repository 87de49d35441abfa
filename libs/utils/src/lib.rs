//! Ambient stack shared by every crate in the pipeline: logging setup,
//! cooperative shutdown, a mutex+condvar bounded queue, config validation,
//! and the movable payload handle type.
//!
//! None of this is specific to superpages, STFs, or TFs -- it's the same
//! kind of small, dependency-light "utils" crate the teacher codebase keeps
//! at the bottom of its own dependency graph.

pub mod config;
pub mod logging;
pub mod payload;
pub mod queue;
pub mod shutdown;

pub use config::ConfigError;
pub use payload::{Disposer, PayloadHandle};
pub use queue::BoundedQueue;
pub use shutdown::ShutdownFlag;
