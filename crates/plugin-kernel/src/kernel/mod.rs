//! The kernel: configuration, the builder that accumulates plugins (C9),
//! and the built/live kernel that drives initialization and teardown (C10).
//!
//! - [`config`]: `KernelConfig`/`PartialKernelConfig` and their defaults.
//! - [`constants`]: crate-wide defaults and identity rules.
//! - [`error`]: `KernelError`, the top-level error type.
//! - [`builder`]: `KernelBuilder` and the `create_*_kernel()` presets.
//! - [`built`]: `BuiltKernel` and the live `Kernel`.
//! - [`global`]: the optional process-wide handle `auto_global` publishes to.
pub mod builder;
pub mod built;
pub mod config;
pub mod constants;
pub mod error;
pub mod global;

pub use builder::{create_development_kernel, create_kernel, create_production_kernel, create_test_kernel, KernelBuilder};
pub use built::{BuiltKernel, Kernel, KernelMetadata, KernelState, PluginOptions};
pub use config::{KernelConfig, LogLevel, PartialKernelConfig};
pub use error::{KernelError, Result};
pub use global::global_kernel;
