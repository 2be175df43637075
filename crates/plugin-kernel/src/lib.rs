//! A micro-kernel for composing in-process applications out of versioned
//! plugins: a dependency resolver (version algebra, graph, topological
//! order, conflict strategies), a plugin lifecycle state machine, a
//! cross-plugin extension engine, and the kernel builder that drives both.
//!
//! ```no_run
//! use plugin_kernel::{create_kernel, plugin, Version};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = plugin("logger", Version::new(1, 0, 0))
//!     .setup(|_ctx| async { Ok(Default::default()) })
//!     .build();
//!
//! let kernel = create_kernel().use_plugin(logger).start().await?;
//! assert!(kernel.has("logger"));
//! # Ok(())
//! # }
//! ```

pub mod kernel;
pub mod plugin_system;
pub mod resolver;

pub use kernel::builder::{create_development_kernel, create_kernel, create_production_kernel, create_test_kernel, KernelBuilder};
pub use kernel::built::{BuiltKernel, Kernel, KernelMetadata, KernelState, PluginOptions};
pub use kernel::config::{KernelConfig, LogLevel, PartialKernelConfig};
pub use kernel::error::{KernelError, Result};
pub use kernel::global::global_kernel;
pub use plugin_system::{plugin, ApiMap, ApiSurface, Condition, ConditionOp, DependencyContext, Plugin, PluginBuilder, PluginDependency, PluginEntity, PluginExtension, PluginId, PluginState, PluginSystemError};
pub use plugin_system::version::{Version, VersionConstraint, VersionError};
pub use resolver::{resolve, validate_plugins, OrderHint, ResolutionResult, ResolutionStrategy};
