//! Plugin identity, version algebra, declared dependencies, the lifecycle
//! state machine, and the extension engine.
//!
//! - [`version`]: semver parsing and constraint satisfaction (C1).
//! - [`dependency`]: declared dependencies and the condition language.
//! - [`entity`]: the plugin lifecycle state machine and API surfaces (C7).
//! - [`traits`]: the [`Plugin`] trait and the closure-based [`traits::PluginBuilder`].
//! - [`extension`]: applying one plugin's extensions onto another's API (C8).
//! - [`error`]: the plugin-system error taxonomy.
pub mod dependency;
pub mod entity;
pub mod error;
pub mod extension;
pub mod traits;
pub mod version;

pub use dependency::{Condition, ConditionOp, PluginDependency};
pub use entity::{ApiSurface, DependencyContext, PluginEntity, PluginId, PluginState};
pub use error::PluginSystemError;
pub use traits::{plugin, ApiMap, Plugin, PluginBuilder, PluginExtension};
pub use version::{Version, VersionConstraint, VersionError};
