//! Error taxonomy for the plugin lifecycle: identity validation, dependency
//! resolution, state machine violations, setup/destroy/extension failures.

use std::time::Duration;

use thiserror::Error;

use crate::plugin_system::entity::PluginState;
use crate::plugin_system::version::VersionError;

#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("invalid plugin name '{0}': must match ^[a-z][a-z0-9-]*$")]
    InvalidPluginName(String),

    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    #[error("duplicate plugin '{0}'")]
    DuplicatePlugin(String),

    #[error("missing dependency '{target}' required by '{required_by}'")]
    MissingDependency { target: String, required_by: String },

    #[error("circular dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("version conflict for '{target}': no version in {candidates:?} satisfies all constraints from {required_by:?}")]
    VersionConflict {
        target: String,
        candidates: Vec<String>,
        required_by: Vec<String>,
    },

    #[error("condition unmet for dependency on '{target}' declared by '{plugin}'")]
    ConditionUnmet { plugin: String, target: String },

    #[error("setup failed for plugin '{plugin}': {message}")]
    PluginSetupFailed {
        plugin: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("destroy failed for plugin '{plugin}': {message}")]
    PluginDestroyFailed {
        plugin: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("plugin '{plugin}' timed out after {elapsed:?}")]
    PluginTimeout { plugin: String, elapsed: Duration },

    #[error("extension target '{target}' does not exist")]
    InvalidExtensionTarget { target: String },

    #[error("plugin '{plugin}' attempted to extend itself")]
    SelfExtension { plugin: String },

    #[error("cyclic extension chain: {}", .cycle.join(" -> "))]
    CyclicExtension { cycle: Vec<String> },

    #[error("extension from '{source_plugin}' onto '{target}' failed: {message}")]
    ExtensionFailed {
        source_plugin: String,
        target: String,
        message: String,
    },

    #[error("illegal state transition for plugin '{plugin}': {from:?} -> {to:?}")]
    IllegalStateTransition {
        plugin: String,
        from: PluginState,
        to: PluginState,
    },

    /// More than one unresolved conflict survived strategy application.
    /// Carries every one of them, rendered, so a caller can report the full
    /// set without re-running resolution to find what else was wrong.
    #[error("resolution failed with {} unresolved conflict(s):\n{}", .conflicts.len(), .conflicts.join("\n"))]
    ResolutionFailed { conflicts: Vec<String> },
}
