//! Kernel-level errors: everything the plugin system can raise, plus the
//! kernel's own build/init/destroy and not-found/already-initialized
//! failures.

use std::result::Result as StdResult;

use thiserror::Error;

use crate::plugin_system::error::PluginSystemError;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    #[error("kernel is not initialized")]
    KernelNotInitialized,

    #[error("kernel is already initialized")]
    KernelAlreadyInitialized,

    #[error("plugin '{0}' not found")]
    PluginNotFound(String),

    #[error("build rejected: plugin count {actual} exceeds max_plugins {max}")]
    TooManyPlugins { actual: usize, max: usize },

    #[error("build rejected: dependency depth {actual} exceeds max_dependency_depth {max}")]
    DependencyTooDeep { actual: usize, max: usize },

    #[error("initialization failed after {initialized_count} plugin(s) initialized; rolled back")]
    InitializationFailed {
        initialized_count: usize,
        #[source]
        source: Box<KernelError>,
    },

    #[error("destroy completed with {} failure(s)", .failures.len())]
    DestroyFailed { failures: Vec<PluginSystemError> },

    #[error("{0}")]
    Other(String),
}

impl KernelError {
    /// A short, pure-function suggestion for rendering to a user — the
    /// only place "what to do about it" text lives, never a virtual method
    /// on the error itself.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            KernelError::PluginSystem(PluginSystemError::MissingDependency { .. }) => {
                Some("register the missing plugin or mark the dependency optional")
            }
            KernelError::PluginSystem(PluginSystemError::VersionConflict { .. }) => {
                Some("align the conflicting version constraints or relax strict_versioning")
            }
            KernelError::PluginSystem(PluginSystemError::CircularDependency { .. }) => {
                Some("break the cycle or mark one of its edges optional")
            }
            KernelError::PluginSystem(PluginSystemError::PluginTimeout { .. }) => {
                Some("raise max_initialization_time or speed up the plugin's setup")
            }
            KernelError::KernelNotInitialized => Some("call init() on the built kernel before using it"),
            KernelError::KernelAlreadyInitialized => Some("build a fresh kernel rather than reusing an initialized one"),
            _ => None,
        }
    }
}

pub type Result<T> = StdResult<T, KernelError>;
