//! Kernel configuration: the full option set from spec §6, with the
//! defaults `KernelBuilder::with_config` merges partial overrides into.

use crate::kernel::constants::DEFAULT_MAX_INITIALIZATION_TIME_MS;
use crate::resolver::ResolutionStrategy;

/// Verbosity the kernel logs its own lifecycle at. Does not gate which
/// `log` macro call sites exist — it is advisory metadata a caller's
/// logger implementation may use to filter; the crate always logs through
/// the `log` facade regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// `{strictVersioning, allowCircularDependencies, maxInitializationTime,
/// enableExtensions, logLevel, autoGlobal, maxPlugins, maxDependencyDepth}`
/// from spec §6, with the defaults spec §4.9 names.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub auto_global: bool,
    pub strict_versioning: bool,
    pub allow_circular_dependencies: bool,
    pub max_initialization_time_ms: u64,
    pub enable_extensions: bool,
    pub log_level: LogLevel,
    pub max_plugins: Option<usize>,
    pub max_dependency_depth: Option<usize>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            auto_global: false,
            strict_versioning: true,
            allow_circular_dependencies: false,
            max_initialization_time_ms: DEFAULT_MAX_INITIALIZATION_TIME_MS,
            enable_extensions: true,
            log_level: LogLevel::Info,
            max_plugins: None,
            max_dependency_depth: None,
        }
    }
}

impl KernelConfig {
    /// The [`ResolutionStrategy`] `strict_versioning` implies. Per spec §6,
    /// `strictVersioning` affects only whether version conflicts are fatal —
    /// missing-optional dependencies always warn rather than fail, which is
    /// `auto`'s and `permissive`'s shared behavior for that conflict kind,
    /// not `strict`'s (strict fails on *any* missing target, optional or
    /// not). So the boolean only chooses between `auto` (version conflicts
    /// fatal) and `permissive` (version conflicts downgrade to a warning);
    /// `strict` itself has no config-level trigger and is reachable only by
    /// calling the resolver facade directly.
    pub fn resolution_strategy(&self) -> ResolutionStrategy {
        if self.strict_versioning {
            ResolutionStrategy::Auto
        } else {
            ResolutionStrategy::Permissive
        }
    }
}

/// A partial override merged into a base [`KernelConfig`] by
/// `KernelBuilder::with_config`; unset fields leave the base untouched.
#[derive(Debug, Clone, Default)]
pub struct PartialKernelConfig {
    pub auto_global: Option<bool>,
    pub strict_versioning: Option<bool>,
    pub allow_circular_dependencies: Option<bool>,
    pub max_initialization_time_ms: Option<u64>,
    pub enable_extensions: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub max_plugins: Option<usize>,
    pub max_dependency_depth: Option<usize>,
}

impl KernelConfig {
    pub fn merge(mut self, partial: PartialKernelConfig) -> Self {
        if let Some(v) = partial.auto_global {
            self.auto_global = v;
        }
        if let Some(v) = partial.strict_versioning {
            self.strict_versioning = v;
        }
        if let Some(v) = partial.allow_circular_dependencies {
            self.allow_circular_dependencies = v;
        }
        if let Some(v) = partial.max_initialization_time_ms {
            self.max_initialization_time_ms = v;
        }
        if let Some(v) = partial.enable_extensions {
            self.enable_extensions = v;
        }
        if let Some(v) = partial.log_level {
            self.log_level = v;
        }
        if partial.max_plugins.is_some() {
            self.max_plugins = partial.max_plugins;
        }
        if partial.max_dependency_depth.is_some() {
            self.max_dependency_depth = partial.max_dependency_depth;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = KernelConfig::default();
        assert!(cfg.strict_versioning);
        assert!(!cfg.allow_circular_dependencies);
        assert!(cfg.enable_extensions);
        assert_eq!(cfg.max_initialization_time_ms, 30_000);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn merge_only_overrides_set_fields() {
        let cfg = KernelConfig::default().merge(PartialKernelConfig {
            strict_versioning: Some(false),
            ..Default::default()
        });
        assert!(!cfg.strict_versioning);
        assert!(cfg.enable_extensions);
    }

    #[test]
    fn strict_versioning_selects_auto_strategy() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.resolution_strategy(), ResolutionStrategy::Auto);
        let lenient = cfg.merge(PartialKernelConfig { strict_versioning: Some(false), ..Default::default() });
        assert_eq!(lenient.resolution_strategy(), ResolutionStrategy::Permissive);
    }
}
