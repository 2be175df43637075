//! Kernel builder (C9): accumulates plugins and configuration, validates,
//! and produces a [`BuiltKernel`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::kernel::built::{BuiltKernel, Kernel, PluginOptions, Registration};
use crate::kernel::config::{KernelConfig, LogLevel, PartialKernelConfig};
use crate::kernel::error::{KernelError, Result};
use crate::plugin_system::traits::Plugin;
use crate::resolver::validate_plugins;

/// Accumulates plugins via `use_plugin`/`use_plugins`, configuration via
/// the `with_*` setters; `use` is a reserved word in Rust, hence the
/// `use_plugin` spelling.
pub struct KernelBuilder {
    registrations: Vec<Registration>,
    config: KernelConfig,
    context: BTreeMap<String, Value>,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        KernelBuilder { registrations: Vec::new(), config: KernelConfig::default(), context: BTreeMap::new() }
    }
}

impl KernelBuilder {
    pub fn new() -> Self {
        KernelBuilder::default()
    }

    pub fn use_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.registrations.push(Registration { plugin, options: PluginOptions::default() });
        self
    }

    /// Like `use_plugin` but with a per-plugin `PluginOptions` override: the
    /// topological sorter's tie-break `priority`, and `before`/`after`
    /// ordering hints naming other plugins this one must load before or
    /// after independent of any dependency edge.
    pub fn use_plugin_with_options(mut self, plugin: Arc<dyn Plugin>, options: PluginOptions) -> Self {
        self.registrations.push(Registration { plugin, options });
        self
    }

    pub fn use_plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        for plugin in plugins {
            self = self.use_plugin(plugin);
        }
        self
    }

    pub fn with_config(mut self, partial: PartialKernelConfig) -> Self {
        self.config = self.config.merge(partial);
        self
    }

    pub fn with_strict_versioning(mut self, strict: bool) -> Self {
        self.config.strict_versioning = strict;
        self
    }

    pub fn with_circular_dependencies(mut self, allow: bool) -> Self {
        self.config.allow_circular_dependencies = allow;
        self
    }

    pub fn with_initialization_timeout(mut self, millis: u64) -> Self {
        self.config.max_initialization_time_ms = millis;
        self
    }

    pub fn with_extensions(mut self, enabled: bool) -> Self {
        self.config.enable_extensions = enabled;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    pub fn with_auto_global(mut self, enabled: bool) -> Self {
        self.config.auto_global = enabled;
        self
    }

    /// Condition evaluation context for conditional dependencies; not named
    /// in spec.md's builder surface but required to exercise `Condition` at
    /// all, so exposed here rather than left unreachable.
    pub fn with_context(mut self, context: BTreeMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Validates every plugin (name, version, declared dependencies) and
    /// returns a [`BuiltKernel`] that has not yet initialized anything.
    pub fn build(self) -> Result<BuiltKernel> {
        let plugins: Vec<Arc<dyn Plugin>> = self.registrations.iter().map(|r| r.plugin.clone()).collect();
        validate_plugins(&plugins).map_err(KernelError::PluginSystem)?;

        Ok(BuiltKernel { registrations: self.registrations, config: self.config, context: self.context })
    }

    /// `build().init()`.
    pub async fn start(self) -> Result<Kernel> {
        self.build()?.init().await
    }
}

/// `create_kernel() -> KernelBuilder` — the entry point matching spec.md
/// §6's `createKernel()`.
pub fn create_kernel() -> KernelBuilder {
    KernelBuilder::new()
}

/// A kernel builder preset for production use: strict versioning, no
/// circular dependencies, extensions on.
pub fn create_production_kernel() -> KernelBuilder {
    create_kernel().with_strict_versioning(true).with_circular_dependencies(false).with_log_level(LogLevel::Warn)
}

/// A kernel builder preset for local development: permissive versioning,
/// verbose logging, same extension/circularity defaults otherwise.
pub fn create_development_kernel() -> KernelBuilder {
    create_kernel().with_strict_versioning(false).with_log_level(LogLevel::Debug)
}

/// A kernel builder preset for tests: short initialization timeout so a
/// hung fake plugin fails fast rather than stalling a test suite.
pub fn create_test_kernel() -> KernelBuilder {
    create_kernel().with_strict_versioning(true).with_initialization_timeout(1_000).with_log_level(LogLevel::Debug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_system::entity::ApiSurface;
    use crate::plugin_system::traits::plugin;
    use crate::plugin_system::version::Version;

    #[test]
    fn build_rejects_invalid_plugin_name() {
        let p = plugin("Not-Valid", Version::new(1, 0, 0)).setup(|_ctx| async { Ok(ApiSurface::new()) }).build();
        let err = create_kernel().use_plugin(p).build().unwrap_err();
        assert!(matches!(err, KernelError::PluginSystem(_)));
    }

    #[test]
    fn with_config_overrides_defaults() {
        let builder = create_kernel().with_config(PartialKernelConfig {
            strict_versioning: Some(false),
            ..Default::default()
        });
        assert!(!builder.config.strict_versioning);
    }

    #[tokio::test]
    async fn start_builds_and_initializes_in_one_call() {
        let p = plugin("a", Version::new(1, 0, 0)).setup(|_ctx| async { Ok(ApiSurface::new()) }).build();
        let kernel = create_kernel().use_plugin(p).start().await.unwrap();
        assert!(kernel.has("a"));
    }

    #[test]
    fn production_preset_disallows_circular_dependencies() {
        assert!(!create_production_kernel().config.allow_circular_dependencies);
    }
}
