//! Plugin identity, the lifecycle state machine, and the dependency context
//! handed to a plugin's `setup`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::{ApiMap, Plugin};
use crate::plugin_system::version::Version;

/// Lifecycle state of a single plugin instance within a kernel.
///
/// ```text
/// registered -> initializing -> initialized -> destroying -> destroyed
///                ^_________|                    ^__________|
///          (setup failure)               (destroy failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    Registered,
    Initializing,
    Initialized,
    Destroying,
    Destroyed,
}

impl PluginState {
    fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;
        matches!(
            (self, next),
            (Registered, Initializing)
                | (Initializing, Initialized)
                | (Initializing, Registered)
                | (Initialized, Destroying)
                | (Destroying, Destroyed)
                | (Destroying, Initialized)
        )
    }
}

/// An initialized plugin's exported API, keyed for lookup by dependents and
/// mergeable by the extension engine. The kernel never interprets the
/// values; they are opaque payloads downcast by callers who know the type
/// a given plugin publishes under a given key.
#[derive(Debug, Default, Clone)]
pub struct ApiSurface {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ApiSurface {
    pub fn new() -> Self {
        ApiSurface { values: HashMap::new() }
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    pub fn insert_any(&mut self, key: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.values.insert(key.into(), value);
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_raw(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.values.get(key).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Shallow-merges `other` into `self`: keys present in `other` overwrite
    /// this surface's keys; keys unique to `self` are preserved.
    pub fn merge_overwrite(&mut self, other: ApiMap) {
        for (key, value) in other.into_inner() {
            self.values.insert(key, value);
        }
    }
}

/// The record passed to a plugin's `setup`: its declared dependencies'
/// already-resolved APIs, plus a handle to look up any already-initialized
/// plugin by name.
pub struct DependencyContext<'a> {
    plugins: HashMap<String, ApiSurface>,
    kernel_lookup: Box<dyn Fn(&str) -> Option<ApiSurface> + 'a>,
}

impl<'a> DependencyContext<'a> {
    pub fn new(
        plugins: HashMap<String, ApiSurface>,
        kernel_lookup: Box<dyn Fn(&str) -> Option<ApiSurface> + 'a>,
    ) -> Self {
        DependencyContext { plugins, kernel_lookup }
    }

    /// Returns the API of a declared dependency by name. Dependencies not
    /// declared by the owning plugin are not reachable here.
    pub fn dependency(&self, name: &str) -> Option<&ApiSurface> {
        self.plugins.get(name)
    }

    /// Typed accessor over a declared dependency's API surface.
    pub fn get<T: Any + Send + Sync>(&self, name: &str, key: &str) -> Option<&T> {
        self.plugins.get(name).and_then(|api| api.get::<T>(key))
    }

    /// Resolves any already-initialized plugin by name, declared or not.
    /// Returns `None` if the plugin does not exist or has not yet
    /// initialized.
    pub fn kernel_get(&self, name: &str) -> Option<ApiSurface> {
        (self.kernel_lookup)(name)
    }
}

/// Opaque identity of one plugin instance within a build. Distinct from
/// `PluginName` in spec: a build cannot register two plugins under the same
/// name (rejected at `validate_plugins` time), so the id is derived from the
/// name rather than generated independently — it exists as its own type so
/// callers don't conflate "the name a plugin publishes its API under" with
/// "the instance identity", even though the two happen to coincide here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginId(String);

impl PluginId {
    fn from_name(name: &str) -> Self {
        PluginId(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single plugin's identity, declaration, and mutable lifecycle state
/// inside a kernel.
pub struct PluginEntity {
    pub id: PluginId,
    pub name: String,
    pub version: Version,
    plugin: Arc<dyn Plugin>,
    state: PluginState,
    api: Option<ApiSurface>,
    last_error: Option<String>,
}

impl PluginEntity {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        PluginEntity {
            id: PluginId::from_name(plugin.name()),
            name: plugin.name().to_string(),
            version: plugin.version().clone(),
            plugin,
            state: PluginState::Registered,
            api: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> &PluginId {
        &self.id
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn api(&self) -> Option<&ApiSurface> {
        self.api.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    fn transition(&mut self, next: PluginState) -> Result<(), PluginSystemError> {
        if !self.state.can_transition_to(next) {
            return Err(PluginSystemError::IllegalStateTransition {
                plugin: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Legal only from `Registered`. On success transitions to
    /// `Initialized` and stores the returned API; on failure reverts to
    /// `Registered` and records `last_error`.
    pub async fn initialize(&mut self, ctx: DependencyContext<'_>) -> Result<(), PluginSystemError> {
        self.transition(PluginState::Initializing)?;
        log::debug!("plugin '{}': registered -> initializing", self.name);

        match self.plugin.setup(ctx).await {
            Ok(api) => {
                self.api = Some(api);
                self.transition(PluginState::Initialized)?;
                log::debug!("plugin '{}': initializing -> initialized", self.name);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.last_error = Some(message.clone());
                self.transition(PluginState::Registered)?;
                log::debug!("plugin '{}': initializing -> registered (setup failed)", self.name);
                Err(PluginSystemError::PluginSetupFailed {
                    plugin: self.name.clone(),
                    message,
                    source: Some(e),
                })
            }
        }
    }

    /// Legal only from `Initialized`.
    pub fn set_extended_api(&mut self, extension: ApiMap) -> Result<(), PluginSystemError> {
        if self.state != PluginState::Initialized {
            return Err(PluginSystemError::IllegalStateTransition {
                plugin: self.name.clone(),
                from: self.state,
                to: self.state,
            });
        }
        let surface = self.api.get_or_insert_with(ApiSurface::new);
        surface.merge_overwrite(extension);
        Ok(())
    }

    /// Legal only from `Initialized`. On success transitions to
    /// `Destroyed`; on failure reverts to `Initialized`.
    pub async fn destroy(&mut self) -> Result<(), PluginSystemError> {
        self.transition(PluginState::Destroying)?;
        log::debug!("plugin '{}': initialized -> destroying", self.name);

        match self.plugin.destroy().await {
            Ok(()) => {
                self.transition(PluginState::Destroyed)?;
                log::debug!("plugin '{}': destroying -> destroyed", self.name);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.last_error = Some(message.clone());
                self.transition(PluginState::Initialized)?;
                log::error!("plugin '{}': destroy failed, reverted to initialized", self.name);
                Err(PluginSystemError::PluginDestroyFailed {
                    plugin: self.name.clone(),
                    message,
                    source: Some(e),
                })
            }
        }
    }
}
