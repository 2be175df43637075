//! The [`Plugin`] trait every in-process plugin implements, the keyed
//! [`ApiMap`] bag used for extension payloads, and a fluent [`PluginBuilder`]
//! for constructing plugins from closures without a bespoke struct per
//! plugin.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::plugin_system::dependency::PluginDependency;
use crate::plugin_system::entity::{ApiSurface, DependencyContext};
use crate::plugin_system::version::Version;

pub type SetupError = Box<dyn std::error::Error + Send + Sync>;

/// A keyed bag of typed values a plugin or extension publishes. Distinct
/// from [`ApiSurface`]: an `ApiMap` is the value an extension callback
/// *returns* (to be merged into a target), while `ApiSurface` is the
/// already-installed state a kernel holds for a plugin.
#[derive(Debug, Default)]
pub struct ApiMap {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ApiMap {
    pub fn new() -> Self {
        ApiMap { values: HashMap::new() }
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.values.insert(key.into(), Arc::new(value));
        self
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub(crate) fn into_inner(self) -> HashMap<String, Arc<dyn Any + Send + Sync>> {
        self.values
    }
}

impl From<ApiSurface> for ApiMap {
    fn from(surface: ApiSurface) -> Self {
        let mut map = ApiMap::new();
        for key in surface.keys().map(|k| k.to_string()).collect::<Vec<_>>() {
            if let Some(value) = surface.get_raw(&key) {
                map.values.insert(key, value);
            }
        }
        map
    }
}

/// A cross-plugin extension: bundled with plugin `P`, applied against the
/// published API of `target` once both `P` and `target` have initialized.
pub struct PluginExtension {
    pub target: String,
    pub callback: Box<dyn Fn(&ApiSurface) -> ApiMap + Send + Sync>,
}

/// Core trait every in-process plugin implements.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique, stable name matching `^[a-z][a-z0-9-]*$`.
    fn name(&self) -> &str;

    /// Semantic version of this plugin instance.
    fn version(&self) -> &Version;

    /// Declared dependencies on other plugins.
    fn dependencies(&self) -> &[PluginDependency] {
        &[]
    }

    /// Extensions this plugin applies to other plugins' published APIs,
    /// once this plugin and the target have both initialized.
    fn extensions(&self) -> &[PluginExtension] {
        &[]
    }

    /// Builds this plugin's exported API. The returned `ApiSurface` becomes
    /// reachable through the kernel under this plugin's name.
    async fn setup(&self, ctx: DependencyContext<'_>) -> Result<ApiSurface, SetupError>;

    /// Tears down any resources held by this plugin. Default: a no-op.
    async fn destroy(&self) -> Result<(), SetupError> {
        Ok(())
    }
}

type SetupFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = Result<ApiSurface, SetupError>> + Send + 'a>>;
type DestroyFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), SetupError>> + Send>>;
type SetupFn = Box<dyn for<'a> Fn(DependencyContext<'a>) -> SetupFuture<'a> + Send + Sync>;
type DestroyFn = Box<dyn Fn() -> DestroyFuture + Send + Sync>;

/// A plugin assembled from closures, for tests and small plugins that do
/// not warrant a bespoke struct: `plugin(name, version).setup(fn)
/// .depends_on(name, constraint).extend(target, fn).on_destroy(fn).build()`.
pub struct PluginBuilder {
    name: String,
    version: Version,
    dependencies: Vec<PluginDependency>,
    extensions: Vec<PluginExtension>,
    setup_fn: Option<SetupFn>,
    destroy_fn: Option<DestroyFn>,
}

pub fn plugin(name: impl Into<String>, version: Version) -> PluginBuilder {
    PluginBuilder {
        name: name.into(),
        version,
        dependencies: Vec::new(),
        extensions: Vec::new(),
        setup_fn: None,
        destroy_fn: None,
    }
}

impl PluginBuilder {
    pub fn depends_on(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn extend(
        mut self,
        target: impl Into<String>,
        callback: impl Fn(&ApiSurface) -> ApiMap + Send + Sync + 'static,
    ) -> Self {
        self.extensions.push(PluginExtension { target: target.into(), callback: Box::new(callback) });
        self
    }

    pub fn setup<F, Fut>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(DependencyContext<'a>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<ApiSurface, SetupError>> + Send + 'static,
    {
        self.setup_fn = Some(Box::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    pub fn on_destroy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), SetupError>> + Send + 'static,
    {
        self.destroy_fn = Some(Box::new(move || Box::pin(f())));
        self
    }

    pub fn build(self) -> Arc<dyn Plugin> {
        Arc::new(ClosurePlugin {
            name: self.name,
            version: self.version,
            dependencies: self.dependencies,
            extensions: self.extensions,
            setup_fn: self.setup_fn,
            destroy_fn: self.destroy_fn,
        })
    }
}

struct ClosurePlugin {
    name: String,
    version: Version,
    dependencies: Vec<PluginDependency>,
    extensions: Vec<PluginExtension>,
    setup_fn: Option<SetupFn>,
    destroy_fn: Option<DestroyFn>,
}

#[async_trait]
impl Plugin for ClosurePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn dependencies(&self) -> &[PluginDependency] {
        &self.dependencies
    }

    fn extensions(&self) -> &[PluginExtension] {
        &self.extensions
    }

    async fn setup(&self, ctx: DependencyContext<'_>) -> Result<ApiSurface, SetupError> {
        match &self.setup_fn {
            Some(f) => f(ctx).await,
            None => Ok(ApiSurface::new()),
        }
    }

    async fn destroy(&self) -> Result<(), SetupError> {
        match &self.destroy_fn {
            Some(f) => f().await,
            None => Ok(()),
        }
    }
}
