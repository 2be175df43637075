//! Built kernel (C10): runs ordered initialization, injects dependency
//! contexts, and exposes the live plugin lookups.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::kernel::config::KernelConfig;
use crate::kernel::constants::API_VERSION;
use crate::kernel::error::{KernelError, Result};
use crate::kernel::global;
use crate::plugin_system::entity::{ApiSurface, DependencyContext, PluginEntity, PluginState};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::extension::{apply_extensions, validate_extensions, DEFAULT_EXTENSION_TIMEOUT};
use crate::plugin_system::traits::Plugin;
use crate::resolver;
use crate::resolver::topo::OrderHint;

/// Per-registration override accepted by `KernelBuilder::use_plugin`: the
/// topological sorter's `priority` tie-break, plus auxiliary `before`/`after`
/// ordering hints (spec §4.4) naming other plugins this one must load before
/// or after, independent of any dependency edge between them.
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    pub priority: i64,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub plugin: Arc<dyn Plugin>,
    pub options: PluginOptions,
}

/// Lifecycle state of a kernel instance, distinct from a single plugin's
/// [`PluginState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Built,
    Initialized,
    Destroyed,
}

/// A read-only snapshot of a kernel's shape, returned by `Kernel::metadata`
/// and the value published to `kernel::global` under `auto_global`.
#[derive(Debug, Clone)]
pub struct KernelMetadata {
    pub plugin_count: usize,
    pub load_order: Vec<String>,
    pub api_version: &'static str,
}

/// Plugins and configuration accumulated by `KernelBuilder::build`, not yet
/// initialized.
pub struct BuiltKernel {
    pub(crate) registrations: Vec<Registration>,
    pub(crate) config: KernelConfig,
    pub(crate) context: std::collections::BTreeMap<String, Value>,
}

impl BuiltKernel {
    /// Resolves load order, then initializes every plugin in that order,
    /// layering extensions as each plugin comes up. On any failure, plugins
    /// already initialized are destroyed in reverse order before the fatal
    /// error is returned.
    pub async fn init(self) -> Result<Kernel> {
        let BuiltKernel { registrations, config, context } = self;

        if let Some(max) = config.max_plugins {
            if registrations.len() > max {
                return Err(KernelError::TooManyPlugins { actual: registrations.len(), max });
            }
        }

        let plugins: Vec<Arc<dyn Plugin>> = registrations.iter().map(|r| r.plugin.clone()).collect();

        if let Some(max_depth) = config.max_dependency_depth {
            let depth = max_dependency_depth(&plugins);
            if depth > max_depth {
                return Err(KernelError::DependencyTooDeep { actual: depth, max: max_depth });
            }
        }

        if config.enable_extensions {
            validate_extensions(&plugins).map_err(KernelError::PluginSystem)?;
        }

        let priorities: HashMap<String, i64> =
            registrations.iter().map(|r| (r.plugin.name().to_string(), r.options.priority)).collect();

        let hints: Vec<OrderHint> = registrations
            .iter()
            .flat_map(|r| {
                let plugin = r.plugin.name().to_string();
                let before = r.options.before.iter().map(move |other| OrderHint::Before { plugin: plugin.clone(), other: other.clone() });
                let plugin = r.plugin.name().to_string();
                let after = r.options.after.iter().map(move |other| OrderHint::After { plugin: plugin.clone(), other: other.clone() });
                before.chain(after)
            })
            .collect();

        let resolution = resolver::resolve(
            &plugins,
            config.resolution_strategy(),
            &context,
            config.allow_circular_dependencies,
            &priorities,
            &hints,
        )
        .map_err(KernelError::PluginSystem)?;

        for warning in &resolution.warnings {
            log::warn!("{warning}");
        }

        let plugin_by_name: HashMap<String, Arc<dyn Plugin>> =
            plugins.iter().map(|p| (p.name().to_string(), p.clone())).collect();

        let mut entities: HashMap<String, PluginEntity> =
            plugin_by_name.values().map(|p| (p.name().to_string(), PluginEntity::new(p.clone()))).collect();

        let deadline = Duration::from_millis(config.max_initialization_time_ms);
        let mut initialized_order: Vec<String> = Vec::new();

        for name in &resolution.order {
            // an unresolved optional dependency that was never actually
            // registered still appears in synthetic graph bookkeeping, but
            // never as a real plugin to initialize.
            let Some(plugin) = plugin_by_name.get(name).cloned() else {
                continue;
            };

            let declared: HashMap<String, ApiSurface> = plugin
                .dependencies()
                .iter()
                .filter_map(|dep| entities.get(dep.target.as_str()).and_then(|e| e.api().cloned()).map(|api| (dep.target.clone(), api)))
                .collect();

            let snapshot: HashMap<String, ApiSurface> =
                entities.iter().filter_map(|(n, e)| e.api().cloned().map(|api| (n.clone(), api))).collect();
            let ctx = DependencyContext::new(declared, Box::new(move |n: &str| snapshot.get(n).cloned()));

            let entity = entities.get_mut(name.as_str()).expect("entity registered for every resolved name");

            let init_result = timeout(deadline, entity.initialize(ctx)).await;

            match init_result {
                Ok(Ok(())) => {
                    initialized_order.push(name.clone());
                    log::info!("plugin '{name}' initialized");
                }
                Ok(Err(e)) => {
                    rollback(&mut entities, &initialized_order, deadline).await;
                    return Err(KernelError::InitializationFailed {
                        initialized_count: initialized_order.len(),
                        source: Box::new(KernelError::PluginSystem(e)),
                    });
                }
                Err(_) => {
                    log::error!("plugin '{name}' timed out during setup");
                    let timeout_err = PluginSystemError::PluginTimeout { plugin: name.clone(), elapsed: deadline };
                    rollback(&mut entities, &initialized_order, deadline).await;
                    return Err(KernelError::InitializationFailed {
                        initialized_count: initialized_order.len(),
                        source: Box::new(KernelError::PluginSystem(timeout_err)),
                    });
                }
            }

            if config.enable_extensions {
                if let Err(e) = apply_extensions(&plugin, &mut entities, DEFAULT_EXTENSION_TIMEOUT).await {
                    rollback(&mut entities, &initialized_order, deadline).await;
                    return Err(KernelError::InitializationFailed {
                        initialized_count: initialized_order.len(),
                        source: Box::new(KernelError::PluginSystem(e)),
                    });
                }
            }
        }

        let kernel = Kernel { entities, order: initialized_order, state: KernelState::Initialized, config };

        if kernel.config.auto_global {
            global::publish(kernel.metadata());
        }

        Ok(kernel)
    }
}

async fn rollback(entities: &mut HashMap<String, PluginEntity>, order: &[String], deadline: Duration) {
    for name in order.iter().rev() {
        if let Some(entity) = entities.get_mut(name.as_str()) {
            if entity.state() != PluginState::Initialized {
                continue;
            }
            match timeout(deadline, entity.destroy()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("rollback: plugin '{name}' failed to destroy: {e}"),
                Err(_) => log::error!("rollback: plugin '{name}' destroy timed out"),
            }
        }
    }
}

/// Longest chain of declared dependency edges reachable from any plugin.
/// Cycle-safe: a node already on the current path contributes depth zero
/// rather than recursing forever — a true cycle is fatal later in
/// `resolver::resolve`, this check only needs to not hang.
fn max_dependency_depth(plugins: &[Arc<dyn Plugin>]) -> usize {
    let edges: HashMap<&str, Vec<&str>> =
        plugins.iter().map(|p| (p.name(), p.dependencies().iter().map(|d| d.target.as_str()).collect())).collect();

    fn depth<'a>(
        name: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        visiting: &mut HashSet<&'a str>,
        memo: &mut HashMap<&'a str, usize>,
    ) -> usize {
        if let Some(&d) = memo.get(name) {
            return d;
        }
        if !visiting.insert(name) {
            return 0;
        }
        let d = edges
            .get(name)
            .map(|targets| targets.iter().map(|t| 1 + depth(t, edges, visiting, memo)).max().unwrap_or(0))
            .unwrap_or(0);
        visiting.remove(name);
        memo.insert(name, d);
        d
    }

    let mut memo = HashMap::new();
    plugins.iter().map(|p| depth(p.name(), &edges, &mut HashSet::new(), &mut memo)).max().unwrap_or(0)
}

/// The live kernel: every plugin initialized, APIs reachable by name.
pub struct Kernel {
    entities: HashMap<String, PluginEntity>,
    order: Vec<String>,
    state: KernelState,
    config: KernelConfig,
}

impl Kernel {
    /// The current API published under `name`, or `PluginNotFound`.
    pub fn get(&self, name: &str) -> Result<ApiSurface> {
        self.entities
            .get(name)
            .and_then(|e| e.api().cloned())
            .ok_or_else(|| KernelError::PluginNotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.entities.get(name).map(|e| e.state() == PluginState::Initialized).unwrap_or(false)
    }

    /// The live name -> API mapping for every initialized plugin.
    pub fn plugins(&self) -> HashMap<String, ApiSurface> {
        self.entities.iter().filter_map(|(n, e)| e.api().cloned().map(|api| (n.clone(), api))).collect()
    }

    pub fn state(&self) -> KernelState {
        self.state
    }

    pub fn metadata(&self) -> KernelMetadata {
        KernelMetadata {
            plugin_count: self.entities.len(),
            load_order: self.order.clone(),
            api_version: API_VERSION,
        }
    }

    /// Walks the reverse of the load order, destroying each plugin with the
    /// same per-plugin deadline `init` used. Failures are collected but do
    /// not stop the walk.
    pub async fn destroy(&mut self) -> Result<()> {
        let deadline = Duration::from_millis(self.config.max_initialization_time_ms);
        let mut failures = Vec::new();

        let order = self.order.clone();
        for name in order.iter().rev() {
            let Some(entity) = self.entities.get_mut(name.as_str()) else { continue };
            if entity.state() != PluginState::Initialized {
                continue;
            }
            match timeout(deadline, entity.destroy()).await {
                Ok(Ok(())) => log::info!("plugin '{name}' destroyed"),
                Ok(Err(e)) => {
                    log::error!("plugin '{name}' failed to destroy: {e}");
                    failures.push(e);
                }
                Err(_) => {
                    log::error!("plugin '{name}' destroy timed out");
                    failures.push(PluginSystemError::PluginTimeout { plugin: name.clone(), elapsed: deadline });
                }
            }
        }

        self.state = KernelState::Destroyed;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(KernelError::DestroyFailed { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::config::KernelConfig;
    use crate::plugin_system::dependency::PluginDependency;
    use crate::plugin_system::traits::plugin;
    use crate::plugin_system::version::{Version, VersionConstraint};

    fn built(registrations: Vec<Registration>, config: KernelConfig) -> BuiltKernel {
        BuiltKernel { registrations, config, context: Default::default() }
    }

    #[tokio::test]
    async fn initializes_linear_chain_and_publishes_apis() {
        let a = plugin("a", Version::new(1, 0, 0))
            .setup(|_ctx| async {
                let mut api = ApiSurface::new();
                api.insert("value", 1u32);
                Ok(api)
            })
            .build();
        let b = plugin("b", Version::new(1, 0, 0))
            .depends_on(PluginDependency::required("a", VersionConstraint::parse("^1.0.0").unwrap()))
            .setup(|ctx| async move {
                let mut api = ApiSurface::new();
                let upstream = ctx.get::<u32>("a", "value").copied().unwrap_or(0);
                api.insert("value", upstream + 1);
                Ok(api)
            })
            .build();

        let kernel = built(
            vec![
                Registration { plugin: a, options: PluginOptions::default() },
                Registration { plugin: b, options: PluginOptions::default() },
            ],
            KernelConfig::default(),
        )
        .init()
        .await
        .unwrap();

        assert_eq!(kernel.state(), KernelState::Initialized);
        assert!(kernel.has("a"));
        assert!(kernel.has("b"));
        assert_eq!(kernel.get("b").unwrap().get::<u32>("value"), Some(&2));
    }

    #[tokio::test]
    async fn missing_plugin_reports_not_found() {
        let kernel = built(vec![], KernelConfig::default()).init().await.unwrap();
        assert!(matches!(kernel.get("ghost"), Err(KernelError::PluginNotFound(_))));
    }

    #[tokio::test]
    async fn setup_failure_rolls_back_already_initialized_plugins() {
        let a = plugin("a", Version::new(1, 0, 0))
            .setup(|_ctx| async { Ok(ApiSurface::new()) })
            .on_destroy(|| async { Ok(()) })
            .build();
        let b = plugin("b", Version::new(1, 0, 0))
            .depends_on(PluginDependency::required("a", VersionConstraint::parse("^1.0.0").unwrap()))
            .setup(|_ctx| async { Err("boom".into()) })
            .build();

        let err = built(
            vec![
                Registration { plugin: a, options: PluginOptions::default() },
                Registration { plugin: b, options: PluginOptions::default() },
            ],
            KernelConfig::default(),
        )
        .init()
        .await
        .unwrap_err();

        assert!(matches!(err, KernelError::InitializationFailed { initialized_count: 1, .. }));
    }

    #[tokio::test]
    async fn destroy_walks_reverse_order() {
        let a = plugin("a", Version::new(1, 0, 0))
            .setup(|_ctx| async { Ok(ApiSurface::new()) })
            .build();
        let b = plugin("b", Version::new(1, 0, 0))
            .depends_on(PluginDependency::required("a", VersionConstraint::parse("^1.0.0").unwrap()))
            .setup(|_ctx| async { Ok(ApiSurface::new()) })
            .build();

        let mut kernel = built(
            vec![
                Registration { plugin: a, options: PluginOptions::default() },
                Registration { plugin: b, options: PluginOptions::default() },
            ],
            KernelConfig::default(),
        )
        .init()
        .await
        .unwrap();

        kernel.destroy().await.unwrap();
        assert_eq!(kernel.state(), KernelState::Destroyed);
        assert!(!kernel.has("a"));
        assert!(!kernel.has("b"));
    }
}
