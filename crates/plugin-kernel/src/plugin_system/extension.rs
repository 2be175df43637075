//! Applies a plugin's declared extensions onto the already-installed API
//! surfaces of their targets.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::timeout;

use crate::plugin_system::entity::PluginEntity;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Plugin;

pub const DEFAULT_EXTENSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Rejects self-extension and cyclic extension chains across the whole
/// plugin set, before any plugin initializes. Call once at build time.
pub fn validate_extensions(plugins: &[std::sync::Arc<dyn Plugin>]) -> Result<(), PluginSystemError> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();

    for plugin in plugins {
        for ext in plugin.extensions() {
            if ext.target == plugin.name() {
                return Err(PluginSystemError::SelfExtension { plugin: plugin.name().to_string() });
            }
            edges.entry(plugin.name()).or_default().push(ext.target.as_str());
        }
    }

    for plugin in plugins {
        if let Some(cycle) = find_cycle_from(plugin.name(), &edges) {
            return Err(PluginSystemError::CyclicExtension { cycle });
        }
    }

    Ok(())
}

fn find_cycle_from(start: &str, edges: &HashMap<&str, Vec<&str>>) -> Option<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();

    fn dfs<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        path: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if path.contains(&node) {
            let start_idx = path.iter().position(|n| *n == node).unwrap();
            let mut cycle: Vec<String> = path[start_idx..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visited.contains(node) {
            return None;
        }
        visited.insert(node);
        path.push(node);
        if let Some(targets) = edges.get(node) {
            for target in targets {
                if let Some(cycle) = dfs(target, edges, path, visited) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    dfs(start, edges, &mut path, &mut visited)
}

/// Applies every extension declared by `source` against its already
/// resolved targets. The target must exist and be `Initialized`; per
/// spec this is guaranteed by load order, since a plugin's extensions are
/// applied only after the plugin itself initializes, and dependency
/// declarations guarantee its targets initialized first when the target
/// is also a dependency.
pub async fn apply_extensions(
    source: &std::sync::Arc<dyn Plugin>,
    entities: &mut HashMap<String, PluginEntity>,
    extension_timeout: Duration,
) -> Result<(), PluginSystemError> {
    for ext in source.extensions() {
        let target_surface = entities
            .get(ext.target.as_str())
            .and_then(|e| e.api())
            .ok_or_else(|| PluginSystemError::InvalidExtensionTarget { target: ext.target.clone() })?
            .clone();

        let callback = &ext.callback;
        let produced = timeout(extension_timeout, async { callback(&target_surface) })
            .await
            .map_err(|_| PluginSystemError::ExtensionFailed {
                source_plugin: source.name().to_string(),
                target: ext.target.clone(),
                message: "extension callback timed out".to_string(),
            })?;

        let target_entity = entities
            .get_mut(ext.target.as_str())
            .ok_or_else(|| PluginSystemError::InvalidExtensionTarget { target: ext.target.clone() })?;
        target_entity.set_extended_api(produced)?;
        log::debug!("plugin '{}' extended '{}'", source.name(), ext.target);
    }
    Ok(())
}
