//! Path plugins: a statically linked stand-in for the original service's
//! dynamically loaded `PVS_PLUGINS` modules (spec.md §9, `pvs_config::PluginSpec`).
//!
//! The original loads an arbitrary Python source file at startup and
//! pulls a named callable out of it to resolve custom URL patterns into
//! local paths (smart-file links, internal proxy references). A
//! statically compiled binary can't load arbitrary code at runtime, so a
//! `PathPlugin` here is a compiled-in trait object matched against the
//! `PluginSpec` list read from configuration: an entry with no matching
//! linked plugin is a startup error rather than a silent no-op.

use async_trait::async_trait;

use crate::error::Result;

/// What a plugin resolved a request into: a local path to treat as the
/// source, and the origin string used for cache-key purposes.
pub struct ResolvedPath {
    pub path: std::path::PathBuf,
    pub origin: String,
}

#[async_trait]
pub trait PathPlugin: Send + Sync {
    /// Matches [`pvs_config::PluginSpec::module`] so a linked plugin can
    /// be paired with its configuration entry.
    fn module(&self) -> &str;

    /// Matches [`pvs_config::PluginSpec::symbol`].
    fn symbol(&self) -> &str;

    async fn resolve(&self, reference: &str) -> Result<ResolvedPath>;
}

/// Pairs configured [`pvs_config::PluginSpec`]s with the plugins actually
/// linked into this binary, failing fast on any configured spec with no
/// match.
pub fn bind_plugins(
    specs: &[pvs_config::PluginSpec],
    available: Vec<Box<dyn PathPlugin>>,
) -> Result<Vec<Box<dyn PathPlugin>>> {
    let mut bound = Vec::with_capacity(specs.len());
    for spec in specs {
        let module = spec.module.to_string_lossy();
        let found = available
            .iter()
            .position(|p| p.module() == module && p.symbol() == spec.symbol);
        match found {
            Some(_) => {}
            None => {
                return Err(crate::error::MediaError::internal(format!(
                    "configured plugin {}:{} has no matching linked implementation",
                    module, spec.symbol
                )))
            }
        }
    }
    for plugin in available {
        bound.push(plugin);
    }
    Ok(bound)
}
