use std::path::PathBuf;

use crate::ConfigError;

/// A path-plugin reference parsed from `PVS_PLUGINS`.
///
/// The original service dynamically loads a Python source file and pulls a
/// named callable out of it. In a statically compiled target this can't
/// work the same way (spec.md §9): a `PluginSpec` only records what was
/// asked for, so it can be logged and matched against the plugins that
/// were actually linked into the binary via [`pvs_core::plugin::PathPlugin`]
/// implementations. An entry with no matching linked plugin is a startup
/// error, not a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    pub module: PathBuf,
    pub symbol: String,
}

/// Parses the semicolon-separated `file.py:symbol` list from `PVS_PLUGINS`.
pub fn parse_plugins(raw: &str) -> Result<Vec<PluginSpec>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (module, symbol) = entry
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::InvalidPlugin(entry.to_string()))?;
            if module.is_empty() || symbol.is_empty() {
                return Err(ConfigError::InvalidPlugin(entry.to_string()));
            }
            Ok(PluginSpec {
                module: PathBuf::from(module),
                symbol: symbol.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_entries() {
        let specs = parse_plugins("plugins/proxy.py:handler;plugins/smartfile.py:handler").unwrap();
        assert_eq!(
            specs,
            vec![
                PluginSpec { module: PathBuf::from("plugins/proxy.py"), symbol: "handler".into() },
                PluginSpec { module: PathBuf::from("plugins/smartfile.py"), symbol: "handler".into() },
            ]
        );
    }

    #[test]
    fn empty_string_yields_no_plugins() {
        assert!(parse_plugins("").unwrap().is_empty());
    }

    #[test]
    fn rejects_missing_symbol() {
        assert!(parse_plugins("plugins/proxy.py").is_err());
    }
}
