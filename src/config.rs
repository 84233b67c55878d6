//! Loading `authn.json`: providers, controllers and the route tree.

use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::Path, path::PathBuf, time::Duration};

use crate::policy::{ControllerProtection, ProtectionOptions};
use crate::provider::ProviderConfig;

/// Root of `authn.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    /// Global default for routes that declare nothing
    #[serde(default)]
    pub protected: bool,
    /// Deadline for a whole chain attempt
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Providers in chain order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub controllers: BTreeMap<String, ControllerProtection>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// A route group; groups nest and their prefixes concatenate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub prefix: String,
    #[serde(flatten)]
    pub options: ProtectionOptions,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub method: String,
    pub path: String,
    #[serde(flatten)]
    pub options: ProtectionOptions,
    /// `controller@method` handling this route
    #[serde(default)]
    pub uses: Option<String>,
}

impl AuthSettings {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid configuration in {}: {}", path.display(), e))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Locate `authn.json`: explicit path, `AUTHN_CONFIG`,
/// `$XDG_CONFIG_HOME/unicity-authn/authn.json`, then `./authn.json`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p);
    }

    if let Ok(p) = env::var("AUTHN_CONFIG") {
        return Ok(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("unicity-authn").join("authn.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("authn.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow::anyhow!(
        "Could not find authn.json (set AUTHN_CONFIG or create ./authn.json)"
    ))
}

/// Load settings from the resolved location.
pub fn load_settings(explicit: Option<PathBuf>) -> anyhow::Result<AuthSettings> {
    let path = resolve_config_path(explicit)?;
    tracing::info!("Loading authentication config from {}", path.display());
    AuthSettings::load(&path)
}

/// Replace `${VAR}` with the variable's value; unknown variables stay as-is.
pub(crate) fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}
