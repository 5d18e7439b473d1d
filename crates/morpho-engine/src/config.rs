use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "http://neuromorpho.org/";
const DEFAULT_CACHE_DIR: &str = ".neuromorphocache";

/// What to do with a record whose parent ID matches no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentPolicy {
    /// Fail the whole load with `MalformedRecord`.
    #[default]
    Reject,
    /// Skip the edge and keep the node as a root.
    Drop,
}

/// How out-of-range SWC type codes are handled on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypePolicy {
    /// Keep the code as `NodeType::Unrecognized`.
    #[default]
    Lenient,
    /// Fail with `InvalidType`.
    Strict,
}

/// Options for building a morphology from records or SWC text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub parent_policy: ParentPolicy,
    pub type_policy: TypePolicy,
}

impl LoadOptions {
    pub fn strict() -> Self {
        Self {
            parent_policy: ParentPolicy::Reject,
            type_policy: TypePolicy::Strict,
        }
    }

    pub fn permissive() -> Self {
        Self {
            parent_policy: ParentPolicy::Drop,
            type_policy: TypePolicy::Lenient,
        }
    }
}

/// Remote repository client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub cache_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: PathBuf::from(home).join(DEFAULT_CACHE_DIR),
        }
    }
}

impl ClientConfig {
    /// Read `NEUROMORPHO_BASE_URL` and `NEUROMORPHO_CACHE_PATH`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("NEUROMORPHO_BASE_URL").unwrap_or(defaults.base_url);
        let cache_dir = std::env::var("NEUROMORPHO_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);
        Self { base_url, cache_dir }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_options_default_rejects_dangling_parents() {
        let opts = LoadOptions::default();
        assert_eq!(opts.parent_policy, ParentPolicy::Reject);
        assert_eq!(opts.type_policy, TypePolicy::Lenient);
    }

    #[test]
    fn load_options_deserialize_partial() {
        let opts: LoadOptions = serde_json::from_str(r#"{"parent_policy":"drop"}"#).unwrap();
        assert_eq!(opts.parent_policy, ParentPolicy::Drop);
        assert_eq!(opts.type_policy, TypePolicy::Lenient);
    }

    #[test]
    fn client_config_builders() {
        let cfg = ClientConfig::default()
            .with_base_url("http://localhost:8080/")
            .with_cache_dir("/tmp/nm-cache");
        assert_eq!(cfg.base_url, "http://localhost:8080/");
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/nm-cache"));
    }
}
