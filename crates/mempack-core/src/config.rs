//! Configuration loading and validation.
//!
//! Configuration is resolved with the following precedence (highest wins):
//!
//! 1. Environment variables (`MEMPACK_*`)
//! 2. Project config (`<repo>/.mempack/config.toml`)
//! 3. Compiled-in defaults
//!
//! Only the handful of fields the retrieval pipeline actually consumes
//! are modeled here; everything else about a deployment (indexing
//! schedules, UI preferences, and so on) is out of scope for this crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OmniError, OmniResult};

/// Resolved configuration for a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Lexical search fan-out multiplier for memories.
    #[serde(default = "Config::default_memories_k")]
    pub memories_k: usize,

    /// Lexical search fan-out multiplier for chunks.
    #[serde(default = "Config::default_chunks_k")]
    pub chunks_k: usize,

    /// Hard token ceiling for a context pack.
    #[serde(default = "Config::default_token_budget")]
    pub token_budget: usize,

    /// Named tokenizer used when a cost is uncached.
    #[serde(default = "Config::default_tokenizer")]
    pub tokenizer: String,

    /// Workspace used when the caller does not specify one.
    #[serde(default = "Config::default_workspace")]
    pub default_workspace: String,

    /// Repo path used when the caller does not supply an override.
    #[serde(default)]
    pub active_repo: Option<PathBuf>,

    /// Cache of previously resolved repo paths to repo ids.
    #[serde(default)]
    pub repo_cache: HashMap<PathBuf, String>,

    /// Minimum cosine similarity for a vector hit to be considered.
    #[serde(default = "Config::default_min_similarity")]
    pub embedding_min_similarity: f32,
}

impl Config {
    fn default_memories_k() -> usize {
        10
    }
    fn default_chunks_k() -> usize {
        10
    }
    fn default_token_budget() -> usize {
        4000
    }
    fn default_tokenizer() -> String {
        "cl100k_base".into()
    }
    fn default_workspace() -> String {
        "default".into()
    }
    fn default_min_similarity() -> f32 {
        0.5
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memories_k: Self::default_memories_k(),
            chunks_k: Self::default_chunks_k(),
            token_budget: Self::default_token_budget(),
            tokenizer: Self::default_tokenizer(),
            default_workspace: Self::default_workspace(),
            active_repo: None,
            repo_cache: HashMap::new(),
            embedding_min_similarity: Self::default_min_similarity(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, overlaid by the project config file
    /// (if present), overlaid by environment variables.
    pub fn load(repo_root: &Path) -> OmniResult<Self> {
        let mut config = Self::default();

        let project_config_path = repo_root.join(".mempack").join("config.toml");
        if project_config_path.exists() {
            config.merge_from_file(&project_config_path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn merge_from_file(&mut self, path: &Path) -> OmniResult<()> {
        let content = std::fs::read_to_string(path)?;
        let parsed: Config = toml::from_str(&content)
            .map_err(|e| OmniError::Config(format!("invalid TOML in {}: {e}", path.display())))?;
        *self = parsed;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(budget) = std::env::var("MEMPACK_TOKEN_BUDGET") {
            if let Ok(parsed) = budget.parse() {
                self.token_budget = parsed;
            }
        }
        if let Ok(tokenizer) = std::env::var("MEMPACK_TOKENIZER") {
            self.tokenizer = tokenizer;
        }
        if let Ok(workspace) = std::env::var("MEMPACK_WORKSPACE") {
            self.default_workspace = workspace;
        }
    }

    /// Resolve the workspace to use: a non-empty trimmed override, else
    /// `default_workspace`, else `"default"`.
    #[must_use]
    pub fn resolve_workspace(&self, override_workspace: Option<&str>) -> String {
        if let Some(ws) = override_workspace {
            let trimmed = ws.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        let trimmed = self.default_workspace.trim();
        if trimmed.is_empty() {
            "default".into()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.token_budget, 4000);
        assert_eq!(config.tokenizer, "cl100k_base");
        assert_eq!(config.default_workspace, "default");
    }

    #[test]
    fn resolve_workspace_prefers_override() {
        let config = Config::default();
        assert_eq!(config.resolve_workspace(Some("  feature-x  ")), "feature-x");
        assert_eq!(config.resolve_workspace(Some("   ")), "default");
        assert_eq!(config.resolve_workspace(None), "default");
    }

    #[test]
    fn load_reads_project_config_and_env_override() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mempack_dir = dir.path().join(".mempack");
        std::fs::create_dir_all(&mempack_dir).expect("mkdir");
        std::fs::write(
            mempack_dir.join("config.toml"),
            "token_budget = 9000\ntokenizer = \"cl100k_base\"\n",
        )
        .expect("write config");

        let config = Config::load(dir.path()).expect("load");
        assert_eq!(config.token_budget, 9000);
    }
}
