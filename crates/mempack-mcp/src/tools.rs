//! The `build_context_pack` MCP tool: a single-tool-per-operation
//! MCP surface over mempack's context-pack builder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

use mempack_core::config::Config;
use mempack_core::embedder::{Embedder, HashProjectionEmbedder};
use mempack_core::runtime::Runtime;
use mempack_core::{build_context_pack, BuildOptions, RepoContext};

/// Parameters for the `build_context_pack` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BuildContextPackParams {
    /// Search query, optionally carrying `after:`/`recent:` directives.
    pub query: String,
    /// Absolute path to the repository. Defaults to the server's cwd.
    pub repo: Option<String>,
    /// Workspace to scope the search to.
    pub workspace: Option<String>,
    /// Include memories superseded by a newer one.
    pub include_superseded: Option<bool>,
    /// Include memories whose anchor commit is unreachable from HEAD.
    pub include_orphans: Option<bool>,
    /// Also return a per-candidate ranking trace.
    pub explain: Option<bool>,
}

/// MCP server exposing mempack's context-pack builder as a single tool.
#[derive(Clone)]
pub struct MempackServer {
    embedder: Arc<dyn Embedder>,
    runtime: Arc<Runtime>,
    tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

#[tool_router]
impl MempackServer {
    /// Build a new server with a deterministic local embedder and the
    /// process-wide store-handle cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            embedder: Arc::new(HashProjectionEmbedder::default()),
            runtime: mempack_core::runtime::global(),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "build_context_pack",
        description = "Build a token-budgeted context pack (memories, code chunks, and project state) for a query against a repository."
    )]
    async fn build_context_pack(
        &self,
        params: Parameters<BuildContextPackParams>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(params) = params;

        let repo_root = match &params.repo {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()
                .map_err(|e| McpError::internal_error(e.to_string(), None))?,
        };
        let repo_root = find_git_root(&repo_root).ok_or_else(|| {
            McpError::invalid_params(format!("no .git directory found above {}", repo_root.display()), None)
        })?;

        let config = Config::load(&repo_root).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let repo_id = repo_id_for(&repo_root);
        let head = mempack_core::git::head_commit(&repo_root)
            .map_err(|e| McpError::internal_error(e, None))?;

        let db_path = repo_root.join(".mempack").join("mempack.db");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        }
        let store = self
            .runtime
            .get_or_open_store(&repo_id, &db_path)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let repo_ctx = RepoContext {
            repo_id: &repo_id,
            repo_root: &repo_root,
            head: &head,
        };
        let opts = BuildOptions {
            workspace: params.workspace,
            include_superseded: params.include_superseded.unwrap_or(false),
            include_orphans: params.include_orphans.unwrap_or(false),
            explain: params.explain.unwrap_or(false),
        };

        let (pack, report) = build_context_pack(&config, store.as_ref(), self.embedder.as_ref(), &repo_ctx, &params.query, &opts)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let mut contents = vec![Content::json(&pack).map_err(|e| McpError::internal_error(e.to_string(), None))?];
        if let Some(report) = report {
            contents.push(Content::json(&report).map_err(|e| McpError::internal_error(e.to_string(), None))?);
        }

        Ok(CallToolResult::success(contents))
    }
}

impl Default for MempackServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for MempackServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Call build_context_pack with a query and repo path to retrieve a token-budgeted context pack.".into(),
            ),
            ..Default::default()
        }
    }
}

/// Walk up from `start` looking for a `.git` entry.
fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.canonicalize().ok()?;
    loop {
        if dir.join(".git").exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Derive a stable repo id from the canonical repo root path.
fn repo_id_for(repo_root: &Path) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(repo_root.to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}
