//! MCP server exposing the retrieval core's query API surface over the
//! Model Context Protocol.

pub mod params;

use crate::config::{Config, RecallMode};
use crate::core::StarCore;
use crate::embedding::{Embedder, MockEmbedder};
use crate::model::{AtomId, MoleculeId, MoleculeType, Provenance};
use crate::query::QueryOptions;
use crate::storage::SqliteStore;
use params::*;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use std::path::PathBuf;
use std::sync::Arc;

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(msg: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg)]))
}

fn parse_molecule_type(raw: Option<&str>) -> Result<MoleculeType, String> {
    match raw.unwrap_or("prose") {
        "prose" => Ok(MoleculeType::Prose),
        "code" => Ok(MoleculeType::Code),
        "data" => Ok(MoleculeType::Data),
        other => Err(format!("unknown molecule type '{other}', expected prose, code, or data")),
    }
}

fn parse_provenance(raw: Option<&str>) -> Result<Provenance, String> {
    match raw {
        None => Ok(Provenance::Internal),
        Some("internal") => Ok(Provenance::Internal),
        Some("external") => Ok(Provenance::External),
        Some("quarantine") => Ok(Provenance::Quarantine),
        Some(other) => Err(format!("unknown provenance '{other}', expected internal, external, or quarantine")),
    }
}

fn parse_recall_mode(raw: Option<&str>) -> Result<Option<RecallMode>, String> {
    match raw {
        None => Ok(None),
        Some("maximum") => Ok(Some(RecallMode::Maximum)),
        Some("balanced") => Ok(Some(RecallMode::Balanced)),
        Some("focused") => Ok(Some(RecallMode::Focused)),
        Some(other) => Err(format!("unknown recall_mode '{other}', expected maximum, balanced, or focused")),
    }
}

#[derive(Clone)]
pub struct StarMcpServer {
    core: Arc<StarCore>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl StarMcpServer {
    pub fn new(core: Arc<StarCore>) -> Self {
        Self {
            core,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Search the knowledge corpus and assemble a context string from the best-matching molecules")]
    async fn search(&self, Parameters(p): Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let recall_mode = match parse_recall_mode(p.recall_mode.as_deref()) {
            Ok(m) => m,
            Err(e) => return err_text(e),
        };
        let provenance = if let Some(raw) = p.provenance.as_deref() {
            match parse_provenance(Some(raw)) {
                Ok(prov) => Some(prov),
                Err(e) => return err_text(e),
            }
        } else {
            None
        };
        let options = QueryOptions {
            buckets: p.buckets,
            tags: p.tags.map(|ts| ts.into_iter().map(AtomId::new).collect()),
            provenance,
            max_chars: p.max_chars,
            code_weight: p.code_weight,
            recall_mode,
        };

        match self.core.search(&p.query, options).await {
            Ok(response) => ok_text(
                serde_json::to_string_pretty(&serde_json::json!({
                    "context": response.context,
                    "strategy": response.strategy,
                    "status": response.status,
                    "split_queries": response.split_queries,
                    "results": response.results.iter().map(|r| serde_json::json!({
                        "molecule_id": r.molecule_id.to_string(),
                        "gravity": r.gravity,
                        "class": format!("{:?}", r.class).to_lowercase(),
                        "source": format!("{:?}", r.source).to_lowercase(),
                    })).collect::<Vec<_>>(),
                    "reindex_pending": response.reindex_pending.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
                }))
                .unwrap(),
            ),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Ingest content (a paste, a note, a file's text) into the corpus")]
    fn ingest(&self, Parameters(p): Parameters<IngestParams>) -> Result<CallToolResult, McpError> {
        let molecule_type = match parse_molecule_type(p.molecule_type.as_deref()) {
            Ok(t) => t,
            Err(e) => return err_text(e),
        };
        let buckets = p.buckets.unwrap_or_default();
        let tags: Vec<AtomId> = p.tags.unwrap_or_default().into_iter().map(AtomId::new).collect();

        match self.core.ingest(&p.content, &p.source_path, molecule_type, buckets, tags, Provenance::Internal) {
            Ok(outcome) => ok_text(serde_json::to_string_pretty(&format!("{outcome:?}")).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Quarantine a molecule so it stops appearing in search results")]
    fn quarantine(&self, Parameters(p): Parameters<MoleculeIdParams>) -> Result<CallToolResult, McpError> {
        match self.core.quarantine(&MoleculeId::from_string(p.molecule_id.clone())) {
            Ok(()) => ok_text(format!("quarantined {}", p.molecule_id)),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Restore a previously quarantined molecule to normal visibility")]
    fn restore(&self, Parameters(p): Parameters<MoleculeIdParams>) -> Result<CallToolResult, McpError> {
        match self.core.restore(&MoleculeId::from_string(p.molecule_id.clone())) {
            Ok(()) => ok_text(format!("restored {}", p.molecule_id)),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Rewrite a molecule's content in place")]
    fn update_content(&self, Parameters(p): Parameters<UpdateContentParams>) -> Result<CallToolResult, McpError> {
        match self.core.update_content(&MoleculeId::from_string(p.molecule_id.clone()), &p.content) {
            Ok(()) => ok_text(format!("updated {}", p.molecule_id)),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "List every bucket currently in use")]
    fn list_buckets(&self) -> Result<CallToolResult, McpError> {
        match self.core.list_buckets() {
            Ok(buckets) => ok_text(serde_json::to_string_pretty(&buckets).unwrap()),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "List every tag in use, optionally restricted to a set of buckets")]
    fn list_tags(&self, Parameters(p): Parameters<ListTagsParams>) -> Result<CallToolResult, McpError> {
        match self.core.list_tags(p.buckets.as_deref()) {
            Ok(tags) => ok_text(
                serde_json::to_string_pretty(&tags.iter().map(AtomId::as_str).collect::<Vec<_>>()).unwrap(),
            ),
            Err(e) => err_text(e.to_string()),
        }
    }

    #[tool(description = "Re-sync the index from the filesystem mirror, re-ingesting anything that changed")]
    fn rebuild_index(&self) -> Result<CallToolResult, McpError> {
        match self.core.rebuild_index() {
            Ok(outcomes) => ok_text(format!("resynced {} compounds", outcomes.len())),
            Err(e) => err_text(e.to_string()),
        }
    }
}

#[tool_handler]
impl ServerHandler for StarMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Physics-inspired retrieval core over a personal knowledge corpus — search, ingest, quarantine, restore".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn default_embedder() -> Box<dyn Embedder> {
    #[cfg(feature = "embeddings")]
    {
        match crate::embedding::FastEmbedEmbedder::default_model() {
            Ok(embedder) => return Box::new(embedder),
            Err(e) => eprintln!("falling back to mock embedder: fastembed init failed: {e}"),
        }
    }
    Box::new(MockEmbedder::new(384))
}

pub fn run_mcp_server(mirror_root: Option<PathBuf>, index_path: Option<PathBuf>) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return 1;
        }
    };

    rt.block_on(async {
        let mut config = Config::default();
        if let Some(root) = mirror_root {
            config.mirror_root = root;
        }
        if let Some(path) = index_path {
            config.index_path = path;
        }

        let store = match SqliteStore::open(&config.index_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to open database at {}: {e}", config.index_path.display());
                return 1;
            }
        };

        let core = match StarCore::open(Box::new(store), None, default_embedder(), config) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                eprintln!("failed to open retrieval core: {e}");
                return 1;
            }
        };

        let server = StarMcpServer::new(core);

        eprintln!("star mcp server starting on stdio...");

        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to start MCP server: {e}");
                return 1;
            }
        };

        if let Err(e) = service.waiting().await {
            eprintln!("MCP server error: {e}");
            return 1;
        }

        0
    })
}
