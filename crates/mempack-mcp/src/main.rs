//! `mempack-mcp`: stdio MCP server exposing `build_context_pack`.

mod tools;

use rmcp::transport::io::stdio;
use rmcp::ServiceExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let server = tools::MempackServer::new();
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
