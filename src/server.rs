use std::sync::Arc;

use anyhow::Context;
use rmcp::ServiceExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::embedding::build_providers;
use crate::mcp::{PensieveServer, client};
use crate::persistence::Crystallizer;
use crate::store::{PensieveStore, StoreOptions};

/// Serve the memory tools over stdio until the client disconnects or Ctrl-C.
///
/// The crystallizer is shut down on the way out, which writes a final snapshot.
pub async fn run_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let (title_embedder, topic_embedder) = build_providers(&config.embedding)
        .await
        .context("failed to load embedding models")?;

    let store = PensieveStore::open(
        StoreOptions::from(&config.store),
        title_embedder,
        topic_embedder,
    )
    .await
    .with_context(|| {
        format!(
            "failed to open snapshot {}; move it aside to start empty",
            config.store.snapshot_path.display()
        )
    })?;

    let crystallizer = Crystallizer::spawn(store.clone(), config.store.crystallize_interval());

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(name: "server.signal", "Ctrl-C received, shutting down");
            ctrl_c.cancel();
        }
    });

    info!(
        name: "server.started",
        transport = "stdio",
        snapshot = %store.snapshot_file().display_path().display(),
        "MCP server started"
    );

    let served = serve_stdio(PensieveServer::new(store), token).await;

    match crystallizer.shutdown().await {
        Ok(path) => info!(name: "server.stopped", snapshot = %path.display(), "Final snapshot written"),
        Err(error) => warn!(%error, "final snapshot failed"),
    }
    served
}

async fn serve_stdio(server: PensieveServer, token: CancellationToken) -> anyhow::Result<()> {
    let running = server
        .serve_with_ct(rmcp::transport::stdio(), token)
        .await
        .context("MCP initialization failed")?;
    let reason = running.waiting().await.context("MCP service task failed")?;
    info!(name: "server.session.closed", reason = ?reason, "MCP session closed");
    Ok(())
}

/// Spawn a server, print what it offers as JSON on stdout.
///
/// Without `server_cmd` this binary is started with `serve` and the given
/// arguments.
pub async fn run_inspect(server_cmd: Option<String>, server_args: Vec<String>) -> anyhow::Result<()> {
    let mut cmd = match server_cmd {
        Some(program) => Command::new(program),
        None => {
            let exe = std::env::current_exe().context("cannot locate the pensieve executable")?;
            let mut cmd = Command::new(exe);
            cmd.arg("serve");
            cmd
        }
    };
    cmd.args(&server_args);

    let report = client::inspect(cmd).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
