//! LBM node binary: wires the composition root, starts the P2P server, runs
//! the sync scheduler, and serves the stdin MCP-style request loop (§6
//! environment contract).

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lbm_node::container::NodeSettings;
use lbm_node::handlers::dispatch_local;
use lbm_node::wiring;
use lbm_p2p::envelope::{Request, Response};
use lbm_p2p::P2pServer;
use lbm_types::ErrorCode;

/// How often the sync scheduler checks for due subscriptions.
const SYNC_TICK: Duration = Duration::from_secs(5);

fn init_logging(settings: &NodeSettings) {
    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let Some(log_dir) = &settings.log_dir else {
        builder.init();
        return;
    };
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("failed to create LB_LOG_DIR {}: {e}", log_dir.display());
        builder.init();
        return;
    }
    match std::fs::OpenOptions::new().create(true).append(true).open(log_dir.join("lbm-node.log")) {
        Ok(file) => builder.with_writer(std::sync::Mutex::new(file)).init(),
        Err(e) => {
            eprintln!("failed to open log file in LB_LOG_DIR {}: {e}", log_dir.display());
            builder.init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = NodeSettings::from_env();
    init_logging(&settings);

    info!(data_dir = %settings.data_dir.display(), p2p_bind = %settings.p2p_bind, "starting lbm-node");

    let node = Arc::new(wiring::compose(settings.clone()).await?);
    info!(node_id = %node.node_id(), sign_pub = %node.sign_pub(), groups = node.group_ids().await.len(), "node composed");

    let server = Arc::new(P2pServer::new(node.clone(), node.sign_key.clone(), node.enc_key.clone()));
    let p2p_bind = settings.p2p_bind.clone();
    let p2p_task = tokio::spawn(async move {
        if let Err(e) = server.serve(&p2p_bind).await {
            error!(error = %e, "p2p server exited");
        }
    });

    let sync_node = node.clone();
    let sync_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SYNC_TICK);
        loop {
            interval.tick().await;
            let now_ms = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64;
            lbm_node::adapters::sync::SyncScheduler::run_once(&sync_node, now_ms).await;
        }
    });

    let stdin_node = node.clone();
    let stdin_task = tokio::task::spawn_blocking(move || run_stdin_loop(stdin_node));

    tokio::select! {
        _ = p2p_task => info!("p2p server task ended"),
        _ = sync_task => info!("sync scheduler task ended"),
        res = stdin_task => {
            if let Err(e) = res {
                error!(error = %e, "stdin request loop panicked");
            }
            info!("stdin closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => info!("received ctrl-c, shutting down"),
    }

    Ok(())
}

/// Read one JSON `{id, method, params}` request per line from stdin and
/// write one `{id, result, error}` response per line to stdout, reusing the
/// P2P wire envelope with this process's own authority (§6: "the core does
/// not read from stdin except when explicitly running an MCP-style request
/// loop").
fn run_stdin_loop(node: Arc<lbm_node::container::Node>) {
    let rt = tokio::runtime::Handle::current();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "stdin read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let resp = Response::err("", ErrorCode::BadRequest, format!("malformed request: {e}"));
                if let Ok(s) = serde_json::to_string(&resp) {
                    let _ = writeln!(stdout, "{s}");
                }
                continue;
            }
        };
        let response = rt.block_on(dispatch_local(&node, request));
        match serde_json::to_string(&response) {
            Ok(s) => {
                let _ = writeln!(stdout, "{s}");
            }
            Err(e) => error!(error = %e, "failed to encode response"),
        }
        let _ = stdout.flush();
    }
}
