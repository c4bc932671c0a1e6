//! Development server with live reload.
//!
//! ```text
//! main thread:    tiny_http request loop (rayon pool)
//! build thread:   initial build -> set_serving -> scheduler actor
//! reload threads: WebSocket accept + reaper (ReloadHub)
//! ```

mod content;
mod path;
mod response;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Result, anyhow};
use tiny_http::{Request, Server};

use super::build::BuildLog;
use super::watch::{WatchSession, wait_for_shutdown};
use crate::{
    config::{ConfigError, ProjectConfig},
    core::{BuildMode, is_serving, is_shutdown, register_server, set_serving},
    debug, log,
    reload::{Notifiers, ReloadHub, ReloadNotifier, TerminalNotifier, start_ws_server},
};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// URL the live-reload client is served from.
pub const LIVERELOAD_PATH: &str = "/__kiln/livereload.js";

/// Per-request settings shared by the worker pool.
#[derive(Debug, Clone)]
pub struct ServeContext {
    /// Directory served at `/`.
    pub root: PathBuf,
    pub ws_port: u16,
    pub csp: Option<String>,
}

pub fn serve(config: &ProjectConfig, mode: BuildMode) -> Result<()> {
    let session = WatchSession::prepare(config, mode)?;
    let serve_root = config.root_join(&config.serve.root);
    if serve_root.exists() && !serve_root.is_dir() {
        return Err(ConfigError::Validation(format!(
            "serve.root `{}` is not a directory",
            config.serve.root.display()
        ))
        .into());
    }
    // Pipelines may populate an output-only root during the initial build
    std::fs::create_dir_all(&serve_root)?;

    let hub = Arc::new(ReloadHub::new());
    let ws_port = start_ws_server(config.serve.interface, config.serve.ws_port, Arc::clone(&hub))?;
    debug!("reload"; "ws://{}:{}", config.serve.interface, ws_port);

    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    register_server(Arc::clone(&server));
    log!("serve"; "http://{}", addr);

    let reload = Arc::new(ReloadNotifier::new(hub, &serve_root));
    let handle = thread::spawn(move || {
        let failed = session.initial_build(&Notifiers::new().with(BuildLog).with(Arc::clone(&reload)));
        if failed > 0 {
            log!("serve"; "initial build: {} pipeline(s) failed", failed);
        }
        set_serving();
        if is_shutdown() {
            return;
        }

        let notifier = Notifiers::new().with(TerminalNotifier).with(reload);
        let scheduler = session.spawn(Arc::new(notifier));
        let _ = scheduler.join();
    });

    let ctx = ServeContext {
        root: serve_root,
        ws_port,
        csp: config.serve.csp.clone(),
    };
    run_request_loop(&server, Arc::new(ctx))?;
    wait_for_shutdown(handle);
    Ok(())
}

/// Bind to the interface and port, trying the next ports if busy.
fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn run_request_loop(server: &Server, ctx: Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .map_err(|e| anyhow!("failed to create request pool: {e}"))?;

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request, ctx);
    }

    if request.url() == LIVERELOAD_PATH {
        return response::respond_livereload_js(request, ctx);
    }

    if !is_serving() {
        return response::respond_loading(request, ctx);
    }

    if let Some(path) = path::resolve_path(request.url(), &ctx.root) {
        return response::respond_file(request, &path, ctx);
    }

    response::respond_not_found(request, ctx)
}
