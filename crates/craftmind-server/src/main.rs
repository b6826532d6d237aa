mod supervisor;

use std::env;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::Html,
    routing::get,
};
use tokio_util::sync::CancellationToken;

use supervisor::{AgentStatus, Supervisor, SupervisorConfig};

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "craftmind supervisor is working!".to_string(),
    })
}

async fn status(State(supervisor): State<Arc<Supervisor>>) -> Json<AgentStatus> {
    Json(supervisor.status())
}

async fn index(State(supervisor): State<Arc<Supervisor>>) -> Html<String> {
    Html(render_status_page(&supervisor.status()))
}

fn render_status_page(status: &AgentStatus) -> String {
    let state = if status.running { "running" } else { "stopped" };
    let pid = status
        .pid
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());
    let last_exit = status.last_exit.as_deref().unwrap_or("-");
    format!(
        "<!DOCTYPE html>\n\
         <html><head><title>CraftMind Supervisor</title>\n\
         <meta http-equiv=\"refresh\" content=\"5\">\n\
         <style>body{{font-family:monospace;margin:2em}}td{{padding:0 1em 0 0}}</style>\n\
         </head><body>\n\
         <h1>CraftMind Supervisor</h1>\n\
         <table>\n\
         <tr><td>agent</td><td>{state}</td></tr>\n\
         <tr><td>pid</td><td>{pid}</td></tr>\n\
         <tr><td>restarts</td><td>{restarts}</td></tr>\n\
         <tr><td>uptime</td><td>{uptime}s</td></tr>\n\
         <tr><td>last exit</td><td>{last_exit}</td></tr>\n\
         </table>\n\
         </body></html>\n",
        restarts = status.restarts,
        uptime = status.uptime_secs,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,craftmind_server=debug".into()),
        )
        .with_target(false)
        .init();

    tracing::info!("starting CraftMind supervisor");

    let cancel = CancellationToken::new();
    let (supervisor, supervisor_handle) =
        Supervisor::spawn(SupervisorConfig::from_env(), cancel.clone());

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(supervisor);

    let addr = env::var("CRAFTMIND_SUPERVISOR_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("supervisor status page on http://{addr}");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    // Let the supervisor finish killing the agent before exiting.
    let _ = supervisor_handle.await;
    Ok(())
}
