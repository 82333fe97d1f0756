use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_embed::Embed;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use tradepilot_browser::{ConsoleDriver, TradingConsole};
use tradepilot_core::{CommandResponse, Config, Error, Paths};
use tradepilot_worker::{DriverFactory, Supervisor};

// ---------------------------------------------------------------------------
// Shared state passed to HTTP handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct DashboardState {
    supervisor: Arc<Mutex<Supervisor>>,
    api_token: Option<String>,
}

fn secure_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (&x, &y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ---------------------------------------------------------------------------
// Bearer token authentication middleware
// ---------------------------------------------------------------------------

async fn auth_middleware(
    State(state): State<DashboardState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match &state.api_token {
        Some(t) if !t.is_empty() => t,
        _ => return next.run(req).await,
    };

    // The dashboard page itself is public; it prompts for the token.
    if req.uri().path() == "/" {
        return next.run(req).await;
    }

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let authorized = match auth_header {
        Some(h) if h.starts_with("Bearer ") => secure_eq(&h[7..], token.as_str()),
        _ => false,
    };

    if authorized {
        next.run(req).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            "Unauthorized: invalid or missing Bearer token",
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

/// Guard errors carry messages clients display verbatim; everything else
/// is reported through its Display form.
fn error_response(e: Error) -> Response {
    let (status, message) = match e {
        Error::Session(msg) => (StatusCode::CONFLICT, msg),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    };
    (
        status,
        Json(serde_json::json!({ "status": "error", "message": message })),
    )
        .into_response()
}

async fn handle_status(State(state): State<DashboardState>) -> impl IntoResponse {
    let supervisor = state.supervisor.lock().await;
    Json(serde_json::json!({ "running": supervisor.is_running() }))
}

async fn handle_open(State(state): State<DashboardState>) -> Response {
    let mut supervisor = state.supervisor.lock().await;
    match supervisor.open().await {
        Ok(response) => Json(serde_json::json!({
            "status": "ok",
            "message": response.summary(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_data(State(state): State<DashboardState>) -> Response {
    let mut supervisor = state.supervisor.lock().await;
    match supervisor.data().await {
        Ok(CommandResponse::MarketData(snapshot)) => Json(serde_json::json!({
            "status": "ok",
            "data": snapshot,
        }))
        .into_response(),
        Ok(other) => Json(serde_json::json!({
            "status": "ok",
            "message": other.summary(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_screenshot(State(state): State<DashboardState>) -> Response {
    let mut supervisor = state.supervisor.lock().await;
    match supervisor.screenshot().await {
        Ok(CommandResponse::Screenshot(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png".to_string())],
            bytes,
        )
            .into_response(),
        Ok(other) => Json(serde_json::json!({
            "status": "ok",
            "message": other.summary(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_close(State(state): State<DashboardState>) -> Response {
    let mut supervisor = state.supervisor.lock().await;
    match supervisor.close().await {
        Ok(response) => Json(serde_json::json!({
            "status": "ok",
            "message": response.summary(),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------------
// Embedded dashboard page
// ---------------------------------------------------------------------------

#[derive(Embed)]
#[folder = "web"]
struct DashboardAssets;

async fn handle_index() -> impl IntoResponse {
    match DashboardAssets::get("index.html") {
        Some(content) => {
            let mime = mime_guess::from_path("index.html")
                .first_or_octet_stream()
                .to_string();
            let body: Vec<u8> = content.data.into();
            (StatusCode::OK, [(header::CONTENT_TYPE, mime)], body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run(cli_host: Option<String>, cli_port: Option<u16>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    let host = cli_host.unwrap_or_else(|| config.dashboard.host.clone());
    let port = cli_port.unwrap_or(config.dashboard.port);
    let api_token = config.dashboard.auth_token.clone();

    if api_token.is_none() {
        info!("No dashboard.authToken configured, API is open");
    }

    let factory_config = config.clone();
    let factory_paths = paths.clone();
    let make_driver: DriverFactory = Box::new(move || {
        let console = TradingConsole::new(factory_config.clone(), factory_paths.clone())?;
        Ok(Box::new(console) as Box<dyn ConsoleDriver>)
    });

    let state = DashboardState {
        supervisor: Arc::new(Mutex::new(Supervisor::new(make_driver))),
        api_token,
    };

    let app = Router::new()
        .route("/", get(handle_index))
        .route("/api/status", get(handle_status))
        .route("/api/open", post(handle_open))
        .route("/api/data", post(handle_data))
        .route("/api/screenshot", post(handle_screenshot))
        .route("/api/close", post(handle_close))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_eq() {
        assert!(secure_eq("tok-123", "tok-123"));
        assert!(!secure_eq("tok-123", "tok-124"));
        assert!(!secure_eq("tok-123", "tok-12"));
        assert!(!secure_eq("", "x"));
        assert!(secure_eq("", ""));
    }
}
