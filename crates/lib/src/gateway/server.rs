//! Webhook HTTP server (single port).

use crate::channels::{verify_signature, LineClient, MessagingApi, SIGNATURE_HEADER};
use crate::config::RelaySettings;
use crate::dispatch;
use crate::llm::{Generator, OpenAiClient};
use crate::recipe::{RecipeService, RecipeSettings};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    channel_secret: Arc<str>,
    signature_check_disabled: bool,
    service: RecipeService,
}

impl GatewayState {
    pub fn new(
        channel_secret: &str,
        signature_check_disabled: bool,
        service: RecipeService,
    ) -> Self {
        Self {
            channel_secret: Arc::from(channel_secret),
            signature_check_disabled,
            service,
        }
    }

    /// State backed by the given clients, configured from resolved settings.
    pub fn from_settings(
        settings: &RelaySettings,
        messaging: Arc<dyn MessagingApi>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let service =
            RecipeService::new(generator, messaging, RecipeSettings::from_settings(settings));
        Self::new(
            &settings.channel_secret,
            settings.signature_check_disabled(),
            service,
        )
    }
}

/// Router with `GET /` and `POST /callback`. Public so tests can serve it with fake clients.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(callback))
        .with_state(state)
}

/// Run the gateway server; binds to server.bind:server.port and serves until Ctrl+C or SIGTERM.
pub async fn run_gateway(settings: RelaySettings) -> Result<()> {
    let line = &settings.config.line;
    let messaging: Arc<dyn MessagingApi> = Arc::new(LineClient::new(
        settings.channel_access_token.clone(),
        &line.api_base,
        &line.data_api_base,
    ));
    let generator: Arc<dyn Generator> = Arc::new(OpenAiClient::new(
        settings.generation_api_key.clone(),
        Some(settings.config.generation.base_url.clone()),
    ));

    if settings.signature_check_disabled() {
        log::warn!("signature check is DISABLED; every /callback request will be accepted");
    }
    log::info!(
        "generation: model {} (vision {}), text strategy {:?}, style {:?}",
        settings.config.generation.model,
        settings.config.generation.vision_model,
        settings.config.delivery.text_strategy,
        settings.config.delivery.style
    );

    let app = build_router(GatewayState::from_settings(&settings, messaging, generator));

    let bind_addr = format!(
        "{}:{}",
        settings.config.server.bind.trim(),
        settings.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM. Detached generation tasks are not awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /callback: verify X-Line-Signature over the raw body, then dispatch the events.
async fn callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    log::debug!("callback: body {}", String::from_utf8_lossy(&body));
    if !state.signature_check_disabled {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        log::debug!("callback: signature {:?}", signature);
        if !verify_signature(&state.channel_secret, &body, signature) {
            log::warn!("callback: invalid signature, rejecting request");
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    }
    match dispatch::dispatch_body(&state.service, &body).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            log::warn!("callback: unparseable webhook body: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid body")
        }
    }
}

/// GET / returns "OK" (for probes).
async fn health_http() -> &'static str {
    "OK"
}
