//! The axum server harness: router, TLS and CORS.
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;

use axum::{
    extract::{Extension, Json},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{ServerConfig, TlsConfig},
    service::{CoordinatorService, State},
    websocket, Error, Result, ServerState,
};
use roast_protocol::ClientRequest;

/// Coordination web server.
pub struct CoordinatorServer {
    state: State,
}

impl CoordinatorServer {
    /// Create a new coordination server.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ServerState::new(config))),
        }
    }

    /// The shared state handle.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Start the server.
    pub async fn start(
        &self,
        addr: SocketAddr,
        handle: Handle,
    ) -> Result<()> {
        let origins = self.read_origins().await?;
        let reader = self.state.read().await;
        let tls = reader.config().tls.as_ref().cloned();
        drop(reader);

        if let Some(tls) = tls {
            self.run_tls(addr, handle, origins, tls).await
        } else {
            self.run(addr, handle, origins).await
        }
    }

    /// Start the server running on HTTPS.
    async fn run_tls(
        &self,
        addr: SocketAddr,
        handle: Handle,
        origins: Vec<HeaderValue>,
        tls: TlsConfig,
    ) -> Result<()> {
        let tls =
            RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
        let app = self.router(origins);
        tracing::info!("listening on {}", addr);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    /// Start the server running on HTTP.
    async fn run(
        &self,
        addr: SocketAddr,
        handle: Handle,
        origins: Vec<HeaderValue>,
    ) -> Result<()> {
        let app = self.router(origins);
        tracing::info!("listening on {}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    fn router(&self, origins: Vec<HeaderValue>) -> Router {
        let cors = CorsLayer::new()
            .allow_methods(vec![Method::GET, Method::POST])
            .allow_origin(origins);

        let service = Arc::new(CoordinatorService::new(Arc::clone(
            &self.state,
        )));

        Router::new()
            .route("/api", post(api))
            .route("/events", get(websocket::upgrade))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(Extension(service))
            .layer(Extension(Arc::clone(&self.state)))
    }

    async fn read_origins(&self) -> Result<Vec<HeaderValue>> {
        let reader = self.state.read().await;
        let mut origins = Vec::new();
        for url in reader.config().cors.origins.iter() {
            origins.push(HeaderValue::from_str(
                url.as_str().trim_end_matches('/'),
            )?);
        }
        Ok(origins)
    }
}

/// Handle a one-shot client request.
async fn api(
    Extension(service): Extension<Arc<CoordinatorService>>,
    Json(request): Json<ClientRequest>,
) -> Response {
    match service.handle(request).await {
        Ok(response) => Json(response).into_response(),
        Err(Error::InvalidRequest(reason)) => {
            tracing::debug!(%reason, "request refused");
            (StatusCode::BAD_REQUEST, Json(reason)).into_response()
        }
        Err(error) => {
            tracing::error!(%error, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
