//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared resilience components once, at startup
//! - Create the Axum router with the recommendation and health handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Re-render middleware and routing rejections as problem responses
//! - Serve until the shutdown signal fires

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::backend::{BackendInvoker, HttpTransport, TransportError};
use crate::config::GatewayConfig;
use crate::http::request::{self, X_REQUEST_ID};
use crate::http::response::{apply_rate_limit_headers, problem_response, problem_response_with_status};
use crate::mediation::{ErrorKind, ErrorRecord, MediationSettings, RequestMediator};
use crate::observability::metrics;
use crate::resilience::{BreakerSettings, CircuitBreaker, ConcurrencyGate, DeadlineGuard};
use crate::security::TokenBucketLimiter;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to set up backend transport: {0}")]
    Transport(#[from] TransportError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub mediator: Arc<RequestMediator>,
}

/// HTTP server for the recommendation gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    mediator: Arc<RequestMediator>,
}

impl HttpServer {
    /// Create the server and every piece of shared state it owns.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let limiter = Arc::new(TokenBucketLimiter::from_config(&config.rate_limit));
        let gate = ConcurrencyGate::from_config(&config.bulkhead);
        let breaker = Arc::new(CircuitBreaker::new(BreakerSettings::from(&config.circuit_breaker)));
        let transport = HttpTransport::new(&config.backend)?;

        tracing::info!(
            endpoint = %transport.endpoint(),
            call_timeout_ms = config.backend.call_timeout_ms,
            max_concurrent = config.bulkhead.max_concurrent,
            rate_limit_capacity = config.rate_limit.capacity,
            "Backend configured"
        );

        let invoker = BackendInvoker::new(
            Arc::new(transport),
            DeadlineGuard::new(config.backend.call_timeout()),
        );
        let mediator = Arc::new(RequestMediator::new(
            limiter,
            gate,
            breaker,
            invoker,
            MediationSettings::from_config(&config),
        ));

        let state = AppState {
            mediator: mediator.clone(),
        };
        let router = Self::build_router(&config, state);

        Ok(Self {
            router,
            config,
            mediator,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/recommendations", post(recommend_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::map_response(problem_for_rejection))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn mediator(&self) -> &Arc<RequestMediator> {
        &self.mediator
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// `POST /recommendations`: validate, mediate, render.
async fn recommend_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = match request::validate(&body) {
        Err(violation) => {
            let record = ErrorRecord::new(ErrorKind::Validation, None).with_detail(violation.to_string());
            metrics::record_rejection("validation");
            tracing::debug!(
                request_id = %request_id,
                correlation_id = %record.correlation_id(),
                error = %violation,
                "Rejected invalid request"
            );
            problem_response(&record, uri.path())
        }
        Ok(recommendation) => {
            let client = request::client_key(&headers, peer);
            let outcome = state.mediator.mediate(&client, &recommendation).await;

            let mut response = match &outcome.result {
                Ok(payload) => Json(payload).into_response(),
                Err(record) => {
                    tracing::debug!(
                        request_id = %request_id,
                        correlation_id = %record.correlation_id(),
                        kind = %record.kind(),
                        status = record.http_status().as_u16(),
                        "Mediation failed"
                    );
                    problem_response(record, uri.path())
                }
            };
            apply_rate_limit_headers(response.headers_mut(), &outcome.rate_limit);
            response
        }
    };

    metrics::record_request(response.status().as_u16(), start_time);
    response
}

/// Bare rejections from the body limit, the request timeout and the method
/// router carry no problem body; give them one.
async fn problem_for_rejection(uri: Uri, response: Response) -> Response {
    let status = response.status();
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => {
            metrics::record_rejection("body_too_large");
            let record = ErrorRecord::new(ErrorKind::Validation, None)
                .with_detail("request body exceeds the configured size limit");
            problem_response_with_status(&record, uri.path(), status)
        }
        StatusCode::METHOD_NOT_ALLOWED => {
            metrics::record_rejection("method_not_allowed");
            let record = ErrorRecord::new(ErrorKind::Validation, None)
                .with_detail("method not allowed on this resource");
            let mut problem = problem_response_with_status(&record, uri.path(), status);
            if let Some(allow) = response.headers().get(header::ALLOW) {
                problem.headers_mut().insert(header::ALLOW, allow.clone());
            }
            problem
        }
        StatusCode::REQUEST_TIMEOUT => {
            metrics::record_rejection("request_timeout");
            let record = ErrorRecord::new(ErrorKind::Timeout, None);
            problem_response(&record, uri.path())
        }
        _ => response,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    circuit: &'static str,
    in_flight: usize,
    tracked_clients: usize,
}

/// `GET /health`: liveness plus a snapshot of the resilience state.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::record_in_flight(state.mediator.in_flight());
    metrics::record_tracked_clients(state.mediator.tracked_clients());
    Json(HealthResponse {
        status: "ok",
        circuit: state.mediator.circuit_state().as_str(),
        in_flight: state.mediator.in_flight(),
        tracked_clients: state.mediator.tracked_clients(),
    })
}
