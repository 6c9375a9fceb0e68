use std::{future::Future, net::SocketAddr, time::Duration};

use axum::{
    Router,
    http::{Method, StatusCode, header},
    routing::{delete, get},
};
use color_eyre::eyre::{WrapErr, eyre};
use listenfd::ListenFd;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    app_state::AppState,
    config::ServerConfig,
    notes::handlers::{create_note, delete_note, list_notes},
};

pub mod handlers;
pub mod trace;

/// The routes of the service, without middleware.
pub fn routes<AS: AppState>(state: AS) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/ping", get(handlers::ping))
        .route(
            "/api/notes",
            get(list_notes::<AS>).post(create_note::<AS>),
        )
        .route("/api/notes/{id}", delete(delete_note::<AS>))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
        .with_state(state)
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// The full application: routes wrapped in request logging, CORS and the
/// request timeout.
pub fn app<AS: AppState>(state: AS, config: &ServerConfig) -> Router {
    let tracer = trace::Tracer;
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(tracer)
        .on_request(tracer)
        .on_response(tracer);

    routes(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors_layer())
        .layer(trace_layer)
}

async fn bind(config: &ServerConfig) -> color_eyre::Result<TcpListener> {
    // Check if we're being run under systemfd (LISTEN_FDS will be set)
    if let Some(fd_listener) = ListenFd::from_env().take_tcp_listener(0)? {
        let socket_addr = fd_listener.local_addr()?;

        tracing::info!("Zero-downtime reloading enabled");
        tracing::info!(
            "Using listener passed from systemfd on address {}",
            socket_addr
        );

        fd_listener.set_nonblocking(true)?;
        return Ok(TcpListener::from_std(fd_listener)?);
    }

    tracing::info!(port = config.port, "Server starting");
    TcpListener::bind(config.addr())
        .await
        .wrap_err("Failed to open port")
}

/// Bind the configured port (or the systemfd socket) and [`serve`] on it.
pub async fn run_server(
    router: Router,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> color_eyre::Result<()> {
    let listener = bind(config).await?;
    serve(listener, router, config.shutdown_grace_period, shutdown).await
}

/// Serve `router` on `listener` until `shutdown` resolves, then drain
/// in-flight requests.
///
/// Once `shutdown` fires the listener stops accepting connections. Requests
/// already running get `grace_period` to finish; if they don't, the server
/// task is aborted and an error is returned.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    grace_period: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> color_eyre::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let serve = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = stop_rx.await;
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => {
            return result
                .wrap_err("Server task panicked")?
                .wrap_err("Failed to run server");
        }
        () = shutdown => {}
    }

    tracing::info!("Server shutting down");
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace_period, &mut server).await {
        Ok(result) => {
            result
                .wrap_err("Server task panicked")?
                .wrap_err("Failed to run server")?;
            tracing::info!("Server stopped");
            Ok(())
        }
        Err(_) => {
            server.abort();
            tracing::error!(?grace_period, "Server forced to shutdown");
            Err(eyre!(
                "in-flight requests did not finish within {:?}",
                grace_period
            ))
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
