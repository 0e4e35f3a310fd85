//! Application startup and lifecycle management.

use crate::config::{ReportConfig, ReportSettings};
use crate::handlers;
use crate::services::{
    init_metrics, Database, DispatchCoordinator, MailTransport, RegistrySource, ReportEmail,
    ReportPipeline, ReportStore, SmtpMailTransport, TransactionSource,
};
use axum::{middleware, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<dyn TransactionSource>,
    pub registry: Arc<dyn RegistrySource>,
    pub pipeline: ReportPipeline,
    pub store: ReportStore,
    pub dispatcher: DispatchCoordinator,
    pub recipients: Arc<Vec<String>>,
    /// Attach debug traces to error bodies.
    pub include_stack_traces: bool,
}

impl AppState {
    pub fn new(
        transactions: Arc<dyn TransactionSource>,
        registry: Arc<dyn RegistrySource>,
        transport: Arc<dyn MailTransport>,
        settings: ReportSettings,
        max_concurrency: usize,
        include_stack_traces: bool,
    ) -> Self {
        Self {
            store: ReportStore::new(settings.output_dir.clone()),
            recipients: Arc::new(settings.recipients.clone()),
            dispatcher: DispatchCoordinator::new(transport, max_concurrency),
            pipeline: ReportPipeline::new(transactions.clone(), registry.clone(), settings),
            transactions,
            registry,
            include_stack_traces,
        }
    }

    /// Send `email` to every recipient without holding up the caller.
    pub fn dispatch_in_background(&self, email: ReportEmail) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let recipients = self.recipients.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(&recipients, &email).await;
        })
    }
}

/// All routes with the shared middleware stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/api/informes/generar-informe",
            get(handlers::generate_report),
        )
        .route(
            "/api/informes/generar-informe-simple",
            get(handlers::transaction_summary),
        )
        .route("/api/informes/registros", get(handlers::registrations_report))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect both stores and the mail relay, then bind the listener.
    pub async fn build(config: ReportConfig) -> Result<Self, AppError> {
        init_metrics();

        let (registry_db, dashboard_db) = tokio::try_join!(
            Database::new(
                "registry",
                &config.registry_database.url,
                config.registry_database.max_connections,
                config.registry_database.min_connections,
            ),
            Database::new(
                "dashboard",
                &config.dashboard_database.url,
                config.dashboard_database.max_connections,
                config.dashboard_database.min_connections,
            ),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        let transport = SmtpMailTransport::new(config.smtp.clone()).map_err(|e| {
            tracing::error!(error = %e, "Invalid SMTP configuration");
            AppError::ConfigError(anyhow::anyhow!("Invalid SMTP configuration: {}", e))
        })?;

        let state = AppState::new(
            Arc::new(dashboard_db),
            Arc::new(registry_db),
            Arc::new(transport),
            config.report.clone(),
            config.smtp.max_concurrency,
            config.common.is_development(),
        );

        Self::build_with_state(config, state).await
    }

    /// Bind the listener around a prepared state. Tests use this to run the
    /// service over in-memory sources and a mock mail transport.
    pub async fn build_with_state(config: ReportConfig, state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            recipients = state.recipients.len(),
            output_dir = %state.store.base_path().display(),
            "Report service listener bound"
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "report-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
