mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::{BackendConfig, Config};
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::accounts::{self, clients::IabakoClient, AccountService};
use crate::features::auth::{self, TokenVerifier};
use crate::features::catalog::{self, relations, CatalogService};
use crate::features::messages::{self, MessageService};
use crate::features::search::{self, SearchDispatcher};
use crate::features::session::{self, RoleGate};
use crate::modules::backend::{DataBackend, InMemoryBackend, PgBackend};
use crate::modules::storage::{BlobStore, InMemoryBlobStore, MinIOClient};
use axum::extract::DefaultBodyLimit;
use axum::{middleware::from_fn, middleware::from_fn_with_state, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

/// Record and blob stores selected by `CATALOG_BACKEND`
async fn open_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn DataBackend>, Arc<dyn BlobStore>)> {
    match &config.backend {
        BackendConfig::Postgres { database, minio } => {
            let pool = database::create_pool(database).await?;
            tracing::info!("Database connection pool created");

            tracing::info!("Running database migrations...");
            database::migrate(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
            tracing::info!("Database migrations completed successfully");

            let minio_client = MinIOClient::new(minio.clone())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize MinIO client: {}", e))?;
            tracing::info!(
                "MinIO client initialized for bucket: {}",
                minio_client.bucket_name()
            );

            let backend = PgBackend::new(pool, relations(config.catalog.delete_policy));
            Ok((Arc::new(backend), Arc::new(minio_client)))
        }
        BackendConfig::Memory { public_base_url } => {
            tracing::warn!("Using the in-memory backend; all data is lost on restart");
            Ok((
                Arc::new(InMemoryBackend::new(relations(
                    config.catalog.delete_policy,
                ))),
                Arc::new(InMemoryBlobStore::new(public_base_url.clone())),
            ))
        }
    }
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let available_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        available_cpus,
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    let (backend, blobs) = open_stores(&config).await?;

    // Sessions: bearer tokens verified against the issuer's JWKS, roles from profiles
    let jwks_client = Arc::new(auth::JwksClient::new(
        &config.auth.issuer,
        config.auth.jwks_cache_ttl,
    ));
    let verifier: Arc<dyn TokenVerifier> = Arc::new(auth::JwtValidator::new(
        jwks_client,
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
        config.auth.jwt_leeway,
    ));
    let gate = Arc::new(RoleGate::new(Arc::clone(&backend)));
    tracing::info!("Auth configuration initialized");

    let catalog_service = Arc::new(CatalogService::new(
        Arc::clone(&backend),
        Arc::clone(&blobs),
        config.catalog.delete_policy,
    ));
    tracing::info!(
        "Catalog service initialized (delete policy: {:?})",
        config.catalog.delete_policy
    );

    let search_dispatcher = Arc::new(SearchDispatcher::new(
        Arc::clone(&backend),
        config.search.clone(),
    ));
    tracing::info!(
        "Search initialized (debounce: {:?}, min length: {}, limit: {})",
        config.search.debounce,
        config.search.min_query_len,
        config.search.per_collection_limit
    );

    let profile_sync = IabakoClient::from_config(&config.iabako)
        .map_err(|e| anyhow::anyhow!("Failed to initialize Iabako client: {}", e))?;
    let account_service = Arc::new(AccountService::new(
        Arc::clone(&backend),
        profile_sync,
        config.accounts.verification_policy,
    ));
    tracing::info!(
        "Account service initialized (verification policy: {})",
        config.accounts.verification_policy
    );

    let message_service = Arc::new(MessageService::new(Arc::clone(&backend)));
    tracing::info!("Message service initialized");

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Every API route sees a Viewer; guards on the handlers enforce capabilities
    let session_state = middleware::SessionLayerState {
        verifier: Arc::clone(&verifier),
        gate: Arc::clone(&gate),
    };
    let api_routes = Router::new()
        .merge(session::routes())
        .merge(catalog::routes::routes(catalog_service))
        .merge(search::routes(search_dispatcher, gate, verifier))
        .merge(accounts::routes(account_service))
        .merge(messages::routes(message_service))
        .layer(from_fn_with_state(
            session_state,
            middleware::session_middleware,
        ));

    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    let app = Router::new()
        .merge(swagger)
        .merge(api_routes)
        .merge(health_route)
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        .layer(
            ServiceBuilder::new()
                // Generate X-Request-Id using UUID v7 (or use client-provided one)
                .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(middleware::MakeSpanWithRequestId)
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                // Propagate X-Request-Id to response headers
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    socket.set_recv_buffer_size(256 * 1024)?;
    socket.set_send_buffer_size(256 * 1024)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(65535)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "Swagger UI available at {}",
        format!("http://{}/swagger-ui/", addr)
    );

    axum::serve(listener, app).await?;

    Ok(())
}
