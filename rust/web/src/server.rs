use crate::errors::ErrorResponse;
use crate::events::ConnectionHub;
use crate::handlers;
use crate::middleware;
use crate::registry::{ConnectionRegistry, RoomRegistry};
use crate::settings::{AppSettings, SettingsError, SettingsStore};
use gambit_ai::ModelKind;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::http::{StatusCode, Uri};
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

pub const DEFAULT_PORT: u16 = 4800;

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.host.trim().is_empty() {
            return Err(ServerError::ConfigError("host cannot be empty".to_string()));
        }

        for origin in &self.allowed_origins {
            let valid = origin
                .parse::<Uri>()
                .map(|uri| {
                    uri.scheme().is_some()
                        && uri.authority().is_some()
                        && matches!(uri.path(), "" | "/")
                })
                .unwrap_or(false);
            if !valid {
                return Err(ServerError::ConfigError(format!(
                    "invalid allowed origin `{origin}` (expected scheme://host[:port])"
                )));
            }
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

/// Shared state handed to every route and connection.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    connections: Arc<ConnectionRegistry>,
    rooms: Arc<RoomRegistry>,
    hub: ConnectionHub,
    settings: Arc<SettingsStore>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_settings(config, AppSettings::default())
    }

    pub fn with_settings(config: ServerConfig, settings: AppSettings) -> Result<Self, ServerError> {
        config.validate()?;
        let settings = SettingsStore::with_settings(settings)?;

        Ok(Self {
            config,
            connections: Arc::new(ConnectionRegistry::new()),
            rooms: Arc::new(RoomRegistry::new()),
            hub: ConnectionHub::new(),
            settings: Arc::new(settings),
        })
    }

    /// Isolated context whose sessions use the in-process minimax backend.
    pub fn new_for_tests() -> Result<Self, ServerError> {
        let settings = AppSettings {
            default_model: ModelKind::Minimax,
            ..AppSettings::default()
        };
        Self::with_settings(ServerConfig::for_tests(), settings)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn connections(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.connections)
    }

    pub fn rooms(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.rooms)
    }

    pub fn hub(&self) -> ConnectionHub {
        self.hub.clone()
    }

    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let context = AppContext::new(config)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        let preflight = if bind_addr.port() != 0 {
            Some(std::net::TcpListener::bind(bind_addr).map_err(ServerError::BindError)?)
        } else {
            None
        };
        drop(preflight);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::filter(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(addr = %addr, "web server listening on http://{}", addr);

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Routes plus CORS and response logging, as served. The socket accepts
    /// any origin; the allowlist applies to the HTTP routes.
    pub fn filter(
        context: &AppContext,
    ) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static
    {
        let origins: Vec<&str> = context
            .config()
            .allowed_origins()
            .iter()
            .map(String::as_str)
            .collect();
        let cors = warp::cors()
            .allow_origins(origins)
            .allow_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allow_headers(vec!["content-type"]);

        let http = Self::http_routes(context)
            .with(cors)
            .map(|reply| Reply::into_response(reply))
            .boxed();

        Self::recovering(Self::socket_route(context), http).with(middleware::request_log())
    }

    /// Every route, with rejections turned into JSON error bodies.
    pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        Self::recovering(Self::socket_route(context), Self::http_routes(context))
    }

    fn recovering(
        socket: BoxedFilter<(Response,)>,
        http: BoxedFilter<(Response,)>,
    ) -> BoxedFilter<(Response,)> {
        socket
            .or(http)
            .unify()
            .recover(Self::handle_rejection)
            .unify()
            .boxed()
    }

    fn http_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        Self::health_routes(context)
            .or(Self::settings_routes(context))
            .unify()
            .boxed()
    }

    fn socket_route(context: &AppContext) -> BoxedFilter<(Response,)> {
        warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .and(Self::with_context(context.clone()))
            .map(|ws: warp::ws::Ws, ctx: AppContext| {
                ws.on_upgrade(move |socket| handlers::serve_connection(socket, ctx))
                    .into_response()
            })
            .boxed()
    }

    fn health_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let health = warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::health().into_response());

        let ping = warp::path("ping")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::ping().into_response());

        let status = warp::path!("api" / "status")
            .and(warp::get())
            .and(Self::with_context(context.clone()))
            .map(|ctx: AppContext| handlers::status(&ctx));

        health.or(ping).unify().or(status).unify().boxed()
    }

    fn settings_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let store = context.settings();

        let get = warp::path!("api" / "settings")
            .and(warp::get())
            .and(Self::with_settings_store(store.clone()))
            .and_then(|store: Arc<SettingsStore>| async move {
                Ok::<_, Infallible>(handlers::get_settings(store).await)
            });

        let update = warp::path!("api" / "settings")
            .and(warp::put())
            .and(Self::with_settings_store(store.clone()))
            .and(warp::body::json())
            .and_then(
                |store: Arc<SettingsStore>, request: handlers::UpdateSettingsRequest| async move {
                    Ok::<_, Infallible>(handlers::update_settings(store, request).await)
                },
            );

        let reset = warp::path!("api" / "settings" / "reset")
            .and(warp::post())
            .and(Self::with_settings_store(store))
            .and_then(|store: Arc<SettingsStore>| async move {
                Ok::<_, Infallible>(handlers::reset_settings(store).await)
            });

        get.or(update).unify().or(reset).unify().boxed()
    }

    async fn handle_rejection(err: Rejection) -> Result<Response, Rejection> {
        let (status, body) = if err.is_not_found() {
            (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("not_found", "Route not found"),
            )
        } else if let Some(invalid) = err.find::<warp::filters::body::BodyDeserializeError>() {
            (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("invalid_body", invalid.to_string()),
            )
        } else if err.find::<warp::reject::MissingHeader>().is_some()
            || err.find::<warp::reject::InvalidHeader>().is_some()
        {
            (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request", "Missing or invalid request header"),
            )
        } else if let Some(forbidden) = err.find::<warp::cors::CorsForbidden>() {
            (
                StatusCode::FORBIDDEN,
                ErrorResponse::new("cors_forbidden", forbidden.to_string()),
            )
        } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
            (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("method_not_allowed", "Method not allowed"),
            )
        } else {
            tracing::error!(rejection = ?err, "unhandled rejection");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("internal_error", "Internal server error"),
            )
        };

        Ok(body.into_response(status))
    }

    fn with_context(
        context: AppContext,
    ) -> impl Filter<Extract = (AppContext,), Error = Infallible> + Clone {
        warp::any().map(move || context.clone())
    }

    fn with_settings_store(
        store: Arc<SettingsStore>,
    ) -> impl Filter<Extract = (Arc<SettingsStore>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&store))
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        tracing::info!(addr = %self.addr, "web server stopped");
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
