use crate::api::routes;
use crate::apply::MutationSerializer;
use crate::config::SharedConfig;
use crate::record_store::DynRecordStore;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub store: DynRecordStore,
    pub serializer: MutationSerializer,
}

/// The external-dns webhook router, without a listener. Requests must carry
/// [`ConnectInfo<SocketAddr>`][axum::extract::ConnectInfo] for the ACL check.
pub fn router(
    config: SharedConfig,
    store: DynRecordStore,
    serializer: MutationSerializer,
) -> Router {
    routes::provider(AppState {
        config,
        store,
        serializer,
    })
}

/// The health check router, without a listener.
pub fn health_router() -> Router {
    routes::health()
}

/// Bind the webhook API to [`Config::api_bind_addr`][crate::config::Config::api_bind_addr]. The
/// returned future serves requests until `shutdown` completes and in-flight requests finish.
///
/// # Errors
///
/// Returns an error if the address can't be bound.
pub fn new(
    config: SharedConfig,
    store: DynRecordStore,
    serializer: MutationSerializer,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> hyper::Result<impl Future<Output = hyper::Result<()>>> {
    let addr = config.api_bind_addr;
    let app = router(config, store, serializer);
    Ok(axum::Server::try_bind(&addr)?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown))
}

/// Bind the health check to [`Config::health_bind_addr`][crate::config::Config::health_bind_addr].
///
/// # Errors
///
/// Returns an error if the address can't be bound.
pub fn new_health(
    config: &SharedConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> hyper::Result<impl Future<Output = hyper::Result<()>>> {
    Ok(axum::Server::try_bind(&config.health_bind_addr)?
        .serve(health_router().into_make_service())
        .with_graceful_shutdown(shutdown))
}
