use anyhow::{anyhow, Result};
use dnsmasq_webhook::{Config, SharedConfig};
use is_terminal::IsTerminal;
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("dnsmasq-webhook".to_string()),
        first_args.next(),
    );

    let config = config_init(&program_name, config_file)?;
    let store = config.record_store().await?;
    let serializer = config.serializer(store.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    tracing::info!("API listening on {}", &config.api_bind_addr);
    let api_server = dnsmasq_webhook::api::new(
        config.clone(),
        store,
        serializer,
        shutdown_requested(shutdown_rx.clone()),
    )?;
    let mut api_handle = tokio::spawn(api_server);

    tracing::info!("health check listening on {}", &config.health_bind_addr);
    let health_server = dnsmasq_webhook::api::new_health(&config, shutdown_requested(shutdown_rx))?;
    let mut health_handle = tokio::spawn(health_server);

    tracing::info!(
        domain_filter = ?config.domain_filter,
        dnsmasq_dir = %config.dnsmasq_dir.display(),
        dry_run = config.dry_run,
        record_cache = config.record_cache,
        "dnsmasq webhook provider is running"
    );

    tokio::select! {
        signal = shutdown_signal() => {
            tracing::info!("shutdown signal received ({signal})");
        },
        res = &mut api_handle => return server_stopped("API", res),
        res = &mut health_handle => return server_stopped("health check", res),
    }

    // Ignore the send error: it only means both servers already stopped.
    let _ = shutdown_tx.send(());
    let drained = tokio::time::timeout(config.shutdown_timeout, async {
        let (api_res, health_res) = tokio::join!(api_handle, health_handle);
        api_res??;
        health_res??;
        Ok::<(), anyhow::Error>(())
    })
    .await;

    match drained {
        Ok(res) => res?,
        Err(_) => {
            tracing::error!("forced shutdown after {:?}", config.shutdown_timeout);
            return Err(anyhow!(
                "servers did not stop within {:?}",
                config.shutdown_timeout
            ));
        }
    }
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnsmasq_webhook=info,tower_http=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}

fn shutdown_requested(mut rx: watch::Receiver<()>) -> impl Future<Output = ()> {
    async move {
        // An error means the sender is gone, which is a shutdown too.
        let _ = rx.changed().await;
    }
}

async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        let mut terminate = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(err) => {
                tracing::warn!("can't listen for SIGTERM: {err}");
                let _ = signal::ctrl_c().await;
                return "SIGINT";
            }
        };
        tokio::select! {
            _ = signal::ctrl_c() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        "SIGINT"
    }
}

fn server_stopped(name: &str, res: Result<hyper::Result<()>, JoinError>) -> Result<()> {
    match res {
        Ok(Ok(())) => Err(anyhow!("{name} server stopped unexpectedly")),
        Ok(Err(err)) => Err(err.into()),
        Err(err) => Err(err.into()),
    }
}
