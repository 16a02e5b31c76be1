//! Portal controller - Kong developer portal sync

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing::{debug, error, info, warn};

use portal_controller::admission::{self, AdmissionState, FileValidator};
use portal_controller::backend::{AdminApi, AdminClient};
use portal_controller::config::Cli;
use portal_controller::controller::{error_policy, reconcile, run_deletion_watch, Context};
use portal_controller::crd::KongFile;
use portal_controller::proxy::{CachedProxyResolver, Proxy};
use portal_controller::retry::retry_with_backoff_if;
use portal_controller::store::CacheStore;
use portal_controller::{health, telemetry, Error, SHUTDOWN_GRACE_PERIOD};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&KongFile::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    telemetry::init_logging(&cli.log_level, cli.log_format)?;

    run_controller(cli).await
}

/// Connect to Kong and Kubernetes, then reconcile until a shutdown signal
async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    let admin_config = cli.admin_client_config()?;
    let timeout = admin_config.timeout;
    let admin: Arc<dyn AdminApi> = Arc::new(AdminClient::new(&admin_config)?);
    let store = Arc::new(CacheStore::new());

    info!(url = %admin_config.url, "Connecting to Kong Admin API");
    let resolver = retry_with_backoff_if(
        &cli.init_retry(),
        "proxy_initialize",
        Error::is_retryable,
        || CachedProxyResolver::initialize(admin.clone(), store.clone(), timeout),
    )
    .await?;
    if resolver.needs_leader_election() {
        warn!("Kong uses a shared database; run a single controller replica per class");
    }
    let proxy: Arc<dyn Proxy> = Arc::new(resolver);

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let health_addr = cli.health_addr()?;
    let health_handle = axum_server::Handle::new();
    let health_task = tokio::spawn(health::serve(
        health_addr,
        proxy.clone(),
        health_handle.clone(),
    ));

    let admission_handle = axum_server::Handle::new();
    let admission_task = match cli.admission_server_config() {
        Some(server_config) => {
            // Bad TLS material is fatal before any reconciliation starts
            server_config.key_pair()?;
            let state = Arc::new(AdmissionState::new(Arc::new(FileValidator)));
            let handle = admission_handle.clone();
            Some(tokio::spawn(async move {
                admission::serve(&server_config, state, handle).await
            }))
        }
        None => {
            info!("Admission webhook disabled");
            None
        }
    };

    let ctx = Arc::new(Context::new(
        client.clone(),
        proxy.clone(),
        cli.controller_class.clone(),
    ));

    let apis: Vec<(Api<KongFile>, Option<String>)> = if cli.watch_namespaces.is_empty() {
        vec![(Api::all(client.clone()), None)]
    } else {
        cli.watch_namespaces
            .iter()
            .map(|ns| (Api::namespaced(client.clone(), ns), Some(ns.clone())))
            .collect()
    };

    info!(
        controller_class = %cli.controller_class,
        namespaces = ?cli.watch_namespaces,
        "Starting KongFile controller"
    );

    let mut deletion_watches = Vec::with_capacity(apis.len());
    let mut controllers = Vec::with_capacity(apis.len());
    for (api, namespace) in apis {
        deletion_watches.push(tokio::spawn(run_deletion_watch(
            api.clone(),
            namespace,
            ctx.clone(),
        )));
        controllers.push(
            Controller::new(api, WatcherConfig::default())
                .shutdown_on_signal()
                .run(reconcile, error_policy, ctx.clone())
                .for_each(|result| async move {
                    match result {
                        Ok(action) => debug!(?action, "Reconciliation completed"),
                        Err(e) => error!(error = ?e, "Reconciliation error"),
                    }
                }),
        );
    }

    futures::future::join_all(controllers).await;
    info!("Controllers stopped, shutting down servers");

    for watch in deletion_watches {
        watch.abort();
    }

    admission_handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
    if let Some(task) = admission_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Admission webhook server failed"),
            Err(e) => error!(error = %e, "Admission webhook task panicked"),
        }
    }

    health_handle.shutdown();
    match health_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Health probe server failed"),
        Err(e) => error!(error = %e, "Health probe task panicked"),
    }

    info!("Shutdown complete");
    Ok(())
}
