use anyhow::Context;
use listing_sync::api::{self, AppState};
use listing_sync::config::AppConfig;
use listing_sync::leads::{InMemoryLeadStore, StoreLeadResolver};
use listing_sync::matching::{InMemoryMatchStore, MatchingEngine};
use listing_sync::sources::{HttpListingAdapter, ListingSources, SourceAdapter};
use listing_sync::sync::SyncScheduler;
use listing_sync::telemetry;
use listing_sync::webhooks::{InboundWebhookHandler, WebhookDispatcher, WebhookRegistry};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    info!("🏠 Listing Sync - provider sync & tenant notifications");

    let leads = match &config.leads_path {
        Some(path) => Arc::new(InMemoryLeadStore::from_json_file(path).await?),
        None => {
            warn!("LEADS_PATH not set, starting with an empty lead store");
            Arc::new(InMemoryLeadStore::default())
        }
    };
    info!("Loaded {} leads", leads.len());

    let matches = Arc::new(InMemoryMatchStore::default());
    let engine = MatchingEngine::new(leads.clone(), matches.clone());
    let registry = WebhookRegistry::in_memory();
    let dispatcher = WebhookDispatcher::new(registry.clone(), config.webhooks.dispatcher_config());

    let mut sources = ListingSources::new();
    let mut scheduler = SyncScheduler::new(leads.clone(), engine.clone());
    if config.sync.notify_tenants {
        scheduler = scheduler.with_dispatcher(dispatcher.clone());
    }
    for source_config in &config.sync.sources {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(
            HttpListingAdapter::new(source_config.source, &source_config.base_url)
                .with_context(|| format!("Failed to set up {} adapter", source_config.source))?,
        );
        sources.register(adapter.clone());
        scheduler = scheduler.with_source(adapter, config.sync.source_config(source_config));
    }
    let scheduler = scheduler.build();

    if sources.is_empty() {
        warn!("No listing sources configured; set ZILLOW_API_URL, REALTOR_API_URL or MLS_API_URL");
    }
    scheduler.start();

    let resolver = Arc::new(StoreLeadResolver::new(leads, matches));
    let inbound = InboundWebhookHandler::new(resolver, engine.clone(), dispatcher)
        .with_provider_secrets(config.webhooks.inbound_secrets.clone());

    let app = api::router(AppState {
        registry,
        engine,
        inbound,
        sources,
    });

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
