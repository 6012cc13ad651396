use anyhow::Result;
use queuestats::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct UtcTimer;

impl FormatTime for UtcTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(UtcTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let store = Arc::new(
        sample_store::SampleStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    store.init().await?;

    let live_queue = Arc::new(live_queue::LiveQueue::new());
    let notifier: Option<Arc<dyn alerts::Notifier>> = app_config
        .alerts
        .webhook_url
        .clone()
        .map(|url| Arc::new(alerts::DiscordWebhook::new(url)) as Arc<dyn alerts::Notifier>);
    let publisher: Arc<dyn report::DocumentPublisher> = store.clone();

    let jobs = scheduler::ServiceJobs {
        sampler: sampler::Sampler::new(
            store.clone(),
            live_queue.clone(),
            notifier,
            app_config.alerts.clone(),
        ),
        store: store.clone(),
        publisher: publisher.clone(),
        report: app_config.report.clone(),
        rollup: app_config.rollup.clone(),
    };
    let mut job_scheduler = scheduler::Scheduler::new(
        Arc::new(jobs),
        Duration::from_secs(app_config.schedule.job_timeout_secs),
    );
    job_scheduler.reconcile(&scheduler::desired_jobs(&app_config.schedule))?;

    let app = routes::app(live_queue, publisher, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            job_scheduler.cancel_all();
        }
    }

    Ok(())
}
