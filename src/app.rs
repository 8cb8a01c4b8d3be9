use crate::config::Config;
use crate::congress::{CongressApi, Fetcher, HttpTransport};
use crate::data::{PgStore, Store};
use crate::ingest::scheduler::TaskIntervals;
use crate::ingest::{Ingest, IngestSettings, Scheduler, TaskName, reference};
use crate::pacer::{Pacer, PacerSettings};
use crate::state::{AppState, ServiceStatus};
use crate::summarizer::gemini::GeminiSummarizer;
use crate::summarizer::{DisabledSummarizer, PacedSummarizer, Summarizer};
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use chrono::Utc;
use sqlx::ConnectOptions;
use sqlx::postgres::PgPoolOptions;
use std::num::NonZeroU32;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Timeout for a single Congress.gov request.
const CONGRESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Summaries of long documents can take a while.
const SUMMARIZER_TIMEOUT: Duration = Duration::from_secs(120);

/// Back-to-back Congress.gov calls allowed before spacing applies.
const CONGRESS_BURST: u32 = 10;

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    ingest: Arc<Ingest>,
    app_state: AppState,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let slow_threshold = Duration::from_millis(500);

        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 8,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let congress_pacer = Pacer::new(
            "congress",
            PacerSettings::per_hour(
                NonZeroU32::new(config.congress_requests_per_hour)
                    .context("CONGRESS_REQUESTS_PER_HOUR must be positive")?,
                NonZeroU32::new(CONGRESS_BURST).unwrap_or(NonZeroU32::MIN),
                config.congress_cooldown,
            ),
        )?;
        let base_url = url::Url::parse(&config.congress_base_url)
            .context("Invalid CONGRESS_BASE_URL")?;
        let transport = HttpTransport::new(CONGRESS_TIMEOUT)?;
        let fetcher = Fetcher::new(
            Arc::new(transport),
            Arc::new(congress_pacer),
            base_url,
            config.congress_api_key.clone(),
        );
        let congress_api = Arc::new(CongressApi::new(fetcher));

        let summarizer = Self::build_summarizer(&config)?;

        let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool.clone()));
        let ingest = Arc::new(Ingest::new(
            congress_api.clone(),
            store.clone(),
            summarizer,
            IngestSettings {
                member_workers: config.member_workers,
                bill_workers: config.bill_workers,
                bills_lookback: config.bills_lookback,
            },
        ));

        let app_state = AppState::new(db_pool, store, congress_api);

        Ok(App {
            config,
            ingest,
            app_state,
        })
    }

    /// Gemini when a key is configured; otherwise summaries are skipped.
    fn build_summarizer(config: &Config) -> Result<Arc<PacedSummarizer>, anyhow::Error> {
        let pacer = Pacer::new(
            "summarizer",
            PacerSettings::per_minute(
                NonZeroU32::new(config.summarizer_rpm)
                    .context("SUMMARIZER_RPM must be positive")?,
                config.summarizer_cooldown,
            ),
        )?;

        let inner: Arc<dyn Summarizer> = match config.summarizer_key() {
            Some(key) => {
                info!(model = %config.summarizer_model, "summarizer enabled");
                Arc::new(GeminiSummarizer::new(
                    &config.summarizer_base_url,
                    config.summarizer_model.clone(),
                    key,
                    SUMMARIZER_TIMEOUT,
                )?)
            }
            None => {
                warn!("SUMMARIZER_API_KEY not set, summaries will be skipped");
                Arc::new(DisabledSummarizer)
            }
        };
        Ok(Arc::new(PacedSummarizer::new(inner, Arc::new(pacer))))
    }

    /// Runs the web server and the scheduler until a shutdown signal arrives.
    pub async fn serve(self) -> ExitCode {
        // Non-fatal: the reference task syncs sessions from upstream anyway.
        match reference::seed_sessions(self.ingest.store.as_ref(), Utc::now().date_naive()).await {
            Ok(counts) if counts.created > 0 => {
                info!(created = counts.created, "Seeded missing sessions")
            }
            Ok(_) => {}
            Err(e) => warn!(error = ?e, "Failed to seed sessions on startup (non-fatal)"),
        }

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let statuses = self.app_state.service_statuses.clone();

        let mut web_handle = {
            let mut shutdown_rx = shutdown_tx.subscribe();
            let router = create_router(self.app_state.clone());
            let port = self.config.port;
            let statuses = statuses.clone();
            tokio::spawn(async move {
                statuses.set("web", ServiceStatus::Starting);
                let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!(error = ?e, %addr, "Failed to bind web server");
                        statuses.set("web", ServiceStatus::Error);
                        return;
                    }
                };
                info!(%addr, "web server listening");
                statuses.set("web", ServiceStatus::Active);

                let result = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown_rx.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    error!(error = ?e, "web server exited with error");
                    statuses.set("web", ServiceStatus::Error);
                }
            })
        };

        let scheduler_handle = {
            let shutdown_rx = shutdown_tx.subscribe();
            let scheduler = Scheduler::new(self.ingest.clone(), TaskIntervals::default());
            let statuses = statuses.clone();
            tokio::spawn(async move {
                statuses.set("scheduler", ServiceStatus::Active);
                scheduler.run(shutdown_rx).await;
            })
        };

        let web_finished = tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received, stopping services");
                false
            }
            _ = &mut web_handle => {
                error!("Web server stopped unexpectedly, shutting down");
                true
            }
        };

        let _ = shutdown_tx.send(());
        let start = Instant::now();
        let mut handles = vec![scheduler_handle];
        if !web_finished {
            handles.push(web_handle);
        }
        let all = futures::future::join_all(handles);
        match tokio::time::timeout(self.config.shutdown_timeout, all).await {
            Ok(_) => {
                info!(duration = fmt_duration(start.elapsed()), "All services stopped");
                if web_finished || matches!(statuses.get("web"), Some(ServiceStatus::Error)) {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(_) => {
                warn!(
                    timeout = fmt_duration(self.config.shutdown_timeout),
                    "Services did not stop in time, exiting anyway"
                );
                ExitCode::FAILURE
            }
        }
    }

    /// Runs a single task and persists its timestamp on success.
    pub async fn run_task(self, task: TaskName, force: bool) -> anyhow::Result<()> {
        let start = Instant::now();
        self.ingest.run_task(task, force).await?;
        info!(
            task = task.as_str(),
            duration = fmt_duration(start.elapsed()),
            "task completed"
        );
        self.ingest
            .store
            .set_timestamp(crate::ingest::scheduler::kv_key(task), Utc::now())
            .await
    }

    pub async fn sweep(self) -> anyhow::Result<()> {
        self.ingest.sweep().await.map(|_| ())
    }

    pub async fn seed_sessions(self) -> anyhow::Result<()> {
        let counts =
            reference::seed_sessions(self.ingest.store.as_ref(), Utc::now().date_naive()).await?;
        info!(seen = counts.seen, created = counts.created, "sessions seeded");
        Ok(())
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
