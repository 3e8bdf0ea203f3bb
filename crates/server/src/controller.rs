//! Process lifecycle: bind the listener, install handlers, start the
//! scheduler/poller/session sweep, and orchestrate a graceful shutdown.
//!
//! Mirrors the teacher's single long-lived `run_server` future, but
//! split into an explicit `start`/`stop` pair so the binary can wire a
//! shutdown hook (and so tests can start and stop a controller in the
//! same process without exiting it).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use adaptor_domain::config::{Config, ConfigChangePublisher, ConfigSeverity};
use adaptor_domain::error::{Error, Result};
use adaptor_domain::TraceEvent;
use adaptor_feed::{
    spawn_incremental_poll, BackoffPolicy, CronSchedule, FeedPusher, FeedSender, FeedType,
    OneShotGate, PollHandle, ScheduleHandle,
};

use crate::state::AppState;

/// Drives the request listener and the background push/poll/sweep
/// tasks for one process run. `start`/`stop` are mutually exclusive,
/// guarded by `started` — a second `start()` before a matching `stop()`
/// returns an error rather than spawning a second set of tasks.
pub struct Controller {
    state: AppState,
    config_publisher: Arc<ConfigChangePublisher>,
    started: AtomicBool,
    handles: AsyncMutex<Option<Handles>>,
}

struct Handles {
    local_addr: SocketAddr,
    server_task: JoinHandle<()>,
    tls_connections: Option<Arc<AsyncMutex<tokio::task::JoinSet<()>>>>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    schedule: ScheduleHandle,
    full_push_gate: OneShotGate,
    poll_handle: Option<PollHandle>,
    sweep_task: JoinHandle<()>,
}

impl Controller {
    pub fn new(state: AppState, config_publisher: Arc<ConfigChangePublisher>) -> Self {
        Self {
            state,
            config_publisher,
            started: AtomicBool::new(false),
            handles: AsyncMutex::new(None),
        }
    }

    /// Binds the listener, installs the router, initializes the
    /// adaptor, and starts the full-push schedule, incremental poller
    /// (if the adaptor opts in), and session sweep. Returns the bound
    /// address, useful when `server.port` is `0` (ephemeral).
    ///
    /// A second call before `stop()` fails with a fatal error rather
    /// than standing up a second listener and task set.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Fatal("controller already started".to_string()));
        }
        match self.start_inner().await {
            Ok(addr) => Ok(addr),
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    async fn start_inner(&self) -> Result<SocketAddr> {
        let config = self.state.config_snapshot();

        self.state
            .adaptor
            .init()
            .await
            .map_err(|err| Error::Fatal(format!("adaptor init failed: {err}")))?;

        let router = crate::api::router(self.state.clone());
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let mut tls_connections = None;
        let server_task = match &config.server.tls {
            Some(tls) => {
                let acceptor = crate::tls::build_acceptor(tls)?;
                let connections = Arc::new(AsyncMutex::new(tokio::task::JoinSet::new()));
                tls_connections = Some(connections.clone());
                tracing::info!(addr = %local_addr, "adaptor listening (TLS, client cert requested)");
                tokio::spawn(async move {
                    crate::tls::serve_tls(listener, acceptor, router, shutdown_rx, connections).await;
                })
            }
            None => tokio::spawn(async move {
                tracing::info!(addr = %local_addr, "adaptor listening");
                let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
                let result = axum::serve(listener, make_service)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
                if let Err(err) = result {
                    tracing::error!(error = %err, "server task exited with error");
                }
            }),
        };

        let full_push_gate = OneShotGate::new("full-push");
        let schedule_expr = CronSchedule::parse(&config.adaptor.full_listing_schedule)
            .map_err(|err| Error::Fatal(format!("invalid full_listing_schedule: {}", err.0)))?;

        let schedule = {
            let adaptor = self.state.adaptor.clone();
            let sender = build_feed_sender(&config);
            let codec = self.state.codec.clone();
            let journal = self.state.journal.clone();
            let datasource = config.appliance.datasource.clone();
            ScheduleHandle::spawn(schedule_expr, full_push_gate.clone(), move |_cancel| {
                let adaptor = adaptor.clone();
                let sender = sender.clone();
                let codec = codec.clone();
                let journal = journal.clone();
                let datasource = datasource.clone();
                async move {
                    let pusher = FeedPusher::new(
                        sender,
                        codec,
                        datasource,
                        journal,
                        "full",
                        FeedType::FullReplace,
                    );
                    if let Err(err) = FeedPusher::run(adaptor.as_ref(), pusher).await {
                        tracing::warn!(error = %err, "scheduled full push failed");
                    }
                }
            })
        };

        let poll_handle = {
            let adaptor = self.state.adaptor.clone();
            let sender = build_feed_sender(&config);
            let codec = self.state.codec.clone();
            let journal = self.state.journal.clone();
            let datasource = config.appliance.datasource.clone();
            let poll_gate = OneShotGate::new("incremental-poll");
            spawn_incremental_poll(
                adaptor,
                Duration::from_secs(config.adaptor.incremental_poll_period_secs),
                poll_gate,
                move || {
                    FeedPusher::new(
                        sender.clone(),
                        codec.clone(),
                        datasource.clone(),
                        journal.clone(),
                        "incremental",
                        FeedType::Incremental,
                    )
                },
            )
        };

        let sweep_task = {
            let sessions = self.state.sessions.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                loop {
                    interval.tick().await;
                    sessions.sweep_if_due();
                }
            })
        };

        *self.handles.lock().await = Some(Handles {
            local_addr,
            server_task,
            tls_connections,
            shutdown_tx,
            schedule,
            full_push_gate,
            poll_handle,
            sweep_task,
        });

        Ok(local_addr)
    }

    /// Cancels the scheduled push, stops the incremental poller and
    /// session sweep, gives in-flight requests `max_delay` to finish,
    /// then calls `adaptor.destroy()`. A no-op if not currently started.
    pub async fn stop(&self, max_delay: Duration) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        let handles = self.handles.lock().await.take();
        let Some(handles) = handles else {
            return;
        };

        handles.schedule.cancel();
        handles.full_push_gate.stop(max_delay).await;
        if let Some(poll_handle) = handles.poll_handle {
            poll_handle.stop().await;
        }
        handles.sweep_task.abort();

        let deadline = tokio::time::Instant::now() + max_delay;
        let _ = handles.shutdown_tx.send(());
        if tokio::time::timeout(max_delay, handles.server_task)
            .await
            .is_err()
        {
            tracing::warn!("server task did not finish within the shutdown grace period");
        }

        if let Some(connections) = handles.tls_connections {
            let mut set = connections.lock().await;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, set.join_next()).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            if !set.is_empty() {
                tracing::warn!(
                    remaining = set.len(),
                    "aborting in-flight TLS connections after shutdown grace period"
                );
                set.abort_all();
            }
        }

        self.state.adaptor.destroy().await;
    }

    /// Returns `true` while a matching `start()`/`stop()` pair is open.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Validates, installs, and fans out a new configuration: swaps the
    /// snapshot `AppState` readers see, reschedules the full-push cron
    /// (an invalid new expression keeps the previous schedule rather
    /// than aborting the reload), notifies the adaptor if it declared
    /// `config_listener`, then publishes to every other subscriber.
    pub async fn reload_config(&self, new_config: Config) -> Result<()> {
        let issues = new_config.validate_report();
        let error_count = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .count();
        if error_count > 0 {
            return Err(Error::from(issues));
        }
        let warning_count = issues.len();

        let new_config = Arc::new(new_config);
        self.state.replace_config(new_config.clone());

        if let Some(handles) = self.handles.lock().await.as_ref() {
            if let Err(err) = handles
                .schedule
                .reschedule(&new_config.adaptor.full_listing_schedule)
            {
                tracing::warn!(
                    error = %err.0,
                    "config reload: new full_listing_schedule is invalid, keeping previous schedule"
                );
            }
        }

        if self.state.adaptor.capabilities().config_listener {
            self.state.adaptor.on_config_changed(&new_config).await;
        }
        self.config_publisher.publish(&new_config);

        TraceEvent::ConfigReloaded { error_count, warning_count }.emit();
        Ok(())
    }
}

fn build_feed_sender(config: &Config) -> Arc<FeedSender> {
    let policy = BackoffPolicy {
        initial: Duration::from_secs(config.adaptor.feed_initial_backoff_secs),
        cap: Duration::from_secs(config.adaptor.feed_backoff_cap_secs),
        max_attempts: config.adaptor.feed_max_attempts,
    };
    Arc::new(FeedSender::new(
        reqwest::Client::new(),
        config.appliance.feed_url(),
        policy,
    ))
}
