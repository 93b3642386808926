//! # Application State Management
//!
//! Shared state handed to every HTTP handler and WebSocket actor through `web::Data`.
//!
//! ## What lives here:
//! - **config**: Effective configuration, fixed after startup
//! - **metrics**: Request counters updated by the metrics middleware
//! - **setup_store**: Last interview setup posted to `/api/setup`
//! - **registry**: Live interview sessions keyed by `pc_id`
//! - **connector / signaling**: Offer handling and the media bridge lookup
//!
//! ## Thread Safety Pattern:
//! `AppState` is cheap to clone: every field is an `Arc`. Mutable pieces sit behind
//! `RwLock`s (metrics, setup store, registry) so many requests read concurrently and
//! writers hold the lock only for the update itself.

use crate::config::AppConfig;
use crate::services::Collaborators;
use crate::session::SessionRegistry;
use crate::setup::SetupStore;
use crate::signaling::SignalingManager;
use crate::transport::local::LocalPeerConnector;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    /// Request metrics, written by `MetricsMiddleware` on every request
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (read-only, no lock needed)
    pub start_time: Instant,

    pub setup_store: Arc<SetupStore>,
    pub registry: Arc<SessionRegistry>,
    pub connector: Arc<LocalPeerConnector>,
    pub signaling: Arc<SignalingManager>,
}

/// Request metrics collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,

    /// Interview sessions that reached the connected state since startup
    pub sessions_started: u64,

    /// Sessions that left the registry, connected or not
    pub sessions_ended: u64,

    /// Key: endpoint (e.g. "POST /api/offer")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Wire the registry, the media bridge connector and the signaling manager together.
    ///
    /// The session counters are fed by signaling listeners, so `sessions_started` counts
    /// sessions whose transport actually came up rather than accepted offers.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let setup_store = Arc::new(SetupStore::new());
        let registry = Arc::new(SessionRegistry::new(config.performance.max_concurrent_sessions));
        let connector = Arc::new(LocalPeerConnector::new(config.pipeline.audio_sample_rate));
        let signaling = Arc::new(SignalingManager::new(
            &config,
            registry.clone(),
            connector.clone(),
            setup_store.clone(),
            collaborators,
        ));
        let metrics = Arc::new(RwLock::new(AppMetrics::default()));

        let counter = metrics.clone();
        signaling.on_connected(move |_| {
            counter.write().sessions_started += 1;
        });
        let counter = metrics.clone();
        signaling.on_disconnected(move |_| {
            counter.write().sessions_ended += 1;
        });

        Self {
            config: Arc::new(config),
            metrics,
            start_time: Instant::now(),
            setup_store,
            registry,
            connector,
            signaling,
        }
    }

    pub fn get_config(&self) -> AppConfig {
        self.config.as_ref().clone()
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write();
        metrics.error_count += 1;
    }

    /// Record one finished request for `endpoint`.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write();

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Number of sessions currently in the registry.
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Copy of the current metrics, taken under a single read lock.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
