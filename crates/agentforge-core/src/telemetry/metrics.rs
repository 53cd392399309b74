//! Prometheus metrics for AgentForge actions
//!
//! - `agentforge_action_requests_total` (counter) by operation and outcome
//! - `agentforge_generation_duration_seconds` (histogram) by operation
//! - `agentforge_generations_in_flight` (gauge)

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};
use crate::contracts::Operation;

/// How an action invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Invalid,
    Failed,
    Cancelled,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Success => "success",
            ActionOutcome::Invalid => "invalid",
            ActionOutcome::Failed => "failed",
            ActionOutcome::Cancelled => "cancelled",
        }
    }
}

pub struct ActionMetrics {
    requests_total: CounterVec,
    generation_duration_seconds: HistogramVec,
    generations_in_flight: Gauge,
}

impl ActionMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = CounterVec::new(
            Opts::new(
                "action_requests_total",
                "Total number of action invocations by outcome",
            )
            .namespace("agentforge"),
            &["operation", "outcome"],
        )?;

        let generation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "generation_duration_seconds",
                "Generative backend call duration in seconds",
            )
            .namespace("agentforge")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["operation"],
        )?;

        let generations_in_flight = Gauge::with_opts(
            Opts::new(
                "generations_in_flight",
                "Generative backend calls currently in progress",
            )
            .namespace("agentforge"),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(generation_duration_seconds.clone()))?;
        registry.register(Box::new(generations_in_flight.clone()))?;

        Ok(Self {
            requests_total,
            generation_duration_seconds,
            generations_in_flight,
        })
    }

    /// Metrics bound to a private registry, for callers that never export them
    pub fn detached() -> Result<Self> {
        Self::new(&Registry::new())
    }

    pub fn record_outcome(&self, operation: Operation, outcome: ActionOutcome) {
        self.requests_total
            .with_label_values(&[operation.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn outcome_count(&self, operation: Operation, outcome: ActionOutcome) -> u64 {
        self.requests_total
            .with_label_values(&[operation.as_str(), outcome.as_str()])
            .get() as u64
    }

    pub fn in_flight(&self) -> i64 {
        self.generations_in_flight.get() as i64
    }

    /// Start timing a backend call; duration is recorded when the guard drops
    pub fn start_generation(&self, operation: Operation) -> GenerationTimer<'_> {
        self.generations_in_flight.inc();
        GenerationTimer {
            start: Instant::now(),
            operation,
            metrics: self,
        }
    }
}

/// RAII guard for timing generative calls
pub struct GenerationTimer<'a> {
    start: Instant,
    operation: Operation,
    metrics: &'a ActionMetrics,
}

impl GenerationTimer<'_> {
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for GenerationTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .generation_duration_seconds
            .with_label_values(&[self.operation.as_str()])
            .observe(self.start.elapsed().as_secs_f64());
        self.metrics.generations_in_flight.dec();
    }
}

/// Registry owning all AgentForge metrics
pub struct MetricsRegistry {
    registry: Registry,
    actions: Arc<ActionMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let actions = Arc::new(ActionMetrics::new(&registry)?);
        Ok(Self { registry, actions })
    }

    pub fn actions(&self) -> Arc<ActionMetrics> {
        Arc::clone(&self.actions)
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| TelemetryError::MetricsError(prometheus::Error::Msg(e.to_string())))
    }
}
