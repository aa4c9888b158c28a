//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::types::ActionKind;

/// Process metrics, shared by every account loop through an `Arc`
pub struct Metrics {
    registry: Registry,

    // Executor counters
    pub tx_submitted_total: IntCounter,
    pub tx_confirmed_total: IntCounter,
    pub tx_failed_total: IntCounter,
    pub tx_resubmitted_total: IntCounter,
    pub tx_timed_out_total: IntCounter,

    // Planner counters
    pub gas_estimate_retries_total: IntCounter,

    // Loop counters
    pub loop_restarts_total: IntCounterVec,
    pub actions_recorded_total: IntCounterVec,

    // Gauges
    pub active_accounts: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tx_submitted_total = IntCounter::with_opts(Opts::new(
            "tx_submitted_total",
            "Signed transactions broadcast, resubmissions included",
        ))?;

        let tx_confirmed_total = IntCounter::with_opts(Opts::new(
            "tx_confirmed_total",
            "Transactions with a confirmed outcome",
        ))?;

        let tx_failed_total =
            IntCounter::with_opts(Opts::new("tx_failed_total", "Transactions that failed"))?;

        let tx_resubmitted_total = IntCounter::with_opts(Opts::new(
            "tx_resubmitted_total",
            "Re-broadcasts of a payload after a confirmation timeout",
        ))?;

        let tx_timed_out_total = IntCounter::with_opts(Opts::new(
            "tx_timed_out_total",
            "Transactions still unconfirmed after every resubmission",
        ))?;

        let gas_estimate_retries_total = IntCounter::with_opts(Opts::new(
            "gas_estimate_retries_total",
            "Failed gas estimation attempts",
        ))?;

        let loop_restarts_total = IntCounterVec::new(
            Opts::new("loop_restarts_total", "Account loop restarts after an error"),
            &["address"],
        )?;

        let actions_recorded_total = IntCounterVec::new(
            Opts::new("actions_recorded_total", "Actions appended to the quota ledger"),
            &["kind"],
        )?;

        let active_accounts = IntGauge::with_opts(Opts::new(
            "active_accounts",
            "Account loops currently running",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from first broadcast to receipt",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(tx_submitted_total.clone()))?;
        registry.register(Box::new(tx_confirmed_total.clone()))?;
        registry.register(Box::new(tx_failed_total.clone()))?;
        registry.register(Box::new(tx_resubmitted_total.clone()))?;
        registry.register(Box::new(tx_timed_out_total.clone()))?;
        registry.register(Box::new(gas_estimate_retries_total.clone()))?;
        registry.register(Box::new(loop_restarts_total.clone()))?;
        registry.register(Box::new(actions_recorded_total.clone()))?;
        registry.register(Box::new(active_accounts.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            tx_submitted_total,
            tx_confirmed_total,
            tx_failed_total,
            tx_resubmitted_total,
            tx_timed_out_total,
            gas_estimate_retries_total,
            loop_restarts_total,
            actions_recorded_total,
            active_accounts,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_restart(&self, address: &str) {
        self.loop_restarts_total.with_label_values(&[address]).inc();
    }

    pub fn record_action(&self, kind: ActionKind) {
        self.actions_recorded_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %err, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
