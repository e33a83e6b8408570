//! Prometheus metrics for the orchestrator.
//!
//! All metrics are aggregated in the [`Metrics`] struct for easy tracking and management.

use alloy_primitives::U256;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Aggregated metrics for the orchestrator.
///
/// Metrics are registered with the global metrics registry on creation. Without an
/// installed recorder every call is a no-op, which is what the tests rely on.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance and register all metric descriptions.
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        // Scan metrics
        describe_counter!(
            "orchestrator_scans_total",
            "Total number of pending withdrawal scans"
        );
        describe_gauge!(
            "orchestrator_pending_withdrawals",
            "Number of pending withdrawals by status"
        );
        describe_gauge!(
            "orchestrator_active_finalizers",
            "Number of finalizers currently running"
        );

        // Phase metrics
        describe_counter!(
            "orchestrator_phase_transitions_total",
            "Total phase transitions by phase entered"
        );
        describe_histogram!(
            "orchestrator_phase_duration_seconds",
            "Time spent in each phase in seconds"
        );

        // Withdrawal metrics
        describe_counter!(
            "orchestrator_withdrawals_proven_total",
            "Total number of withdrawals proven on L1"
        );
        describe_counter!(
            "orchestrator_withdrawals_finalized_total",
            "Total number of withdrawals finalized on L1"
        );
        describe_counter!(
            "orchestrator_withdrawals_failed_total",
            "Total number of withdrawals that failed, by phase"
        );
        describe_counter!(
            "orchestrator_withdrawal_amount_wei_total",
            "Total amount finalized in wei"
        );

        // Gas metrics
        describe_counter!(
            "orchestrator_gas_spent_wei_total",
            "Total transaction fees paid in wei"
        );
        describe_gauge!(
            "orchestrator_gas_budget_remaining_wei",
            "Remaining shared gas budget in wei"
        );
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Scan metrics
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn record_scan(&self) {
        counter!("orchestrator_scans_total").increment(1);
    }

    /// Set the count of pending withdrawals by status.
    pub fn set_pending_withdrawals(&self, status: &str, count: usize) {
        gauge!("orchestrator_pending_withdrawals", "status" => status.to_string()).set(count as f64);
    }

    pub fn set_active_finalizers(&self, count: usize) {
        gauge!("orchestrator_active_finalizers").set(count as f64);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Phase metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Record leaving `from` after `duration` and entering `to`.
    pub fn record_phase_transition(&self, from: &str, to: &str, duration: Duration) {
        counter!("orchestrator_phase_transitions_total", "phase" => to.to_string()).increment(1);
        histogram!("orchestrator_phase_duration_seconds", "phase" => from.to_string())
            .record(duration.as_secs_f64());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Withdrawal metrics
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn record_withdrawal_proven(&self) {
        counter!("orchestrator_withdrawals_proven_total").increment(1);
    }

    pub fn record_withdrawal_finalized(&self, amount_wei: U256) {
        counter!("orchestrator_withdrawals_finalized_total").increment(1);
        counter!("orchestrator_withdrawal_amount_wei_total").increment(saturating_u64(amount_wei));
    }

    pub fn record_withdrawal_failed(&self, phase: &str) {
        counter!("orchestrator_withdrawals_failed_total", "phase" => phase.to_string()).increment(1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Gas metrics
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn record_gas_spent(&self, fee_wei: U256) {
        counter!("orchestrator_gas_spent_wei_total").increment(saturating_u64(fee_wei));
    }

    pub fn set_gas_budget_remaining(&self, remaining_wei: U256) {
        gauge!("orchestrator_gas_budget_remaining_wei")
            .set(u128::try_from(remaining_wei).unwrap_or(u128::MAX) as f64);
    }
}

fn saturating_u64(value: U256) -> u64 {
    value.try_into().unwrap_or(u64::MAX)
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
