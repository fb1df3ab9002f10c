//! Prometheus metrics recording and endpoint.

use std::sync::{Mutex, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALL: Mutex<()> = Mutex::new(());

/// Install the Prometheus recorder once per process and return its handle.
pub fn install_prometheus_recorder() -> anyhow::Result<&'static PrometheusHandle> {
    let _guard = INSTALL.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(handle) = HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(HANDLE.get_or_init(|| handle))
}

/// Render the current metrics, or nothing if no recorder is installed.
pub fn render() -> String {
    HANDLE.get().map(|h| h.render()).unwrap_or_default()
}

/// Record a new display connection.
pub fn record_ws_connect() {
    metrics::gauge!("display_connections_active").increment(1.0);
}

/// Record a display disconnection.
pub fn record_ws_disconnect() {
    metrics::gauge!("display_connections_active").decrement(1.0);
}

/// Record a dispatched command with its duration.
pub fn record_command(command: &str, duration_secs: f64) {
    let labels = [("command", command.to_string())];
    metrics::counter!("commands_total", &labels).increment(1);
    metrics::histogram!("command_duration_seconds", &labels).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        let first = install_prometheus_recorder().unwrap() as *const PrometheusHandle;
        let second = install_prometheus_recorder().unwrap() as *const PrometheusHandle;
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_command_shows_up() {
        install_prometheus_recorder().unwrap();
        record_command("GETWORKDIR", 0.001);
        assert!(render().contains("commands_total"));
    }

    #[test]
    fn test_gauges_do_not_panic() {
        record_ws_connect();
        record_ws_disconnect();
    }
}
