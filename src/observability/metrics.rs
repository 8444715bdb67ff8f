//! Prometheus metrics.
//!
//! Sampleconv is a batch job, so there is no scrape listener: the recorder
//! collects counters in-process and the final snapshot is pushed to a push
//! gateway when the run ends.

use crate::config::{MetricsPushGatewaySettings, MetricsSettings, parse_bool_env, parse_string_env};
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Push gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushGatewayConfig {
    /// Push gateway endpoint URI.
    pub endpoint: String,
    /// Optional username for basic auth.
    pub username: Option<String>,
    /// Optional password for basic auth.
    pub password: Option<String>,
    /// Whether to use HTTP POST instead of PUT.
    pub use_http_post: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Optional push gateway configuration.
    pub push_gateway: Option<PushGatewayConfig>,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        let mut config = Self {
            enabled: settings.and_then(|s| s.enabled).unwrap_or(false),
            push_gateway: settings
                .and_then(|s| s.push_gateway.as_ref())
                .and_then(parse_push_gateway_settings),
        };

        if let Some(enabled) = parse_bool_env("SAMPLECONV_METRICS_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(endpoint) = parse_string_env("SAMPLECONV_METRICS_PUSH_GATEWAY_ENDPOINT") {
            let gateway = config.push_gateway.get_or_insert_with(|| PushGatewayConfig {
                endpoint: String::new(),
                username: None,
                password: None,
                use_http_post: true,
            });
            gateway.endpoint = endpoint;
        }
        if let Some(gateway) = config.push_gateway.as_mut() {
            if let Some(username) = parse_string_env("SAMPLECONV_METRICS_PUSH_GATEWAY_USERNAME") {
                gateway.username = Some(username);
            }
            if let Some(password) = parse_string_env("SAMPLECONV_METRICS_PUSH_GATEWAY_PASSWORD") {
                gateway.password = Some(password);
            }
        }

        config
    }
}

/// Metrics handle for rendering and pushing on shutdown.
#[derive(Debug)]
pub struct MetricsHandle {
    prometheus: PrometheusHandle,
    push_gateway: Option<PushGatewayConfig>,
}

impl MetricsHandle {
    /// Renders the current snapshot in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus.render()
    }
}

/// Installs the Prometheus recorder as the global metrics recorder.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_prometheus(config: &MetricsConfig) -> Result<Option<MetricsHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::op("metrics_recorder_install", e))?;

    Ok(Some(MetricsHandle {
        prometheus,
        push_gateway: config.push_gateway.clone(),
    }))
}

/// Pushes the final snapshot to the push gateway if configured.
///
/// Failures are logged, never returned: metrics must not fail a conversion.
pub fn flush(handle: &MetricsHandle) {
    let Some(push_gateway) = &handle.push_gateway else {
        tracing::debug!("No push gateway configured, skipping flush");
        return;
    };

    let mut payload = handle.render();
    if !payload.ends_with('\n') {
        payload.push('\n');
    }

    tracing::debug!(
        bytes = payload.len(),
        endpoint = %push_gateway.endpoint,
        "Pushing metrics to push gateway"
    );

    let client = Client::new();
    let request = if push_gateway.use_http_post {
        client.post(&push_gateway.endpoint)
    } else {
        client.put(&push_gateway.endpoint)
    };
    let request = match &push_gateway.username {
        Some(username) => request.basic_auth(username, push_gateway.password.as_deref()),
        None => request,
    };

    match request
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .timeout(PUSH_TIMEOUT)
        .body(payload)
        .send()
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!(status = %resp.status(), "Metrics pushed successfully");
        },
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "Metrics push failed");
        },
        Err(err) => {
            tracing::warn!("Failed to push metrics: {err}");
        },
    }
}

fn parse_push_gateway_settings(settings: &MetricsPushGatewaySettings) -> Option<PushGatewayConfig> {
    let trimmed = |value: &Option<String>| {
        value
            .as_ref()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Some(PushGatewayConfig {
        endpoint: trimmed(&settings.endpoint)?,
        username: trimmed(&settings.username),
        password: trimmed(&settings.password),
        // POST keeps metrics from earlier runs in the same group.
        use_http_post: settings.use_http_post.unwrap_or(true),
    })
}
