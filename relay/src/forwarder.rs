use crate::envelope::{EventEnvelope, now_iso};
use crate::errors::RelayError;
use crate::metrics_defs::{RELAY_DELIVERIES, RELAY_DELIVERY_DURATION};
use registry::TenantRegistry;
use serde::{Deserialize, Serialize};
use shared::{counter, histogram};
use std::time::{Duration, Instant};

/// Source tag stamped on every delivered event.
pub const DEFAULT_SOURCE: &str = "backend-icustomer";

fn default_timeout_secs() -> u64 {
    10
}

fn default_source() -> String {
    DEFAULT_SOURCE.into()
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct ForwarderConfig {
    /// Bound on the whole outbound request/response cycle. An exceeded
    /// timeout is a failed delivery; there is no retry.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        ForwarderConfig {
            timeout_secs: default_timeout_secs(),
            source: DEFAULT_SOURCE.into(),
        }
    }
}

/// Wire body of one delivery: the envelope fields plus the source tag and
/// a send timestamp computed at delivery time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryBody<'a> {
    #[serde(flatten)]
    envelope: &'a EventEnvelope,
    source: &'a str,
    sent_at: String,
}

/// Relays normalized envelopes to the destination host registered for a
/// tenant.
///
/// Each `deliver` call is a single attempt: resolve the tenant, POST the
/// envelope to `{host}/api/s/{event_type}`, classify the outcome. There is
/// no retry and no partial state; the call either fully succeeds or fully
/// fails.
pub struct Forwarder {
    registry: TenantRegistry,
    client: reqwest::Client,
    timeout: Duration,
    source: String,
}

impl Forwarder {
    pub fn new(registry: TenantRegistry, config: ForwarderConfig) -> Self {
        Forwarder {
            registry,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            source: config.source,
        }
    }

    pub async fn deliver(
        &self,
        tenant_id: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), RelayError> {
        let event_type = envelope.event_type.as_str();

        // Unknown tenant fails before any outbound call is made.
        let record = self.registry.resolve(tenant_id).inspect_err(|err| {
            counter!(RELAY_DELIVERIES, "event_type" => event_type, "outcome" => "unknown_tenant")
                .increment(1);
            tracing::error!(tenant_id, event_type, %err, "tenant not found in registry");
        })?;

        let target = format!(
            "{}/api/s/{}",
            record.host.as_str().trim_end_matches('/'),
            event_type
        );
        let host = record
            .host
            .host_str()
            .unwrap_or(record.host.as_str())
            .to_string();

        let body = DeliveryBody {
            envelope,
            source: &self.source,
            sent_at: now_iso(),
        };

        let started = Instant::now();
        let result = self
            .client
            .post(&target)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;
        histogram!(RELAY_DELIVERY_DURATION).record(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                counter!(RELAY_DELIVERIES, "event_type" => event_type, "outcome" => "timeout")
                    .increment(1);
                tracing::error!(tenant_id, event_type, %host, "delivery timed out");
                return Err(RelayError::DeliveryTimeout { host });
            }
            Err(err) => {
                counter!(RELAY_DELIVERIES, "event_type" => event_type, "outcome" => "error")
                    .increment(1);
                tracing::error!(tenant_id, event_type, %host, %err, "delivery failed");
                return Err(RelayError::DeliveryFailed {
                    host,
                    reason: err.to_string(),
                });
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            counter!(RELAY_DELIVERIES, "event_type" => event_type, "outcome" => "rejected")
                .increment(1);
            tracing::error!(tenant_id, event_type, %host, %status, "destination rejected event");
            return Err(RelayError::DeliveryFailed {
                host,
                reason: format!("destination returned {status}"),
            });
        }

        counter!(RELAY_DELIVERIES, "event_type" => event_type, "outcome" => "delivered")
            .increment(1);
        tracing::debug!(tenant_id, event_type, %host, "event delivered");

        Ok(())
    }
}
