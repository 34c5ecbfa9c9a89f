//! Client for the topology-processor service.
//!
//! Targets created here are bound to a probe, looked up by type and category
//! in the processor's probe registry. Probes register asynchronously after
//! they start, so the lookup is retried with a fixed delay.

use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{Config, ProbeRetry};
use crate::error::{check_status, TurboError};
use crate::http::{self, HttpResponse};
use crate::rest::RestClient;
use crate::types::{
    InputField, ProbeId, ProbeRegistry, ResourceType, Target, TpInputField, TpTargetSpec,
    COMMUNICATION_BINDING_CHANNEL,
};

#[derive(Debug, Clone)]
pub struct TpClient {
    rest: RestClient,
    retry: ProbeRetry,
}

impl TpClient {
    /// The topology processor is reached without credentials.
    pub fn new(config: &Config) -> Self {
        let agent = http::new_agent(config.server_address(), config.request_timeout());
        let rest = RestClient::new(
            agent,
            config.server_address().clone(),
            config.topology_processor_path(),
        );
        Self {
            rest,
            retry: config.probe_retry(),
        }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn discover_target(&self, id: &str) -> Result<HttpResponse, TurboError> {
        let response = self
            .rest
            .post()
            .resource(ResourceType::Target)
            .name(id)
            .execute()?;
        let response = check_status(response, "target discovery")?;
        info!(id, "target discovery triggered");
        Ok(response)
    }

    /// Create `target` against the probe registered for its type and category.
    pub fn add_target(&self, target: &Target) -> Result<HttpResponse, TurboError> {
        let probe_id = self.probe_id(&target.target_type, &target.category)?;
        let (fields, channel) = extract_communication_binding_channel(&target.input_fields);
        let spec = TpTargetSpec {
            probe_id,
            input_fields: fields.iter().map(TpInputField::from).collect(),
            communication_binding_channel: channel,
        };
        let body = serde_json::to_vec(&spec).map_err(TurboError::SerializationError)?;
        debug!(probe = %spec.probe_id, "adding target to topology processor");

        let response = self
            .rest
            .post()
            .resource(ResourceType::Target)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .data(body)
            .execute()?;
        check_status(response, "target addition")
    }

    /// Resolve a probe ID using the configured retry budget.
    pub fn probe_id(&self, probe_type: &str, category: &str) -> Result<ProbeId, TurboError> {
        self.probe_id_with_retry(probe_type, category, self.retry)
    }

    /// Resolve a probe ID, looking it up at most `retry.attempts` times.
    ///
    /// Once the budget is spent the last lookup's error is returned as is.
    pub fn probe_id_with_retry(
        &self,
        probe_type: &str,
        category: &str,
        retry: ProbeRetry,
    ) -> Result<ProbeId, TurboError> {
        let attempts = retry.attempts.max(1);
        let started = Instant::now();
        let mut attempt = 1;
        loop {
            let err = match self.lookup_probe_id(probe_type, category) {
                Ok(id) => {
                    debug!(probe_type, category, %id, attempt, "probe resolved");
                    return Ok(id);
                }
                Err(err) => err,
            };
            if attempt >= attempts {
                warn!(probe_type, category, attempts, error = %err, "giving up on probe lookup");
                return Err(err);
            }
            if let Some(deadline) = retry.deadline {
                let next_lookup = started.elapsed().checked_add(retry.delay);
                if next_lookup.map_or(true, |at| at > deadline) {
                    warn!(probe_type, category, attempt, ?deadline, error = %err, "probe lookup deadline reached");
                    return Err(err);
                }
            }
            debug!(probe_type, category, attempt, attempts, error = %err, "probe not available yet");
            thread::sleep(retry.delay);
            attempt += 1;
        }
    }

    fn lookup_probe_id(&self, probe_type: &str, category: &str) -> Result<ProbeId, TurboError> {
        let response = self
            .rest
            .get()
            .resource(ResourceType::Probe)
            .header("Accept", "application/json")
            .execute()?;
        let response = check_status(response, "probe listing")?;
        let registry: ProbeRegistry =
            serde_json::from_slice(&response.body).map_err(TurboError::DeserializationError)?;
        registry
            .probes
            .into_iter()
            .find(|p| p.probe_type == probe_type && p.category == category)
            .map(|p| p.id)
            .ok_or_else(|| TurboError::ProbeNotFound {
                probe_type: probe_type.to_string(),
                category: category.to_string(),
            })
    }
}

/// Split off the communication binding channel field.
///
/// Returns the other fields in their original order and the channel value,
/// or `""` when no field carries it. Only the first such field is taken.
pub fn extract_communication_binding_channel(fields: &[InputField]) -> (Vec<InputField>, String) {
    match fields.iter().position(|f| f.name == COMMUNICATION_BINDING_CHANNEL) {
        Some(index) => {
            let mut remaining = fields.to_vec();
            let channel = remaining.remove(index);
            (remaining, channel.value)
        }
        None => (fields.to_vec(), String::new()),
    }
}
