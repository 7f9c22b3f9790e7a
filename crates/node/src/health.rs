//! Startup health events
//!
//! Publishes the configuration snapshot the health-check server needs,
//! followed by the `Init` marker. Publishing never blocks; a full sink drops
//! the event.

use crate::config::NodeRole;
use crate::validate::ValidatedConfig;
use node_health::event::{
    DISABLE_L1_NODE_CHECK, DISABLE_PRIMARY_CHECK, HEALTHCHECK_ENABLE, HEALTHCHECK_METRICS,
    HEALTHCHECK_RPC, L1_NODE_HEALTHCHECK_RPC, PRIMARY_HEALTHCHECK_RPC,
};
use node_health::{HealthEvent, HealthSink};

/// Configuration events in publication order
pub fn config_events(config: &ValidatedConfig) -> Vec<HealthEvent> {
    let node = &config.config;
    let mut events = vec![
        HealthEvent::config_bool(HEALTHCHECK_ENABLE, node.healthcheck.enable),
        HealthEvent::config_bool(HEALTHCHECK_METRICS, node.healthcheck.metrics),
        HealthEvent::config_bool(DISABLE_PRIMARY_CHECK, !node.healthcheck.sequencer),
        HealthEvent::config_bool(DISABLE_L1_NODE_CHECK, !node.healthcheck.l1_node),
        HealthEvent::config_str(HEALTHCHECK_RPC, node.healthcheck_rpc()),
    ];
    if config.role == NodeRole::Forwarder {
        events.push(HealthEvent::config_str(
            PRIMARY_HEALTHCHECK_RPC,
            node.node.forwarder.target.clone(),
        ));
    }
    events.push(HealthEvent::config_str(L1_NODE_HEALTHCHECK_RPC, node.l1.url.clone()));
    events
}

/// Push the configuration snapshot and `Init`, returning how many were accepted
pub fn publish_health_config(sink: &HealthSink, config: &ValidatedConfig) -> usize {
    let accepted = config_events(config)
        .into_iter()
        .chain(std::iter::once(HealthEvent::Init))
        .map(|event| sink.publish(event))
        .filter(|accepted| *accepted)
        .count();
    tracing::debug!(accepted, "published health configuration");
    accepted
}
