//! Health events pushed by the node to the health-check server

use serde::Serialize;

/// Health-check server enablement
pub const HEALTHCHECK_ENABLE: &str = "healthcheckEnable";
/// Whether `/metrics` is served
pub const HEALTHCHECK_METRICS: &str = "healthcheckMetrics";
/// Primary (forwarding target) liveness check disabled
pub const DISABLE_PRIMARY_CHECK: &str = "disablePrimaryCheck";
/// L1 node liveness check disabled
pub const DISABLE_L1_NODE_CHECK: &str = "disableL1NodeCheck";
/// Health-check listen address (`addr:port`)
pub const HEALTHCHECK_RPC: &str = "healthcheckRPC";
/// Primary liveness target (forwarder only)
pub const PRIMARY_HEALTHCHECK_RPC: &str = "primaryHealthcheckRPC";
/// L1 liveness target
pub const L1_NODE_HEALTHCHECK_RPC: &str = "l1NodeHealthcheckRPC";

/// A configuration value carried by a health event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HealthValue {
    Bool(bool),
    Str(String),
}

impl HealthValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HealthValue::Bool(b) => Some(*b),
            HealthValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HealthValue::Bool(_) => None,
            HealthValue::Str(s) => Some(s),
        }
    }
}

/// Event consumed by the health-check server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Configuration snapshot entry
    Config { var: String, value: HealthValue },
    /// Runtime status reported by a component
    Status {
        component: String,
        healthy: bool,
        detail: Option<String>,
    },
    /// All configuration entries have been sent
    Init,
}

impl HealthEvent {
    pub fn config_bool(var: &str, value: bool) -> Self {
        HealthEvent::Config {
            var: var.to_string(),
            value: HealthValue::Bool(value),
        }
    }

    pub fn config_str(var: &str, value: impl Into<String>) -> Self {
        HealthEvent::Config {
            var: var.to_string(),
            value: HealthValue::Str(value.into()),
        }
    }

    pub fn status(component: &str, healthy: bool, detail: Option<String>) -> Self {
        HealthEvent::Status {
            component: component.to_string(),
            healthy,
            detail,
        }
    }
}
