use registry::RegistryError;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors that can occur while forwarding an event.
///
/// All variants surface to HTTP clients as an opaque `Service unavailable`;
/// the variants exist so logs and metrics can tell an unregistered tenant
/// apart from an unreachable destination.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("tenant '{0}' is not registered")]
    UnknownTenant(String),

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("delivery to {host} failed: {reason}")]
    DeliveryFailed { host: String, reason: String },

    #[error("delivery to {host} timed out")]
    DeliveryTimeout { host: String },
}

impl RelayError {
    /// Stable tag for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::UnknownTenant(_) => "unknown_tenant",
            RelayError::Registry(_) => "registry",
            RelayError::DeliveryFailed { .. } => "delivery_failed",
            RelayError::DeliveryTimeout { .. } => "delivery_timeout",
        }
    }
}

impl From<RegistryError> for RelayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownTenant(tenant_id) => RelayError::UnknownTenant(tenant_id),
            other => RelayError::Registry(other),
        }
    }
}
