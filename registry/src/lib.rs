pub mod config;
pub mod metrics_defs;
pub mod registry;
pub mod store;
pub mod types;

pub use registry::{Command, RegistryError, TenantRegistry};
pub use store::{InMemoryTenantStore, PostgresTenantStore, StoreError, TenantRow, TenantStore};
pub use types::{TenantId, TenantRecord};
