use url::Url;

pub type TenantId = String;

/// One registered tenant and the ingestion host its events are relayed to.
/// Records are immutable once published in a snapshot; a refresh replaces
/// the whole snapshot rather than mutating individual records.
#[derive(Clone, Debug, PartialEq)]
pub struct TenantRecord {
    pub tenant_id: TenantId,
    pub host: Url,
}

impl TenantRecord {
    pub fn new<I>(tenant_id: I, host: Url) -> Self
    where
        I: Into<TenantId>,
    {
        TenantRecord {
            tenant_id: tenant_id.into(),
            host,
        }
    }
}
