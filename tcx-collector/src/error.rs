use std::{string::FromUtf8Error, time::Duration};

/// Errors of a single scrape unit. They are logged and never abort a scrape.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] tcx_netlink::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl UnitError {
    /// Whether the namespace's device list should be refreshed before the next scrape.
    pub fn is_namespace_error(&self) -> bool {
        matches!(self, Self::Fetch(err) if err.is_namespace_error())
    }
}

/// Errors while rendering samples in the Prometheus text format.
#[derive(Debug, thiserror::Error)]
pub enum ExpositionError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// A sub-collector name that is not known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collector {0:?}, expected one of: qdisc, class, filter, service_curve")]
pub struct UnknownCollector(pub String);
