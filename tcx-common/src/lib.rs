#![doc(issue_tracker_base_url = "https://github.com/chainbound/tcx/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod handle;
pub mod task;

pub use handle::Handle;
pub use task::JoinMap;

/// Returns the hostname of the machine, used as the `host` label of every sample.
///
/// Falls back to `"unknown"` if the hostname cannot be read or is not valid UTF-8.
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Formats a hardware address as colon-separated lowercase hex, e.g. `de:ad:be:ef:00:01`.
pub fn format_hwaddr(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}
