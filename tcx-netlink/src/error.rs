use std::{io, path::PathBuf};

/// Errors that can occur while talking to the kernel in a network namespace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open network namespace {name} at {}: {source}", path.display())]
    Namespace {
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("rtnetlink error: {0}")]
    RtNetlink(#[from] rtnetlink::Error),

    #[error("namespace thread for {0} exited without a result")]
    Thread(String),
}

impl Error {
    /// Whether the error comes from resolving the namespace or binding a socket in it, as opposed
    /// to the kernel failing a request on a healthy socket.
    ///
    /// Callers use this to decide whether the namespace's device list must be refreshed.
    pub fn is_namespace_error(&self) -> bool {
        matches!(self, Self::Namespace { .. } | Self::Nix(_) | Self::Io(_) | Self::Thread(_))
    }
}

/// Result type for namespace and fetch operations.
pub type Result<T> = std::result::Result<T, Error>;
