//! Network namespaces and the netlink sockets bound to them.
//!
//! A netlink socket belongs to the namespace of the thread that created it. Sockets for the
//! caller's own namespace are opened directly on the current runtime. For any other namespace we
//! spawn a dedicated OS thread, `setns(2)` it into the target namespace, open the socket on a
//! single-threaded runtime inside that thread and run the task there. The result is sent back to
//! the caller over a oneshot channel, so the caller never blocks a runtime worker.

use std::{
    fmt::{self, Display},
    fs::File,
    future::Future,
    os::fd::AsFd,
    path::{Path, PathBuf},
    pin::Pin,
};

use nix::sched::CloneFlags;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Directory where `ip netns add` registers named namespaces.
pub const NETNS_RUN_DIR: &str = "/run/netns";

/// Label of the namespace the process itself runs in.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Alias for a [`Future`] trait object that can be [`Send`].
///
/// It is lifetime-parameterized so it can borrow the [`NamespaceSocket`] it runs against.
pub type DynFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where a namespace handle is obtained from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceLocation {
    /// The namespace of the calling process.
    Current,
    /// A namespace file, e.g. `/run/netns/blue` or `/proc/4242/ns/net`.
    Path(PathBuf),
}

/// A network namespace, identified by the label used in exported samples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkNamespace {
    name: String,
    location: NamespaceLocation,
}

impl NetworkNamespace {
    /// The namespace of the calling process, labelled [`DEFAULT_NAMESPACE`].
    pub fn current() -> Self {
        Self { name: DEFAULT_NAMESPACE.to_string(), location: NamespaceLocation::Current }
    }

    /// Resolve a namespace from an operator-supplied label.
    ///
    /// - `"default"` is the calling process's namespace;
    /// - a label containing `/` is used as the namespace file path verbatim;
    /// - anything else is a namespace registered under [`NETNS_RUN_DIR`].
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();

        if name == DEFAULT_NAMESPACE {
            return Self::current();
        }

        let location = if name.contains('/') {
            NamespaceLocation::Path(PathBuf::from(&name))
        } else {
            NamespaceLocation::Path(Self::path(&name))
        };

        Self { name, location }
    }

    /// A namespace with an explicit label and namespace file.
    pub fn with_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), location: NamespaceLocation::Path(path.into()) }
    }

    /// The path of a namespace registered with `ip netns add <name>`.
    pub fn path(name: &str) -> PathBuf {
        Path::new(NETNS_RUN_DIR).join(name)
    }

    /// The label of this namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the namespace handle is obtained from.
    pub fn location(&self) -> &NamespaceLocation {
        &self.location
    }

    /// Runs `task` against a netlink socket bound to this namespace.
    ///
    /// The namespace file is opened on every call, so a namespace that was deleted and
    /// re-created is picked up on the next call. The socket is closed when `task` completes,
    /// whatever its outcome.
    pub async fn with_socket<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut NamespaceSocket) -> DynFuture<'a, Result<T>> + Send + 'static,
    {
        let path = match &self.location {
            NamespaceLocation::Current => {
                let mut socket = NamespaceSocket::open()?;
                return task(&mut socket).await;
            }
            NamespaceLocation::Path(path) => path,
        };

        let file = File::open(path).map_err(|source| Error::Namespace {
            name: self.name.clone(),
            path: path.clone(),
            source,
        })?;

        let (tx, rx) = oneshot::channel();
        let name = self.name.clone();

        std::thread::Builder::new().name(format!("netns-{name}")).spawn(move || {
            let _span = tracing::debug_span!("namespace", namespace = %name).entered();

            let result = run_in_namespace(file, task);
            if tx.send(result).is_err() {
                tracing::debug!("namespace task finished after the caller went away");
            }
        })?;

        rx.await.map_err(|_| Error::Thread(self.name.clone()))?
    }
}

impl Display for NetworkNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Moves the current thread into the namespace referred to by `file` and runs `task` on a
/// single-threaded runtime. Must only be called on a dedicated thread.
fn run_in_namespace<T, F>(file: File, task: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut NamespaceSocket) -> DynFuture<'a, Result<T>>,
{
    tracing::debug!(fd = ?file.as_fd(), "setting namespace for thread");
    nix::sched::setns(file.as_fd(), CloneFlags::CLONE_NEWNET)?;

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async move {
        let mut socket = NamespaceSocket::open()?;
        // The socket stays bound to the namespace, the namespace file is no longer needed.
        drop(file);

        task(&mut socket).await
    })
}

/// A netlink route socket bound to a network namespace.
///
/// The socket is owned by a background connection task on the runtime that opened it. Dropping
/// the `NamespaceSocket` aborts that task, which closes the socket.
#[derive(Debug)]
pub struct NamespaceSocket {
    /// Handle for sending rtnetlink messages on this socket.
    handle: rtnetlink::Handle,
    /// Background task processing rtnetlink responses.
    connection: tokio::task::JoinHandle<()>,
}

impl NamespaceSocket {
    /// Opens a socket in the namespace of the calling thread. Must be called within a Tokio
    /// runtime.
    pub fn open() -> Result<Self> {
        let (connection, handle, _) = rtnetlink::new_connection()?;
        let connection = tokio::spawn(connection);

        Ok(Self { handle, connection })
    }

    /// The rtnetlink handle of this socket.
    pub fn handle(&self) -> &rtnetlink::Handle {
        &self.handle
    }

    /// The rtnetlink handle of this socket, for raw requests.
    pub fn handle_mut(&mut self) -> &mut rtnetlink::Handle {
        &mut self.handle
    }
}

impl Drop for NamespaceSocket {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_label_is_current_namespace() {
        let ns = NetworkNamespace::from_name("default");
        assert_eq!(ns, NetworkNamespace::current());
        assert_eq!(ns.location(), &NamespaceLocation::Current);
        assert_eq!(ns.to_string(), "default");
    }

    #[test]
    fn registered_names_resolve_under_run_netns() {
        let ns = NetworkNamespace::from_name("blue");
        assert_eq!(ns.name(), "blue");
        assert_eq!(ns.location(), &NamespaceLocation::Path(PathBuf::from("/run/netns/blue")));
    }

    #[test]
    fn labels_with_slashes_are_paths() {
        let ns = NetworkNamespace::from_name("/proc/4242/ns/net");
        assert_eq!(ns.name(), "/proc/4242/ns/net");
        assert_eq!(ns.location(), &NamespaceLocation::Path(PathBuf::from("/proc/4242/ns/net")));

        let ns = NetworkNamespace::with_path("pod", "/var/run/netns/cni-1234");
        assert_eq!(ns.name(), "pod");
        assert_eq!(
            ns.location(),
            &NamespaceLocation::Path(PathBuf::from("/var/run/netns/cni-1234"))
        );
    }

    #[tokio::test]
    async fn missing_namespace_is_reported_not_fatal() {
        let ns = NetworkNamespace::from_name("tcx-test-does-not-exist");

        let err = ns
            .with_socket(|_socket| Box::pin(async { Ok::<_, Error>(()) }))
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Namespace { ref name, .. } if name == "tcx-test-does-not-exist")
        );
        assert!(err.is_namespace_error());
    }

    /// Requires `CAP_SYS_ADMIN`.
    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires root"]
    async fn own_namespace_by_path_works() {
        let _ = tracing_subscriber::fmt::try_init();
        let ns = NetworkNamespace::with_path("self", "/proc/self/ns/net");

        let name = ns
            .with_socket(|_socket| {
                Box::pin(async { Ok::<_, Error>(std::thread::current().name().map(String::from)) })
            })
            .await
            .unwrap();

        assert_eq!(name.as_deref(), Some("netns-self"));
    }
}
