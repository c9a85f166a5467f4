use std::{
    collections::HashMap,
    hash::Hash,
    task::{ready, Context, Poll},
};

use futures::{future::poll_fn, Future};
use tokio::task::{Id, JoinError, JoinSet};

/// A collection of keyed tasks spawned on a Tokio runtime.
///
/// Unlike a plain [`JoinSet`], the key of a task is returned together with its outcome even
/// when the task panicked or was aborted, so callers can always attribute a failure.
#[derive(Debug)]
pub struct JoinMap<K, V> {
    keys: HashMap<Id, K>,
    joinset: JoinSet<V>,
}

impl<K, V> Default for JoinMap<K, V> {
    fn default() -> Self {
        Self { keys: HashMap::new(), joinset: JoinSet::new() }
    }
}

impl<K, V> JoinMap<K, V> {
    /// Create a new, empty `JoinMap`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tasks currently in the map.
    pub fn len(&self) -> usize {
        self.joinset.len()
    }

    /// Returns whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.joinset.is_empty()
    }
}

impl<K, V> JoinMap<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// Spawns a task onto the Tokio runtime under the given key.
    pub fn spawn<F>(&mut self, key: K, future: F)
    where
        F: Future<Output = V> + Send + 'static,
    {
        let id = self.joinset.spawn(future).id();
        self.keys.insert(id, key);
    }

    /// Waits until one of the tasks in the map completes and returns its key and outcome.
    ///
    /// Returns `None` if the map is empty.
    ///
    /// # Cancel Safety
    ///
    /// This method is cancel safe, see [`JoinSet::join_next`].
    pub async fn join_next(&mut self) -> Option<(K, Result<V, JoinError>)> {
        poll_fn(|cx| self.poll_join_next(cx)).await
    }

    /// Polls for one of the tasks in the map to complete.
    ///
    /// Returns:
    ///
    ///  * `Poll::Pending` if the map is not empty but no task output is available right now.
    ///  * `Poll::Ready(Some((key, Ok(value))))` if a task completed.
    ///  * `Poll::Ready(Some((key, Err(err))))` if a task panicked or was aborted.
    ///  * `Poll::Ready(None)` if the map is empty.
    pub fn poll_join_next(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<(K, Result<V, JoinError>)>> {
        loop {
            let (id, outcome) = match ready!(self.joinset.poll_join_next_with_id(cx)) {
                Some(Ok((id, value))) => (id, Ok(value)),
                Some(Err(err)) => (err.id(), Err(err)),
                None => return Poll::Ready(None),
            };

            // Every spawned task has a key, but a missing one must not stall the join loop.
            if let Some(key) = self.keys.remove(&id) {
                return Poll::Ready(Some((key, outcome)));
            }
        }
    }

    /// Waits for every task and collects the outcomes.
    pub async fn join_all(mut self) -> Vec<(K, Result<V, JoinError>)> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(next) = self.join_next().await {
            out.push(next);
        }
        out
    }
}
