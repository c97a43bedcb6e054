//! Live in-memory mirror of a store query.
//!
//! A [`LiveMirror`] owns at most one listener at a time. Attaching a new
//! listener tears the old one down before the new one is installed, and a
//! generation counter makes sure a torn-down task can never write into the
//! mirror again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{Listener, QuerySnapshot};

/// Callback run after each applied snapshot.
pub type SnapshotHook<T> = Box<dyn Fn(&[T]) + Send + Sync>;

struct MirrorState<T> {
    generation: u64,
    items: Vec<T>,
    loaded: bool,
}

struct Shared<T> {
    state: Mutex<MirrorState<T>>,
    changed: watch::Sender<u64>,
}

impl<T> Shared<T> {
    fn state(&self) -> MutexGuard<'_, MirrorState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render-ready copy of the documents matched by one live query.
pub struct LiveMirror<T> {
    name: &'static str,
    shared: Arc<Shared<T>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for LiveMirror<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("LiveMirror")
            .field("name", &self.name)
            .field("generation", &state.generation)
            .field("items", &state.items.len())
            .field("loaded", &state.loaded)
            .finish()
    }
}

impl<T> LiveMirror<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create an empty mirror with no listener. `name` is used in logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            name,
            shared: Arc::new(Shared {
                state: Mutex::new(MirrorState {
                    generation: 0,
                    items: Vec::new(),
                    loaded: false,
                }),
                changed,
            }),
            task: Mutex::new(None),
        }
    }

    /// Replace the active listener.
    ///
    /// The previous listener task is aborted and the mirror cleared before
    /// the new task starts. Must be called from within a Tokio runtime.
    pub fn attach(&self, listener: Listener, hook: Option<SnapshotHook<T>>) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let generation = self.reset();
        debug!(mirror = self.name, generation, "Attaching listener");

        let shared = Arc::clone(&self.shared);
        let name = self.name;
        *task = Some(tokio::spawn(run_listener(
            name, shared, generation, listener, hook,
        )));
    }

    /// Tear down the active listener and clear the mirror.
    pub fn detach(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.reset();
    }

    fn reset(&self) -> u64 {
        let generation = {
            let mut state = self.shared.state();
            state.generation += 1;
            state.items.clear();
            state.loaded = false;
            state.generation
        };
        self.shared.changed.send_modify(|version| *version += 1);
        generation
    }

    /// Current items in query order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.shared.state().items.clone()
    }

    /// Number of mirrored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state().items.len()
    }

    /// Whether the mirror holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the current listener has delivered its first snapshot.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.shared.state().loaded
    }

    /// Receiver that ticks on every applied snapshot or reset.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.changed.subscribe()
    }

    /// Wait until the current listener has delivered a snapshot.
    pub async fn loaded(&self) {
        let mut rx = self.changes();
        while !self.is_loaded() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl<T> Drop for LiveMirror<T> {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

async fn run_listener<T>(
    name: &'static str,
    shared: Arc<Shared<T>>,
    generation: u64,
    mut listener: Listener,
    hook: Option<SnapshotHook<T>>,
) where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    while let Some(snapshot) = listener.next().await {
        let items = decode_all::<T>(name, &snapshot);
        {
            let mut state = shared.state();
            if state.generation != generation {
                debug!(mirror = name, generation, "Dropping stale snapshot");
                return;
            }
            state.items.clone_from(&items);
            state.loaded = true;
        }
        shared.changed.send_modify(|version| *version += 1);

        if let Some(hook) = &hook {
            hook(&items);
        }
    }
    debug!(mirror = name, generation, "Listener closed by store");
}

/// Decode every document, skipping (and logging) malformed ones so one bad
/// document cannot blank the whole list.
fn decode_all<T: DeserializeOwned>(name: &'static str, snapshot: &QuerySnapshot) -> Vec<T> {
    snapshot
        .docs
        .iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(mirror = name, document = %doc.id, error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}
