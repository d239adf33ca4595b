// SPDX-License-Identifier: Apache-2.0

use capvisor_model::{best_match, KnowledgeItem};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DISTILL_QUIET_PERIOD: Duration = Duration::from_secs(1);

/// Catalog entry the script points at, unless the card already holds it.
#[must_use]
pub fn distill(script: &str, current_l2: &str) -> Option<&'static KnowledgeItem> {
    best_match(script).filter(|item| item.l2 != current_l2)
}

/// Finished distillation delivered to the owner of the card stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistilledLink {
    pub card_id: String,
    pub item: &'static KnowledgeItem,
}

struct PendingDistill {
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingDistill>>>;

fn lock(pending: &Mutex<HashMap<String, PendingDistill>>) -> MutexGuard<'_, HashMap<String, PendingDistill>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trailing-edge debounce of script edits, one timer per card id.
///
/// Each edit replaces the card's pending timer; only a timer that survives the quiet period
/// runs [`distill`] and, on a match, sends a [`DistilledLink`]. Must be used inside a tokio
/// runtime. Dropping the scheduler aborts every pending timer.
pub struct DistillScheduler {
    quiet: Duration,
    pending: PendingMap,
    generation: AtomicU64,
    links: mpsc::UnboundedSender<DistilledLink>,
}

impl DistillScheduler {
    #[must_use]
    pub fn new(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<DistilledLink>) {
        let (links, rx) = mpsc::unbounded_channel();
        (
            Self {
                quiet,
                pending: Arc::new(Mutex::new(HashMap::new())),
                generation: AtomicU64::new(0),
                links,
            },
            rx,
        )
    }

    pub fn on_edit(&self, card_id: &str, script: &str, current_l2: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let quiet = self.quiet;
        let pending = Arc::clone(&self.pending);
        let links = self.links.clone();
        let id = card_id.to_string();
        let script = script.to_string();
        let current_l2 = current_l2.to_string();

        let mut map = lock(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let current = {
                let mut map = lock(&pending);
                let current = map.get(&id).is_some_and(|p| p.generation == generation);
                if current {
                    map.remove(&id);
                }
                current
            };
            if !current {
                return;
            }
            if let Some(item) = distill(&script, &current_l2) {
                debug!(card_id = %id, l2 = item.l2, "script distilled");
                let _ = links.send(DistilledLink { card_id: id, item });
            }
        });
        if let Some(previous) = map.insert(card_id.to_string(), PendingDistill { generation, handle }) {
            previous.handle.abort();
        }
    }

    pub fn cancel(&self, card_id: &str) -> bool {
        match lock(&self.pending).remove(card_id) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, p) in lock(&self.pending).drain() {
            p.handle.abort();
        }
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl Drop for DistillScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
