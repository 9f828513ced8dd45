use crate::domain::{CredentialPair, CredentialStore};
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Process-wide session state, passed explicitly to whoever issues requests.
///
/// Clones share the same credential slot. The pair is only ever swapped as a
/// whole, so readers see either the old or the new pair.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    pair: ArcSwapOption<CredentialPair>,
    store: Arc<dyn CredentialStore>,
    // keeps a conditional swap and its store write ordered against clear
    store_lock: Mutex<()>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                pair: ArcSwapOption::empty(),
                store,
                store_lock: Mutex::new(()),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Builds a session and loads whatever pair the store holds.
    pub fn restore(store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let session = Self::new(store);
        if let Some(pair) = session.inner.store.load()? {
            debug!("Restored credential pair from store");
            session.inner.pair.store(Some(Arc::new(pair)));
        }
        Ok(session)
    }

    pub fn current(&self) -> Option<Arc<CredentialPair>> {
        self.inner.pair.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.pair.load().is_some()
    }

    /// Makes `pair` the current pair and persists it.
    ///
    /// The in-memory swap happens even when persisting fails; the error only
    /// means the pair will not survive a restart.
    pub fn replace(&self, pair: CredentialPair) -> anyhow::Result<()> {
        let _store_guard = self.lock_store();
        let pair = Arc::new(pair);
        self.inner.pair.store(Some(pair.clone()));
        self.inner.store.save(&pair)
    }

    /// Swaps in `pair` only while the session still holds `expected`.
    ///
    /// Returns `Ok(false)` without touching memory or the store when the
    /// session was cleared or replaced in the meantime.
    pub fn replace_if_current(
        &self,
        expected: &Arc<CredentialPair>,
        pair: CredentialPair,
    ) -> anyhow::Result<bool> {
        let _store_guard = self.lock_store();
        let pair = Arc::new(pair);
        let previous = self.inner.pair.compare_and_swap(expected, Some(pair.clone()));
        let swapped = matches!(&*previous, Some(held) if Arc::ptr_eq(held, expected));
        if !swapped {
            return Ok(false);
        }
        self.inner.store.save(&pair)?;
        Ok(true)
    }

    /// Drops the pair from memory and from the store.
    pub fn clear(&self) {
        let _store_guard = self.lock_store();
        self.inner.pair.store(None);
        if let Err(e) = self.inner.store.clear() {
            warn!("Failed to clear stored credentials: {}", e);
        }
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, ()> {
        self.inner.store_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serialises refreshes so concurrent requests share one refresh call.
    pub(crate) async fn lock_refresh(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.refresh_lock.lock().await
    }
}
