//! Alias service: the single owner of the store, the dispatcher and the
//! subscriber list. Created once by the app host and shared as `Arc`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::StoreError;
use crate::model::{AliasBinding, AliasEvent, LaunchOutcome, NewAlias};
use crate::store::AliasStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Minimum gap between two accepted dispatches of the same alias.
    pub cooldown: Duration,
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldown: config.dispatch.cooldown(),
        }
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct AliasService {
    store: Mutex<AliasStore>,
    dispatcher: Dispatcher,
    subscribers: Mutex<Vec<Sender<AliasEvent>>>,
    last_dispatch: Mutex<HashMap<i64, Instant>>,
    options: RwLock<ServiceOptions>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding one of these locks leaves the data itself intact.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AliasService {
    pub fn new(store: AliasStore, dispatcher: Dispatcher, options: ServiceOptions) -> Self {
        Self {
            store: Mutex::new(store),
            dispatcher,
            subscribers: Mutex::new(Vec::new()),
            last_dispatch: Mutex::new(HashMap::new()),
            options: RwLock::new(options),
        }
    }

    pub fn set_options(&self, options: ServiceOptions) {
        log::debug!("Service options updated: {:?}", options);
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    pub fn options(&self) -> ServiceOptions {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_aliases(&self) -> Result<Vec<AliasBinding>, StoreError> {
        lock(&self.store).list()
    }

    pub fn add_alias(&self, alias: NewAlias) -> Result<AliasBinding, StoreError> {
        let (added, all) = {
            let store = lock(&self.store);
            let added = store.add(alias)?;
            (added, store.list()?)
        };
        self.broadcast(AliasEvent::AliasesChanged(all));
        Ok(added)
    }

    pub fn update_alias(&self, alias: &AliasBinding) -> Result<AliasBinding, StoreError> {
        let (updated, all) = {
            let store = lock(&self.store);
            let updated = store.update(alias)?;
            (updated, store.list()?)
        };
        self.broadcast(AliasEvent::AliasesChanged(all));
        Ok(updated)
    }

    /// Returns whether anything was removed. Subscribers only hear about
    /// removals that changed the set.
    pub fn remove_alias(&self, id: i64) -> Result<bool, StoreError> {
        let (removed, all) = {
            let store = lock(&self.store);
            let removed = store.remove(id)?;
            (removed, if removed { Some(store.list()?) } else { None })
        };
        if let Some(all) = all {
            lock(&self.last_dispatch).remove(&id);
            self.broadcast(AliasEvent::AliasesChanged(all));
        }
        Ok(removed)
    }

    pub fn check_alias_prefix(&self, name: &str) -> Result<Option<String>, StoreError> {
        lock(&self.store).check_prefix(name)
    }

    pub fn dispatch(&self, id: i64) -> Result<LaunchOutcome, StoreError> {
        let binding = lock(&self.store).get(id)?.ok_or(StoreError::NotFound(id))?;
        Ok(self.dispatch_binding(&binding))
    }

    pub fn dispatch_key(&self, key: &str) -> Result<LaunchOutcome, StoreError> {
        let binding = lock(&self.store)
            .find_by_key(key)?
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        Ok(self.dispatch_binding(&binding))
    }

    /// Events for every alias-set change and failed dispatch from now on.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<AliasEvent> {
        let (tx, rx) = unbounded();
        let mut subscribers = lock(&self.subscribers);
        subscribers.push(tx);
        log::debug!("New subscriber ({} total)", subscribers.len());
        rx
    }

    // Store lock is already released here; OS calls may take seconds.
    fn dispatch_binding(&self, binding: &AliasBinding) -> LaunchOutcome {
        if !self.accept(binding.id) {
            log::info!(
                "Dispatch {} ({}) ignored: inside cooldown",
                binding.id,
                binding.key
            );
            return LaunchOutcome::debounced();
        }

        let outcome = self.dispatcher.dispatch(binding);
        if let Some(detail) = outcome.error_detail.clone().filter(|_| outcome.is_failure()) {
            self.broadcast(AliasEvent::DispatchFailed {
                id: binding.id,
                key: binding.key.clone(),
                detail,
            });
        }
        outcome
    }

    /// Records the dispatch and returns true unless one of `id` was accepted
    /// within the cooldown.
    fn accept(&self, id: i64) -> bool {
        let cooldown = self.options().cooldown;
        if cooldown.is_zero() {
            return true;
        }
        let now = Instant::now();
        let mut last = lock(&self.last_dispatch);
        match last.get(&id) {
            Some(at) if now.duration_since(*at) < cooldown => false,
            _ => {
                last.insert(id, now);
                true
            }
        }
    }

    fn broadcast(&self, event: AliasEvent) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        log::trace!("Broadcast to {} subscriber(s)", subscribers.len());
    }
}
