/* This file is part of the Vidcat project
*
*  Copyright (C) 2025 the Vidcat contributors
*
*  This program is free software: you can redistribute it and/or modify
*  it under the terms of the GNU Affero General Public License as published by
*  the Free Software Foundation, either version 3 of the License, or
*  (at your option) any later version.
*
*  This program is distributed in the hope that it will be useful,
*  but WITHOUT ANY WARRANTY; without even the implied warranty of
*  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
*  GNU Affero General Public License for more details.
*
*  You should have received a copy of the GNU Affero General Public License
*  along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Shared cache of server resources with stale-while-revalidate reads
//!
//! Every [`QueryKey`] maps to at most one entry, and every entry has at most one load in flight.
//! Concurrent readers of a key join that load through a [`Shared`] future. Loads that were
//! superseded (by an invalidation, a refetch or an eviction) never write their result into the
//! cache.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::HashMap,
    future::Future,
    rc::{Rc, Weak},
    time::Duration,
};

use cloneable_errors::anyhow;
use futures::{future::{LocalBoxFuture, Shared}, FutureExt};
use log::{debug, warn};

use crate::{
    errors::QueryError,
    platform::{millis, Runtime, Timeout},
    query_key::QueryKey,
    settings::ClientSettings,
    utils::RcEq,
};

type AnyRc = Rc<dyn Any>;
type LoadResult = Result<AnyRc, QueryError>;
type SharedLoad = Shared<LocalBoxFuture<'static, LoadResult>>;
type Loader = Rc<dyn Fn() -> LocalBoxFuture<'static, LoadResult>>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CacheSettings {
    /// How long loaded data is served without revalidation
    pub stale_time: Duration,
    /// How long an entry without subscribers is retained
    pub cache_time: Duration,
    /// Delay before the single retry of a transient failure
    pub retry_delay: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(300),
            cache_time: Duration::from_secs(300),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ClientSettings> for CacheSettings {
    fn from(value: &ClientSettings) -> Self {
        Self {
            stale_time: value.stale_time(),
            cache_time: value.cache_time(),
            retry_delay: value.retry_delay(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QueryStatus {
    /// Nothing was requested yet, or the last error was cleared
    Idle,
    /// The first load is in flight
    Loading,
    Success,
    Error,
}

/// Point-in-time view of a cache entry
#[derive(Debug)]
pub struct QuerySnapshot<T> {
    /// Last successfully loaded data
    pub data: Option<Rc<T>>,
    pub status: QueryStatus,
    pub error: Option<QueryError>,
    /// Milliseconds since the unix epoch
    pub updated_at: Option<i64>,
    /// A load is in flight, possibly in the background
    pub is_fetching: bool,
}

impl<T> Clone for QuerySnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            updated_at: self.updated_at,
            is_fetching: self.is_fetching,
        }
    }
}

impl<T> QuerySnapshot<T> {
    /// The data, unless the last load failed
    pub fn into_result(self) -> Result<Rc<T>, QueryError> {
        match (self.status, self.data, self.error) {
            (QueryStatus::Error, _, Some(err)) | (_, None, Some(err)) => Err(err),
            (_, Some(data), _) => Ok(data),
            (_, None, None) => Err(QueryError::Decode(anyhow!("No data was loaded"))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CacheStats {
    pub total: usize,
    pub pending: usize,
    pub cached: usize,
    pub failed: usize,
    pub subscribed: usize,
}

struct CacheEntry {
    data: Option<AnyRc>,
    status: QueryStatus,
    error: Option<QueryError>,
    updated_at: Option<i64>,
    invalidated: bool,
    pending: Option<SharedLoad>,
    /// Generation of the load allowed to settle this entry
    generation: u64,
    subscribers: Vec<(u64, Rc<dyn Fn()>)>,
    loader: Option<Loader>,
    gc_timer: Option<Timeout>,
}

impl CacheEntry {
    fn new() -> CacheEntry {
        CacheEntry {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            updated_at: None,
            invalidated: false,
            pending: None,
            generation: 0,
            subscribers: Vec::new(),
            loader: None,
            gc_timer: None,
        }
    }

    fn is_fresh(&self, now: i64, stale_time: Duration) -> bool {
        self.updated_at.is_some_and(|t| now - t < millis(stale_time))
    }

    fn snapshot<T: 'static>(&self, key: &QueryKey) -> QuerySnapshot<T> {
        let mut error = self.error.clone();
        let data = self.data.clone().and_then(|data| match data.downcast::<T>() {
            Ok(data) => Some(data),
            Err(..) => {
                error = Some(QueryError::Decode(anyhow!("Cached data for {key} has an unexpected type",)));
                None
            },
        });
        QuerySnapshot {
            data,
            status: self.status,
            error,
            updated_at: self.updated_at,
            is_fetching: self.pending.is_some(),
        }
    }
}

enum FetchStart<T> {
    Ready(QuerySnapshot<T>),
    Wait(SharedLoad),
}

/// Query cache owned by the current window
#[derive(Clone, PartialEq, Eq)]
pub struct QueryCache {
    inner: RcEq<InnerCache>,
}

struct InnerCache {
    entries: RefCell<HashMap<QueryKey, CacheEntry>>,
    settings: CacheSettings,
    runtime: Runtime,
    next_generation: Cell<u64>,
    next_subscriber: Cell<u64>,
}

fn erase<T, F, Fut>(loader: F) -> Loader
where
    T: 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<T, QueryError>> + 'static,
{
    Rc::new(move || loader().map(|result| result.map(|data| Rc::new(data) as AnyRc)).boxed_local())
}

impl QueryCache {
    pub fn new(settings: CacheSettings, runtime: Runtime) -> QueryCache {
        QueryCache {
            inner: RcEq::new(InnerCache {
                entries: RefCell::new(HashMap::new()),
                settings,
                runtime,
                next_generation: Cell::new(0),
                next_subscriber: Cell::new(0),
            }),
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.inner.settings
    }

    fn from_weak(weak: &Weak<InnerCache>) -> Option<QueryCache> {
        weak.upgrade().map(|inner| QueryCache { inner: RcEq(inner) })
    }

    /// Starts a new load for the entry, superseding any load already in flight
    ///
    /// Must not poll anything, as it's called with the entry map borrowed.
    fn start_load(&self, key: &QueryKey, entry: &mut CacheEntry, loader: Loader) -> SharedLoad {
        let generation = self.inner.next_generation.get() + 1;
        self.inner.next_generation.set(generation);
        entry.generation = generation;
        if entry.data.is_none() && entry.status != QueryStatus::Error {
            entry.status = QueryStatus::Loading;
        }
        debug!("Loading {key} (generation {generation})");

        let weak = Rc::downgrade(&self.inner.0);
        let runtime = self.inner.runtime.clone();
        let retry_delay = self.inner.settings.retry_delay;
        let key = key.clone();
        let load = async move {
            let result = match loader().await {
                Err(err) if err.is_retryable() => {
                    debug!("Load of {key} failed, retrying in {}ms: {err}", retry_delay.as_millis());
                    runtime.sleep(retry_delay).await;
                    loader().await
                },
                result => result,
            };
            // settled before any awaiter sees the result
            if let Some(cache) = QueryCache::from_weak(&weak) {
                cache.settle(&key, generation, &result);
            }
            result
        }.boxed_local().shared();

        entry.pending = Some(load.clone());
        self.inner.runtime.spawn(load.clone().map(|_| ()));
        load
    }

    fn settle(&self, key: &QueryKey, generation: u64, result: &LoadResult) {
        let now = self.inner.runtime.now_ms();
        let callbacks: Vec<Rc<dyn Fn()>> = {
            let mut entries = self.inner.entries.borrow_mut();
            let Some(entry) = entries.get_mut(key) else {
                debug!("Discarding the result of an evicted load for {key}");
                return;
            };
            if entry.generation != generation {
                debug!("Discarding the result of a superseded load for {key} (generation {generation})");
                return;
            }
            entry.pending = None;
            entry.invalidated = false;
            match result {
                Ok(data) => {
                    entry.data = Some(data.clone());
                    entry.status = QueryStatus::Success;
                    entry.error = None;
                    entry.updated_at = Some(now);
                },
                Err(err) => {
                    warn!("Failed to load {key}: {err}");
                    if err.is_not_found() {
                        entry.data = None;
                        entry.updated_at = None;
                    }
                    entry.status = QueryStatus::Error;
                    entry.error = Some(err.clone());
                },
            }
            if entry.subscribers.is_empty() && entry.gc_timer.is_none() {
                entry.gc_timer = Some(self.schedule_gc(key.clone()));
            }
            entry.subscribers.iter().map(|(_, callback)| callback.clone()).collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    fn schedule_gc(&self, key: QueryKey) -> Timeout {
        let weak = Rc::downgrade(&self.inner.0);
        self.inner.runtime.set_timeout(self.inner.settings.cache_time, move || {
            if let Some(cache) = QueryCache::from_weak(&weak) {
                cache.collect(&key);
            }
        })
    }

    /// Evicts an unreferenced entry once its retention window has passed
    fn collect(&self, key: &QueryKey) {
        let removed = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get_mut(key) {
                Some(entry) if entry.subscribers.is_empty() && entry.pending.is_none() => entries.remove(key),
                Some(entry) => {
                    // rescheduled when the load settles or the last subscriber leaves
                    entry.gc_timer = None;
                    None
                },
                None => None,
            }
        };
        if removed.is_some() {
            debug!("Evicted {key}");
        }
    }

    fn begin_fetch<T: 'static>(&self, key: &QueryKey, loader: Loader) -> FetchStart<T> {
        let now = self.inner.runtime.now_ms();
        let stale_time = self.inner.settings.stale_time;
        let mut entries = self.inner.entries.borrow_mut();
        let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
        entry.loader = Some(loader.clone());
        if let Some(ref pending) = entry.pending {
            return if entry.status == QueryStatus::Success && !entry.invalidated {
                FetchStart::Ready(entry.snapshot(key))
            } else {
                FetchStart::Wait(pending.clone())
            };
        }
        match entry.status {
            QueryStatus::Success if !entry.invalidated => {
                if !entry.is_fresh(now, stale_time) {
                    let _ = self.start_load(key, entry, loader);
                }
                FetchStart::Ready(entry.snapshot(key))
            },
            QueryStatus::Error if !entry.invalidated => FetchStart::Ready(entry.snapshot(key)),
            _ => FetchStart::Wait(self.start_load(key, entry, loader)),
        }
    }

    fn pending_load(&self, key: &QueryKey) -> Option<SharedLoad> {
        self.inner.entries.borrow().get(key).and_then(|entry| entry.pending.clone())
    }

    /// Reads a key, loading it if needed
    ///
    /// Fresh data is returned without calling the loader. Stale data is returned right away while
    /// a background revalidation runs. Otherwise the returned future joins the single in-flight load
    /// for the key. Entries in the error state are returned as they are until refetched.
    pub fn fetch<T, F, Fut>(&self, key: QueryKey, loader: F) -> impl Future<Output = QuerySnapshot<T>> + 'static
    where
        T: 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, QueryError>> + 'static,
    {
        let start = self.begin_fetch::<T>(&key, erase(loader));
        let cache = self.clone();
        async move {
            let mut pending = match start {
                FetchStart::Ready(snapshot) => return snapshot,
                FetchStart::Wait(pending) => pending,
            };
            loop {
                let result = pending.await;
                // a newer load superseded the one we were waiting for
                if let Some(newer) = cache.pending_load(&key) {
                    pending = newer;
                    continue;
                }
                return match cache.peek(&key) {
                    Some(snapshot) => snapshot,
                    None => snapshot_of_evicted(&key, result),
                };
            }
        }
    }

    /// Synchronous read for rendering, starting a background load when the data is missing or stale
    pub fn query<T, F, Fut>(&self, key: QueryKey, loader: F) -> QuerySnapshot<T>
    where
        T: 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, QueryError>> + 'static,
    {
        let loader = erase(loader);
        let now = self.inner.runtime.now_ms();
        let stale_time = self.inner.settings.stale_time;
        let mut entries = self.inner.entries.borrow_mut();
        let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
        entry.loader = Some(loader.clone());
        let needs_load = entry.pending.is_none() && match entry.status {
            QueryStatus::Idle | QueryStatus::Loading => true,
            QueryStatus::Success => entry.invalidated || !entry.is_fresh(now, stale_time),
            QueryStatus::Error => entry.invalidated,
        };
        if needs_load {
            let _ = self.start_load(&key, entry, loader);
        }
        entry.snapshot(&key)
    }

    /// Reads a key without ever loading it
    pub fn peek<T: 'static>(&self, key: &QueryKey) -> Option<QuerySnapshot<T>> {
        self.inner.entries.borrow().get(key).map(|entry| entry.snapshot(key))
    }

    /// Marks every matching entry as stale
    ///
    /// Entries that have subscribers are refetched once in the background, the rest are evicted.
    /// Returns the number of matching entries.
    pub fn invalidate(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let mut count = 0;
        let mut evicted = Vec::new();
        {
            let mut entries = self.inner.entries.borrow_mut();
            let keys: Vec<QueryKey> = entries.keys().filter(|k| predicate(k)).cloned().collect();
            for key in keys {
                count += 1;
                let Some(entry) = entries.get_mut(&key) else { continue };
                if entry.subscribers.is_empty() {
                    evicted.extend(entries.remove(&key));
                    continue;
                }
                entry.invalidated = true;
                if let Some(loader) = entry.loader.clone() {
                    let _ = self.start_load(&key, entry, loader);
                }
            }
        }
        if count > 0 {
            debug!("Invalidated {count} entries, evicted {}", evicted.len());
        }
        count
    }

    /// Registers a callback fired every time a load for this key settles
    ///
    /// The entry is kept alive while the returned [`Subscription`] exists.
    pub fn subscribe(&self, key: QueryKey, callback: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_subscriber.get();
        self.inner.next_subscriber.set(id + 1);
        let cancelled_timer = {
            let mut entries = self.inner.entries.borrow_mut();
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
            entry.subscribers.push((id, Rc::new(callback)));
            entry.gc_timer.take()
        };
        drop(cancelled_timer);
        Subscription {
            cache: Rc::downgrade(&self.inner.0),
            key,
            id,
            active: true,
        }
    }

    fn unsubscribe(&self, key: &QueryKey, id: u64) {
        let Ok(mut entries) = self.inner.entries.try_borrow_mut() else {
            debug!("Cache busy, releasing the subscription to {key} later");
            let weak = Rc::downgrade(&self.inner.0);
            let key = key.clone();
            self.inner.runtime.spawn(async move {
                if let Some(cache) = QueryCache::from_weak(&weak) {
                    cache.unsubscribe(&key, id);
                }
            });
            return;
        };
        let Some(entry) = entries.get_mut(key) else { return };
        entry.subscribers.retain(|(sub_id, _)| *sub_id != id);
        if entry.subscribers.is_empty() && entry.gc_timer.is_none() {
            entry.gc_timer = Some(self.schedule_gc(key.clone()));
        }
    }

    /// Loads the key again with its last loader, even if it's in the error state
    ///
    /// Returns false if the key was never loaded. A load already in flight is joined.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let mut entries = self.inner.entries.borrow_mut();
        let Some(entry) = entries.get_mut(key) else { return false };
        if entry.pending.is_some() {
            return true;
        }
        let Some(loader) = entry.loader.clone() else { return false };
        let _ = self.start_load(key, entry, loader);
        true
    }

    /// Clears all cached errors, so that the next read loads again
    ///
    /// Returns the number of cleared entries
    pub fn clear_errors(&self) -> usize {
        let mut entries = self.inner.entries.borrow_mut();
        let mut count = 0;
        for entry in entries.values_mut().filter(|e| e.status == QueryStatus::Error && e.pending.is_none()) {
            entry.status = QueryStatus::Idle;
            entry.error = None;
            count += 1;
        }
        count
    }

    /// Clears all cached data, except pending requests
    ///
    /// Entries without subscribers are removed. Returns the number of cleared entries.
    pub fn clear(&self) -> usize {
        let mut removed = Vec::new();
        let mut count = 0;
        {
            let mut entries = self.inner.entries.borrow_mut();
            entries.retain(|_, entry| {
                if entry.pending.is_some() {
                    return true;
                }
                count += 1;
                if entry.subscribers.is_empty() {
                    removed.push(entry.gc_timer.take());
                    return false;
                }
                entry.data = None;
                entry.error = None;
                entry.updated_at = None;
                entry.status = QueryStatus::Idle;
                true
            });
        }
        drop(removed);
        count
    }

    /// Evicts every unreferenced entry without waiting for its retention window
    ///
    /// Returns the number of evicted entries
    pub fn sweep(&self) -> usize {
        let mut removed = Vec::new();
        {
            let mut entries = self.inner.entries.borrow_mut();
            entries.retain(|_, entry| {
                let keep = !entry.subscribers.is_empty() || entry.pending.is_some();
                if !keep {
                    removed.push(entry.gc_timer.take());
                }
                keep
            });
        }
        removed.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.entries.borrow().values().fold(CacheStats::default(), |mut stats, entry| {
            stats.total += 1;
            if entry.pending.is_some() {
                stats.pending += 1;
            }
            if !entry.subscribers.is_empty() {
                stats.subscribed += 1;
            }
            match entry.status {
                QueryStatus::Success => stats.cached += 1,
                QueryStatus::Error => stats.failed += 1,
                QueryStatus::Idle | QueryStatus::Loading => {},
            }
            stats
        })
    }
}

fn snapshot_of_evicted<T: 'static>(key: &QueryKey, result: LoadResult) -> QuerySnapshot<T> {
    let mut entry = CacheEntry::new();
    match result {
        Ok(data) => {
            entry.data = Some(data);
            entry.status = QueryStatus::Success;
        },
        Err(err) => {
            entry.error = Some(err);
            entry.status = QueryStatus::Error;
        },
    }
    entry.snapshot(key)
}

/// Keeps a cache entry alive and notified
///
/// Automatically released when this object is dropped
#[must_use = "dropping a Subscription releases it"]
pub struct Subscription {
    cache: Weak<InnerCache>,
    key: QueryKey,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(cache) = QueryCache::from_weak(&self.cache) {
            cache.unsubscribe(&self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
