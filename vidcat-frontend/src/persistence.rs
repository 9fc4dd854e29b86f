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
//! Watch progress and the watchlist, persisted in browser-local storage

use std::{cell::{Cell, RefCell}, collections::HashMap, rc::Rc};

use cloneable_errors::ErrContext;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    api::{ProgressRecord, VideoSummary, WatchlistItem},
    constants::{PROGRESS_KEY, WATCHLIST_KEY},
    errors::StorageError,
    platform::Clock,
    utils::RcEq,
};

/// String key-value storage with the semantics of `window.localStorage`
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage, for tests and non-browser hosts
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<InnerMemoryStorage>,
}

#[derive(Default)]
struct InnerMemoryStorage {
    items: RefCell<HashMap<String, String>>,
    writes: RefCell<HashMap<String, usize>>,
    fail_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    /// Makes every following write fail, as if the quota was exceeded
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.set(fail);
    }

    /// Number of successful writes to `key`
    pub fn write_count(&self, key: &str) -> usize {
        self.inner.writes.borrow().get(key).copied().unwrap_or(0)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.inner.fail_writes.get() {
            return Err(StorageError::Write { key: key.into(), message: "quota exceeded".into() });
        }
        self.inner.items.borrow_mut().insert(key.to_owned(), value.to_owned());
        *self.inner.writes.borrow_mut().entry(key.to_owned()).or_default() += 1;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.items.borrow_mut().remove(key);
        Ok(())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WatchlistEntry {
    pub video_id: Rc<str>,
    /// Milliseconds since the unix epoch, unknown for entries read back from storage
    pub date_added: Option<i64>,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct LoadedState {
    pub progress: Vec<ProgressRecord>,
    pub watchlist: Vec<WatchlistEntry>,
}

fn read_list<T: DeserializeOwned>(storage: &dyn KeyValueStorage, key: &str) -> Vec<T> {
    match storage.get_item(key) {
        Ok(None) => Vec::new(),
        Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
            warn!("Ignoring malformed local storage data under '{key}': {err}");
            Vec::new()
        }),
        Err(err) => {
            warn!("Failed to read '{key}' from local storage: {err}");
            Vec::new()
        },
    }
}

/// Reads the watchlist and watch progress from storage
///
/// Absent keys produce empty collections, as do malformed ones. Progress records with negative or
/// non-finite values are dropped, and duplicate ids keep their last record.
pub fn load_all(storage: &dyn KeyValueStorage) -> LoadedState {
    let mut progress: Vec<ProgressRecord> = Vec::new();
    for record in read_list::<ProgressRecord>(storage, PROGRESS_KEY) {
        if !record.progress.is_finite() || record.progress < 0. {
            debug!("Dropping invalid progress record for {}: {}", record.video_id, record.progress);
            continue;
        }
        match progress.iter_mut().find(|r| r.video_id == record.video_id) {
            Some(existing) => *existing = record,
            None => progress.push(record),
        }
    }

    let mut watchlist: Vec<WatchlistEntry> = Vec::new();
    for item in read_list::<WatchlistItem>(storage, WATCHLIST_KEY) {
        let date_added = match item {
            WatchlistItem::Id(..) => None,
            WatchlistItem::Entry { date_added, .. } => date_added,
        };
        let video_id = item.video_id().clone();
        if !watchlist.iter().any(|e| e.video_id == video_id) {
            watchlist.push(WatchlistEntry { video_id, date_added });
        }
    }

    LoadedState { progress, watchlist }
}

/// Browser-local state of the viewer
///
/// Memory is authoritative, every change is written through to storage. Write failures are logged
/// and otherwise ignored.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalStore {
    inner: RcEq<InnerStore>,
}

struct InnerStore {
    storage: Rc<dyn KeyValueStorage>,
    clock: Rc<dyn Clock>,
    state: RefCell<LoadedState>,
}

impl LocalStore {
    pub fn open(storage: Rc<dyn KeyValueStorage>, clock: Rc<dyn Clock>) -> LocalStore {
        let state = load_all(&*storage);
        debug!("Loaded {} progress records and {} watchlist entries", state.progress.len(), state.watchlist.len());
        LocalStore {
            inner: RcEq::new(InnerStore {
                storage,
                clock,
                state: RefCell::new(state),
            }),
        }
    }

    fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|err| StorageError::Serialize(err.context(format!("Failed to serialize '{key}'"))))
            .and_then(|json| self.inner.storage.set_item(key, &json));
        if let Err(err) = result {
            warn!("Failed to persist local state: {err}");
        }
    }

    fn persist_progress(&self) {
        let state = self.inner.state.borrow();
        self.persist(PROGRESS_KEY, &state.progress);
    }

    fn persist_watchlist(&self) {
        let ids: Vec<WatchlistItem> = self.inner.state.borrow().watchlist.iter()
            .map(|e| WatchlistItem::Id(e.video_id.clone()))
            .collect();
        self.persist(WATCHLIST_KEY, &ids);
    }

    /// Saved position in seconds, 0 if the video was never watched
    pub fn get_progress(&self, video_id: &str) -> f64 {
        self.progress_record(video_id).map_or(0., |r| r.progress)
    }

    pub fn progress_record(&self, video_id: &str) -> Option<ProgressRecord> {
        self.inner.state.borrow().progress.iter().find(|r| &*r.video_id == video_id).cloned()
    }

    /// Saves the position, clamped to be non-negative
    pub fn set_progress(&self, video_id: &str, seconds: f64) {
        if !seconds.is_finite() {
            debug!("Ignoring non-finite progress for {video_id}");
            return;
        }
        let record = ProgressRecord {
            video_id: video_id.into(),
            progress: seconds.max(0.),
            timestamp: self.inner.clock.now_ms(),
        };
        {
            let mut state = self.inner.state.borrow_mut();
            match state.progress.iter_mut().find(|r| &*r.video_id == video_id) {
                Some(existing) => *existing = record,
                None => state.progress.push(record),
            }
        }
        self.persist_progress();
    }

    pub fn is_in_watchlist(&self, video_id: &str) -> bool {
        self.inner.state.borrow().watchlist.iter().any(|e| &*e.video_id == video_id)
    }

    /// Returns false if the video was already on the watchlist
    pub fn add(&self, video_id: &str) -> bool {
        if self.is_in_watchlist(video_id) {
            return false;
        }
        let entry = WatchlistEntry {
            video_id: video_id.into(),
            date_added: Some(self.inner.clock.now_ms()),
        };
        self.inner.state.borrow_mut().watchlist.push(entry);
        self.persist_watchlist();
        true
    }

    /// Returns false if the video was not on the watchlist
    pub fn remove(&self, video_id: &str) -> bool {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let before = state.watchlist.len();
            state.watchlist.retain(|e| &*e.video_id != video_id);
            before != state.watchlist.len()
        };
        if removed {
            self.persist_watchlist();
        }
        removed
    }

    /// Returns whether the video is on the watchlist afterwards
    pub fn toggle(&self, video_id: &str) -> bool {
        if self.remove(video_id) {
            false
        } else {
            self.add(video_id)
        }
    }

    pub fn watchlist(&self) -> Vec<WatchlistEntry> {
        self.inner.state.borrow().watchlist.clone()
    }

    /// Videos watched part of the way through, most recently watched first
    pub fn continue_watching<'a>(&self, videos: &'a [VideoSummary]) -> Vec<(&'a VideoSummary, f64)> {
        let state = self.inner.state.borrow();
        let mut started: Vec<(&VideoSummary, &ProgressRecord)> = videos.iter()
            .filter_map(|video| {
                let record = state.progress.iter().find(|r| r.video_id == video.id)?;
                (record.progress > 0. && record.progress < f64::from(video.duration)).then_some((video, record))
            })
            .collect();
        started.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
        started.into_iter().map(|(video, record)| (video, record.progress)).collect()
    }
}
