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
//! Deterministic time for tests

use std::{cell::{Cell, RefCell}, collections::BTreeMap, future::Future, rc::Rc, time::Duration};

use futures::{executor::LocalPool, task::LocalSpawnExt, FutureExt};

use crate::platform::{millis, Clock, Runtime, Timeout, Timers};

pub const START_MS: i64 = 1_718_409_600_000; // 2024-06-15T00:00:00Z

/// Virtual clock and timer queue. Time only moves when told to.
#[derive(Clone)]
pub struct VirtualTime {
    inner: Rc<InnerVT>,
}

struct InnerVT {
    now: Cell<i64>,
    next_id: Cell<u64>,
    timers: RefCell<BTreeMap<(i64, u64), Box<dyn FnOnce()>>>,
}

impl VirtualTime {
    pub fn new(start_ms: i64) -> VirtualTime {
        VirtualTime {
            inner: Rc::new(InnerVT {
                now: Cell::new(start_ms),
                next_id: Cell::new(0),
                timers: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Fires the earliest timer due at or before `until`, moving the clock to its deadline
    pub fn fire_next(&self, until: i64) -> bool {
        let next = {
            let mut timers = self.inner.timers.borrow_mut();
            match timers.first_key_value() {
                Some((&(deadline, _), _)) if deadline <= until => timers.pop_first(),
                _ => None,
            }
        };
        let Some(((deadline, _), callback)) = next else {
            return false;
        };
        self.inner.now.set(self.inner.now.get().max(deadline));
        callback();
        true
    }

    /// Moves the clock forward, firing every timer that becomes due on the way
    pub fn advance(&self, duration: Duration) {
        let target = self.inner.now.get() + millis(duration);
        while self.fire_next(target) {}
        self.inner.now.set(target);
    }
}

impl Clock for VirtualTime {
    fn now_ms(&self) -> i64 {
        self.inner.now.get()
    }
}

impl Timers for VirtualTime {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Timeout {
        let deadline = self.inner.now.get().saturating_add(millis(delay));
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.timers.borrow_mut().insert((deadline, id), callback);
        let inner = Rc::downgrade(&self.inner);
        Timeout::new(move || {
            if let Some(inner) = inner.upgrade() {
                // removed outside of the borrow, the callback may own anything
                let removed = inner.timers.borrow_mut().remove(&(deadline, id));
                drop(removed);
            }
        })
    }
}

/// A `LocalPool` executor driven together with a [`VirtualTime`]
pub struct TestRuntime {
    pool: LocalPool,
    pub time: VirtualTime,
}

impl TestRuntime {
    pub fn new() -> TestRuntime {
        TestRuntime {
            pool: LocalPool::new(),
            time: VirtualTime::new(START_MS),
        }
    }

    pub fn runtime(&self) -> Runtime {
        Runtime::new(
            Rc::new(self.time.clone()),
            Rc::new(self.time.clone()),
            Rc::new(self.pool.spawner()),
        )
    }

    /// Runs all tasks until none of them can make progress
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Advances virtual time, letting tasks run after every fired timer
    pub fn advance(&mut self, duration: Duration) {
        let target = self.time.now_ms() + millis(duration);
        self.run();
        while self.time.fire_next(target) {
            self.run();
        }
        self.time.inner.now.set(target.max(self.time.now_ms()));
        self.run();
    }

    /// Spawns a future, returning a slot that will hold its output once it completes
    pub fn spawn<T: 'static>(&mut self, future: impl Future<Output = T> + 'static) -> Rc<RefCell<Option<T>>> {
        let slot = Rc::new(RefCell::new(None));
        let slot2 = slot.clone();
        self.pool.spawner()
            .spawn_local(future.map(move |v| { slot2.replace(Some(v)); }))
            .unwrap();
        self.run();
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_deadline_order() {
        let time = VirtualTime::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());
        let _b = time.set_timeout(Duration::from_millis(200), Box::new(move || l1.borrow_mut().push("b")));
        let _a = time.set_timeout(Duration::from_millis(100), Box::new(move || l2.borrow_mut().push("a")));
        time.advance(Duration::from_millis(150));
        assert_eq!(*log.borrow(), ["a"]);
        time.advance(Duration::from_millis(100));
        assert_eq!(*log.borrow(), ["a", "b"]);
        assert_eq!(time.now_ms(), 250);
    }

    #[test]
    fn dropped_timeouts_never_fire() {
        let time = VirtualTime::new(0);
        let fired = Rc::new(Cell::new(false));
        let fired2 = fired.clone();
        let timeout = time.set_timeout(Duration::from_millis(10), Box::new(move || fired2.set(true)));
        assert_eq!(time.pending_timers(), 1);
        drop(timeout);
        assert_eq!(time.pending_timers(), 0);
        time.advance(Duration::from_secs(1));
        assert!(!fired.get());
    }

    #[test]
    fn sleep_resolves_on_the_virtual_clock() {
        let mut rt = TestRuntime::new();
        let runtime = rt.runtime();
        let slot = rt.spawn(runtime.sleep(Duration::from_secs(1)));
        assert!(slot.borrow().is_none());
        rt.advance(Duration::from_millis(999));
        assert!(slot.borrow().is_none());
        rt.advance(Duration::from_millis(1));
        assert!(slot.borrow().is_some());
    }
}
