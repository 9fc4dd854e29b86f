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

use std::{future::Future, rc::Rc, time::Duration};

use futures::{channel::oneshot, task::{LocalSpawn, LocalSpawnExt}};
use log::error;

/// Source of wall-clock time, in milliseconds since the unix epoch
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Schedules one-shot callbacks
pub trait Timers {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Timeout;
}

/// Represents a scheduled callback
///
/// Automatically cancelled when this object is dropped
#[must_use = "dropping a Timeout cancels it"]
pub struct Timeout {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Timeout {
    pub fn new(cancel: impl FnOnce() + 'static) -> Timeout {
        Timeout { cancel: Some(Box::new(cancel)) }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// The system clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Everything the client core needs from its host: a clock, timers and a way to spawn local tasks
#[derive(Clone)]
pub struct Runtime {
    pub clock: Rc<dyn Clock>,
    pub timers: Rc<dyn Timers>,
    pub spawner: Rc<dyn LocalSpawn>,
}

impl Runtime {
    pub fn new(clock: Rc<dyn Clock>, timers: Rc<dyn Timers>, spawner: Rc<dyn LocalSpawn>) -> Runtime {
        Runtime { clock, timers, spawner }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(future) {
            error!("Failed to spawn a local task: {err}");
        }
    }

    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> Timeout {
        self.timers.set_timeout(delay, Box::new(callback))
    }

    /// Resolves after `delay`. Dropping the future cancels the underlying timer.
    pub fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + 'static {
        let (sender, receiver) = oneshot::channel();
        let timeout = self.set_timeout(delay, move || {
            let _ = sender.send(());
        });
        async move {
            let _timeout = timeout;
            let _ = receiver.await;
        }
    }
}

/// Milliseconds in a duration, saturating
pub fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
