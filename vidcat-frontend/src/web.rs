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
//! Browser bindings: storage, timers, task spawning, the video element and console logging

use std::{cell::RefCell, rc::Rc, time::Duration};

use cloneable_errors::ErrorContext;
use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use log::{debug, error};
use reqwest::Url;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{window, AbortController, AddEventListenerOptions, EventTarget, HtmlVideoElement, Storage};

use crate::{
    api_client::{resolve_base_url, ApiClient},
    errors::{MediaErrorKind, StorageError},
    persistence::KeyValueStorage,
    platform::{Runtime, SystemClock, Timeout, Timers},
    playback::{MediaElement, MediaEvent, PlaybackMachine},
    settings::ClientSettings,
};

fn js_message(value: &JsValue) -> Rc<str> {
    value.as_string().unwrap_or_else(|| format!("{value:?}")).into()
}

// storage

/// `window.localStorage`
pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    pub fn new() -> Result<LocalStorage, StorageError> {
        let storage = window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable)?;
        Ok(LocalStorage { storage })
    }
}

impl KeyValueStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(|_| StorageError::Unavailable)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value)
            .map_err(|err| StorageError::Write { key: key.into(), message: js_message(&err) })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key)
            .map_err(|err| StorageError::Write { key: key.into(), message: js_message(&err) })
    }
}

// runtime

/// `window.setTimeout`
pub struct WindowTimers;

impl Timers for WindowTimers {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Timeout {
        let Some(window) = window() else {
            error!("Cannot schedule a timeout outside of a window");
            return Timeout::new(|| {});
        };
        let closure = Closure::<dyn FnMut()>::once(callback);
        let timeout = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let handle = match window.set_timeout_with_callback_and_timeout_and_arguments_0(closure.as_ref().unchecked_ref(), timeout) {
            Ok(handle) => handle,
            Err(err) => {
                error!("Failed to schedule a timeout: {}", js_message(&err));
                return Timeout::new(|| {});
            },
        };
        Timeout::new(move || {
            window.clear_timeout_with_handle(handle);
            // may run inside the callback itself, which must not free its own closure
            spawn_local(async move { drop(closure) });
        })
    }
}

/// Spawns tasks on the browser's microtask queue
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        spawn_local(future);
        Ok(())
    }
}

pub fn browser_runtime() -> Runtime {
    Runtime::new(Rc::new(SystemClock), Rc::new(WindowTimers), Rc::new(WasmSpawner))
}

/// Builds an HTTP client for the API base URL in the settings, resolved against the page origin
pub fn connect(settings: &ClientSettings) -> Result<ApiClient, ErrorContext> {
    let origin = window()
        .and_then(|w| w.location().href().ok())
        .and_then(|href| Url::parse(&href).ok());
    resolve_base_url(&settings.api_base_url, origin.as_ref()).map(ApiClient::http)
}

// video element

/// A `<video>` element driven by a [`PlaybackMachine`]
pub struct VideoElement {
    element: HtmlVideoElement,
}

impl VideoElement {
    pub fn new(element: HtmlVideoElement) -> VideoElement {
        VideoElement { element }
    }

    fn report(result: Result<(), JsValue>, action: &str) {
        if let Err(err) = result {
            error!("Failed to {action}: {}", js_message(&err));
        }
    }
}

impl MediaElement for VideoElement {
    fn set_source(&self, url: &str) {
        self.element.set_src(url);
    }

    fn play(&self) {
        match self.element.play() {
            Ok(promise) => spawn_local(async move {
                // rejected when autoplay is blocked, the pause event follows
                if let Err(err) = JsFuture::from(promise).await {
                    debug!("play() was rejected: {}", js_message(&err));
                }
            }),
            Err(err) => error!("Failed to start playback: {}", js_message(&err)),
        }
    }

    fn pause(&self) {
        VideoElement::report(self.element.pause(), "pause playback");
    }

    fn set_current_time(&self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn set_volume(&self, volume: f64) {
        self.element.set_volume(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.element.set_muted(muted);
    }

    fn set_playback_rate(&self, rate: f64) {
        self.element.set_playback_rate(rate);
    }

    fn request_fullscreen(&self, fullscreen: bool) {
        if fullscreen {
            VideoElement::report(self.element.request_fullscreen(), "enter fullscreen");
        } else if let Some(document) = window().and_then(|w| w.document()) {
            document.exit_fullscreen();
        }
    }

    fn detach(&self) {
        VideoElement::report(self.element.pause(), "pause playback");
        VideoElement::report(self.element.remove_attribute("src"), "remove the video source");
        self.element.load();
    }
}

/// Represents a registered event listener
///
/// Automatically cancelled via the `AbortController` when this object is dropped
pub struct EventListener {
    _closure: Closure<dyn FnMut()>,
    abort: AbortController,
}

impl EventListener {
    pub fn new(target: &EventTarget, r#type: &str, handler: Closure<dyn FnMut()>) -> Result<EventListener, JsValue> {
        let abort = AbortController::new()?;
        let options = AddEventListenerOptions::new();
        options.set_signal(&abort.signal());
        target.add_event_listener_with_callback_and_add_event_listener_options(r#type, handler.as_ref().unchecked_ref(), &options)?;
        Ok(EventListener {
            _closure: handler,
            abort,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

type SharedMachine = Rc<RefCell<PlaybackMachine<VideoElement>>>;

/// Forwards the media events of `element` to the machine
///
/// The returned listeners must be kept alive for as long as the player is mounted.
pub fn bind_media_events(element: &HtmlVideoElement, machine: &SharedMachine) -> Result<Vec<EventListener>, JsValue> {
    fn forward(machine: &SharedMachine, event: MediaEvent) {
        match machine.try_borrow_mut() {
            Ok(mut machine) => machine.handle_event(event),
            Err(..) => debug!("Dropped {event:?}, the player is busy"),
        }
    }

    let mapping: [(&str, fn(&HtmlVideoElement) -> MediaEvent); 11] = [
        ("loadedmetadata", |e| MediaEvent::LoadedMetadata { duration: e.duration() }),
        ("play", |_| MediaEvent::Play),
        ("playing", |_| MediaEvent::Playing),
        ("pause", |_| MediaEvent::Pause),
        ("waiting", |_| MediaEvent::Waiting),
        ("canplay", |_| MediaEvent::CanPlay),
        ("timeupdate", |e| MediaEvent::TimeUpdate { current_time: e.current_time() }),
        ("seeking", |_| MediaEvent::Seeking),
        ("seeked", |_| MediaEvent::Seeked),
        ("ended", |_| MediaEvent::Ended),
        ("error", |e| MediaEvent::Error(e.error().map_or(MediaErrorKind::Unknown, |err| MediaErrorKind::from_code(err.code())))),
    ];

    let mut listeners = Vec::with_capacity(mapping.len() + 1);
    for (name, to_event) in mapping {
        let target = element.clone();
        let machine = machine.clone();
        let closure = Closure::<dyn FnMut()>::new(move || forward(&machine, to_event(&target)));
        listeners.push(EventListener::new(element, name, closure)?);
    }

    if let Some(document) = window().and_then(|w| w.document()) {
        let machine = machine.clone();
        let target = document.clone();
        let closure = Closure::<dyn FnMut()>::new(move || {
            forward(&machine, MediaEvent::FullscreenChange(target.fullscreen_element().is_some()));
        });
        listeners.push(EventListener::new(&document, "fullscreenchange", closure)?);
    }
    Ok(listeners)
}

// logging

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}", record.target(), record.args());
        match record.level() {
            log::Level::Error => gloo_console::error!(message),
            log::Level::Warn => gloo_console::warn!(message),
            log::Level::Info => gloo_console::info!(message),
            log::Level::Debug | log::Level::Trace => gloo_console::debug!(message),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Routes the `log` macros to the browser console
pub fn init_logging(level: log::LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
