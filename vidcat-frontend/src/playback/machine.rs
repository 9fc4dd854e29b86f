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

use std::{cell::RefCell, rc::{Rc, Weak}, time::Duration};

use log::{debug, warn};

use crate::{
    constants::PLAYBACK_RATES,
    errors::PlaybackError,
    persistence::LocalStore,
    platform::{millis, Runtime, Timeout},
    settings::ClientSettings,
};

use super::{MediaElement, MediaEvent, PlaybackPhase, PlaybackState};

type Listener = Box<dyn Fn(&PlaybackState)>;

/// State shared with the scheduled callbacks
#[derive(Default)]
struct PlayerCell {
    state: RefCell<PlaybackState>,
    listener: RefCell<Option<Listener>>,
}

impl PlayerCell {
    fn notify(&self) {
        if let Some(ref listener) = *self.listener.borrow() {
            listener(&self.state.borrow());
        }
    }
}

/// Drives one media element through a playback session
///
/// Watch progress is written to the [`LocalStore`] at most once per flush interval while playing,
/// and immediately on pause, end and teardown.
pub struct PlaybackMachine<M: MediaElement> {
    media: M,
    store: LocalStore,
    runtime: Runtime,
    flush_interval: Duration,
    hide_delay: Duration,
    cell: Rc<PlayerCell>,
    last_flush: Option<i64>,
    controls_timer: Option<Timeout>,
    attached: bool,
    /// Set once the session played or seeked, so that an untouched resume doesn't rewrite the record
    position_moved: bool,
}

fn is_playback_rate(rate: f64) -> bool {
    PLAYBACK_RATES.iter().any(|r| (r - rate).abs() < f64::EPSILON)
}

impl<M: MediaElement> PlaybackMachine<M> {
    pub fn new(media: M, store: LocalStore, runtime: Runtime, settings: &ClientSettings) -> PlaybackMachine<M> {
        PlaybackMachine {
            media,
            store,
            runtime,
            flush_interval: settings.progress_flush_interval(),
            hide_delay: settings.controls_hide_delay(),
            cell: Rc::default(),
            last_flush: None,
            controls_timer: None,
            attached: false,
            position_moved: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.cell.state.borrow().clone()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.cell.state.borrow().phase.clone()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Registers a callback fired after every state change
    pub fn set_listener(&self, listener: impl Fn(&PlaybackState) + 'static) {
        *self.cell.listener.borrow_mut() = Some(Box::new(listener));
    }

    fn update<R>(&self, f: impl FnOnce(&mut PlaybackState) -> R) -> R {
        let result = f(&mut self.cell.state.borrow_mut());
        self.cell.notify();
        result
    }

    /// Starts a new session, tearing down the previous one
    pub fn load(&mut self, video_id: Rc<str>, source: &str) {
        self.teardown();
        debug!("Loading video {video_id} from {source}");
        self.update(|state| {
            let volume = state.volume;
            let is_muted = state.is_muted;
            *state = PlaybackState {
                phase: PlaybackPhase::Loading,
                video_id: Some(video_id),
                volume,
                is_muted,
                ..PlaybackState::default()
            };
        });
        self.last_flush = None;
        self.position_moved = false;
        self.attached = true;
        self.media.set_source(source);
    }

    /// Writes the current position to the store
    fn flush(&mut self) {
        let (video_id, position) = {
            let state = self.cell.state.borrow();
            (state.video_id.clone(), state.current_time)
        };
        if let Some(video_id) = video_id {
            self.store.set_progress(&video_id, position);
            self.last_flush = Some(self.runtime.now_ms());
        }
    }

    fn position_worth_saving(&self, phase: &PlaybackPhase) -> bool {
        match phase {
            PlaybackPhase::Playing | PlaybackPhase::Paused => true,
            PlaybackPhase::Ready => self.position_moved,
            _ => false,
        }
    }

    /// Leading-edge throttled [`Self::flush`]
    fn maybe_flush(&mut self) {
        let now = self.runtime.now_ms();
        let due = self.last_flush.is_none_or(|last| now - last >= millis(self.flush_interval));
        if due {
            self.flush();
        }
    }

    fn schedule_hide(&mut self) {
        let cell: Weak<PlayerCell> = Rc::downgrade(&self.cell);
        self.controls_timer = Some(self.runtime.set_timeout(self.hide_delay, move || {
            let Some(cell) = cell.upgrade() else { return };
            let hidden = {
                let mut state = cell.state.borrow_mut();
                if state.is_playing && state.controls_visible {
                    state.controls_visible = false;
                    true
                } else {
                    false
                }
            };
            if hidden {
                cell.notify();
            }
        }));
    }

    fn show_controls(&mut self) {
        self.controls_timer = None;
        self.update(|state| state.controls_visible = true);
    }

    fn enter_playing(&mut self) {
        let restart = self.update(|state| {
            let restart = state.phase == PlaybackPhase::Ended;
            if restart {
                state.current_time = 0.;
            }
            state.phase = PlaybackPhase::Playing;
            state.is_playing = true;
            restart
        });
        self.position_moved = true;
        if restart {
            self.media.set_current_time(0.);
        }
        self.schedule_hide();
    }

    fn enter_paused(&mut self) {
        self.update(|state| {
            state.phase = PlaybackPhase::Paused;
            state.is_playing = false;
            state.is_buffering = false;
        });
        self.flush();
        self.show_controls();
    }

    fn can_play(&self) -> bool {
        matches!(self.cell.state.borrow().phase, PlaybackPhase::Ready | PlaybackPhase::Paused | PlaybackPhase::Ended)
    }

    pub fn play(&mut self) {
        if !self.can_play() {
            debug!("Ignoring play() in phase {:?}", self.phase());
            return;
        }
        self.media.play();
        self.enter_playing();
    }

    pub fn pause(&mut self) {
        if self.phase() != PlaybackPhase::Playing {
            return;
        }
        self.media.pause();
        self.enter_paused();
    }

    pub fn toggle_play(&mut self) {
        if self.phase() == PlaybackPhase::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn handle_event(&mut self, event: MediaEvent) {
        let phase = self.phase();
        if !self.attached || matches!(phase, PlaybackPhase::Error(..)) {
            debug!("Ignoring {event:?} in phase {phase:?}");
            return;
        }
        match event {
            MediaEvent::LoadedMetadata { duration } => {
                if phase != PlaybackPhase::Loading {
                    return;
                }
                let duration = if duration.is_finite() && duration > 0. { duration } else { 0. };
                let video_id = self.cell.state.borrow().video_id.clone();
                let resume = video_id.map_or(0., |id| self.store.get_progress(&id));
                let resume = (resume > 0. && resume < duration).then_some(resume);
                if let Some(position) = resume {
                    debug!("Resuming playback at {position}s");
                    self.media.set_current_time(position);
                }
                self.update(|state| {
                    state.duration = duration;
                    state.current_time = resume.unwrap_or(0.);
                    state.phase = PlaybackPhase::Ready;
                    state.controls_visible = true;
                });
            },
            MediaEvent::Play => {
                if self.can_play() {
                    self.enter_playing();
                }
            },
            MediaEvent::Playing => {
                self.update(|state| state.is_buffering = false);
                if matches!(phase, PlaybackPhase::Ready | PlaybackPhase::Paused) {
                    self.enter_playing();
                }
            },
            MediaEvent::Pause => {
                if phase == PlaybackPhase::Playing {
                    self.enter_paused();
                }
            },
            MediaEvent::Waiting => {
                if phase == PlaybackPhase::Playing {
                    self.update(|state| state.is_buffering = true);
                }
            },
            MediaEvent::CanPlay => self.update(|state| state.is_buffering = false),
            MediaEvent::TimeUpdate { current_time } => {
                if !current_time.is_finite() {
                    return;
                }
                self.update(|state| state.current_time = current_time.max(0.));
                if phase == PlaybackPhase::Playing {
                    self.maybe_flush();
                }
            },
            MediaEvent::Seeking => self.update(|state| state.is_seeking = true),
            MediaEvent::Seeked => self.update(|state| state.is_seeking = false),
            MediaEvent::Ended => {
                self.update(|state| {
                    state.current_time = state.duration;
                    state.phase = PlaybackPhase::Ended;
                    state.is_playing = false;
                    state.is_buffering = false;
                });
                self.flush();
                self.show_controls();
            },
            MediaEvent::FullscreenChange(fullscreen) => self.update(|state| state.is_fullscreen = fullscreen),
            MediaEvent::Error(kind) => {
                let error = PlaybackError { kind, detail: None };
                warn!("Playback failed: {error}");
                // current_time still holds the last good position
                if self.position_worth_saving(&phase) {
                    self.flush();
                }
                self.update(|state| {
                    state.phase = PlaybackPhase::Error(error);
                    state.is_playing = false;
                    state.is_buffering = false;
                    state.is_seeking = false;
                });
                self.show_controls();
            },
        }
    }

    /// Moves to `seconds`, clamped to the video
    pub fn seek_to(&mut self, seconds: f64) {
        let (phase, duration) = {
            let state = self.cell.state.borrow();
            (state.phase.clone(), state.duration)
        };
        if !seconds.is_finite() || !(phase.has_position() || phase == PlaybackPhase::Ended) {
            return;
        }
        let position = seconds.clamp(0., duration);
        self.media.set_current_time(position);
        self.position_moved = true;
        self.update(|state| {
            state.current_time = position;
            if state.phase == PlaybackPhase::Ended && position < duration {
                state.phase = PlaybackPhase::Paused;
            }
        });
    }

    /// Seeks to the position under the pointer on a progress bar
    pub fn scrub(&mut self, pointer_x: f64, bar_left: f64, bar_width: f64) {
        if !bar_width.is_finite() || bar_width <= 0. {
            return;
        }
        let fraction = ((pointer_x - bar_left) / bar_width).clamp(0., 1.);
        let duration = self.cell.state.borrow().duration;
        self.seek_to(fraction * duration);
    }

    pub fn skip(&mut self, delta: f64) {
        let current = self.cell.state.borrow().current_time;
        self.seek_to(current + delta);
    }

    pub fn set_volume(&mut self, volume: f64) {
        if !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0., 1.);
        self.media.set_volume(volume);
        let unmute = self.update(|state| {
            state.volume = volume;
            let unmute = state.is_muted && volume > 0.;
            if unmute {
                state.is_muted = false;
            }
            unmute
        });
        if unmute {
            self.media.set_muted(false);
        }
    }

    pub fn toggle_mute(&mut self) {
        let muted = self.update(|state| {
            state.is_muted = !state.is_muted;
            state.is_muted
        });
        self.media.set_muted(muted);
    }

    /// Returns false if the rate is not one of the offered ones
    pub fn set_playback_rate(&mut self, rate: f64) -> bool {
        if !is_playback_rate(rate) {
            debug!("Rejecting playback rate {rate}");
            return false;
        }
        self.media.set_playback_rate(rate);
        self.update(|state| state.playback_rate = rate);
        true
    }

    /// Switches to the next offered rate, wrapping around
    pub fn cycle_playback_rate(&mut self) -> f64 {
        let current = self.cell.state.borrow().playback_rate;
        let next = PLAYBACK_RATES.iter()
            .position(|r| (r - current).abs() < f64::EPSILON)
            .map_or(1., |i| PLAYBACK_RATES[(i + 1) % PLAYBACK_RATES.len()]);
        self.set_playback_rate(next);
        next
    }

    pub fn toggle_fullscreen(&mut self) {
        let fullscreen = self.update(|state| {
            state.is_fullscreen = !state.is_fullscreen;
            state.is_fullscreen
        });
        self.media.request_fullscreen(fullscreen);
    }

    /// Shows the controls, hiding them again after a while if the video is playing
    pub fn user_activity(&mut self) {
        self.update(|state| state.controls_visible = true);
        if self.cell.state.borrow().is_playing {
            self.schedule_hide();
        } else {
            self.controls_timer = None;
        }
    }

    /// Ends the session, saving the position if there is one worth saving
    ///
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if !self.attached {
            return;
        }
        let phase = self.phase();
        if self.position_worth_saving(&phase) {
            self.flush();
        }
        self.controls_timer = None;
        self.media.detach();
        self.attached = false;
        self.update(|state| {
            state.phase = PlaybackPhase::Idle;
            state.is_playing = false;
            state.is_buffering = false;
            state.is_seeking = false;
        });
    }
}

impl<M: MediaElement> Drop for PlaybackMachine<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}
