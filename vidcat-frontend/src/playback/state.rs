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

use std::rc::Rc;

use crate::errors::PlaybackError;

#[derive(Clone, PartialEq, Debug, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    /// Terminal for the session
    Error(PlaybackError),
}

impl PlaybackPhase {
    /// Phases in which the position can be moved
    pub fn has_position(&self) -> bool {
        matches!(self, PlaybackPhase::Ready | PlaybackPhase::Playing | PlaybackPhase::Paused)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub video_id: Option<Rc<str>>,
    /// Seconds
    pub current_time: f64,
    /// Seconds, 0 until the metadata is loaded
    pub duration: f64,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub is_seeking: bool,
    /// 0.0 to 1.0, kept while muted
    pub volume: f64,
    pub is_muted: bool,
    pub playback_rate: f64,
    pub is_fullscreen: bool,
    pub controls_visible: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            video_id: None,
            current_time: 0.,
            duration: 0.,
            is_playing: false,
            is_buffering: false,
            is_seeking: false,
            volume: 1.,
            is_muted: false,
            playback_rate: 1.,
            is_fullscreen: false,
            controls_visible: true,
        }
    }
}

impl PlaybackState {
    /// Position as a fraction of the duration, for the progress bar
    pub fn fraction(&self) -> f64 {
        if self.duration > 0. {
            (self.current_time / self.duration).clamp(0., 1.)
        } else {
            0.
        }
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        match self.phase {
            PlaybackPhase::Error(ref err) => Some(err),
            _ => None,
        }
    }
}
