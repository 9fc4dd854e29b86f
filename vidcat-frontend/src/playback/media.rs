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

use crate::errors::MediaErrorKind;

/// The commands the player issues to its media element
///
/// Implementations are expected to be thin wrappers, all state lives in the player.
pub trait MediaElement {
    fn set_source(&self, url: &str);
    fn play(&self);
    fn pause(&self);
    fn set_current_time(&self, seconds: f64);
    fn set_volume(&self, volume: f64);
    fn set_muted(&self, muted: bool);
    fn set_playback_rate(&self, rate: f64);
    fn request_fullscreen(&self, fullscreen: bool);
    /// Stops loading and releases the source
    fn detach(&self);
}

/// Events reported by the media element
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    Play,
    Playing,
    Pause,
    Waiting,
    CanPlay,
    TimeUpdate { current_time: f64 },
    Seeking,
    Seeked,
    Ended,
    FullscreenChange(bool),
    Error(MediaErrorKind),
}
