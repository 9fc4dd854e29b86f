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
//! Client core of the video catalog: query cache, browser-local persistence and the playback
//! state machine. Everything here is single-threaded and driven by injected timers.

pub mod api_client;
pub mod constants;
pub mod errors;
#[cfg(any(test, feature = "mock-api"))]
pub mod mock;
pub mod persistence;
pub mod platform;
pub mod playback;
pub mod query_cache;
pub mod query_key;
pub mod settings;
#[cfg(test)]
pub(crate) mod testing;
pub mod utils;
pub mod videos;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use vidcat_api::unsync as api;
