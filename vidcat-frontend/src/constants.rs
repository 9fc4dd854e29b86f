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

use std::sync::LazyLock;

use reqwest::Client;

pub static REQWEST_CLIENT: LazyLock<Client> = LazyLock::new(Client::new);

// local storage keys

pub const WATCHLIST_KEY: &str = "watchlist";
pub const PROGRESS_KEY:  &str = "videoProgress";
pub const SETTINGS_KEY:  &str = "settings";

/// Playback rates offered by the player, in cycling order
pub const PLAYBACK_RATES: [f64; 8] = [0.25, 0.5, 0.75, 1., 1.25, 1.5, 1.75, 2.];