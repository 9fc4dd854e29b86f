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

use std::{collections::HashSet, sync::Arc};

use vidcat_api::sync::VideoSummary;


/// Interning pool for the short strings shared between catalog entries (categories, tags)
#[derive(Default, Clone)]
pub struct StringSet {
    pub set: HashSet<Arc<str>>,
}

impl StringSet {
    pub fn with_capacity(capacity: usize) -> StringSet {
        StringSet {
            set: HashSet::with_capacity(capacity),
        }
    }

    pub fn dedupe_struct<T: Dedupe>(&mut self, obj: &mut T) {
        obj.dedupe(self);
    }

    /// Returns the pooled copy of the given string, adding it to the pool if it's new
    pub fn intern(&mut self, value: Arc<str>) -> Arc<str> {
        match self.set.get(&value) {
            Some(pooled) => pooled.clone(),
            None => {
                self.set.insert(value.clone());
                value
            },
        }
    }

    /// Drops strings that are only referenced by the pool itself
    pub fn clean(&mut self) {
        self.set.retain(|s| Arc::strong_count(s) > 1);
    }
}

pub trait Dedupe {
    fn dedupe(&mut self, set: &mut StringSet);
}

impl Dedupe for VideoSummary {
    fn dedupe(&mut self, set: &mut StringSet) {
        self.categories = self.categories.drain(..).map(|c| set.intern(c)).collect();
        self.tags = self.tags.drain(..).map(|t| set.intern(t)).collect();
    }
}
