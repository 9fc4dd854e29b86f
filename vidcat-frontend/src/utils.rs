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

use std::{ops::Deref, rc::Rc};

use reqwest::Url;

pub trait ReqwestUrlExt: Sized {
    /// Appends percent-encoded path segments to a copy of this URL.
    /// Returns `None` for URLs that cannot be a base.
    fn join_segments<I>(&self, segments: I) -> Option<Self>
    where I: IntoIterator,
    I::Item: AsRef<str>;
}

impl ReqwestUrlExt for Url {
    fn join_segments<I>(&self, segments: I) -> Option<Self>
        where I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.clone();
        url.path_segments_mut()
            .ok()?
            // a trailing slash on the base would otherwise leave an empty segment behind
            .pop_if_empty()
            .extend(segments);
        Some(url)
    }
}

/// Wrapper type for comparing Rc's via their addresses
pub struct RcEq<T: ?Sized>(pub Rc<T>);

impl<T: ?Sized> PartialEq for RcEq<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl<T: ?Sized> Eq for RcEq<T> {}

impl<T: ?Sized> Deref for RcEq<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> Clone for RcEq<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> RcEq<T> {
    pub fn new(val: T) -> Self {
        Self(Rc::new(val))
    }
}
