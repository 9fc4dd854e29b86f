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

use std::sync::Arc;

use enumflags2::{bitflags, BitFlags};
use vidcat_api::sync::VideoSummary;

use crate::dedupe::{Dedupe, StringSet};

#[bitflags]
#[repr(u8)]
#[derive(Clone, Copy, Debug)]
pub enum VideoFlags {
    /// Soft-deleted, hidden from every query
    Removed,
    /// A media file was attached through the upload endpoint
    Uploaded,
    /// The thumbnail was set through the thumbnail endpoint
    CustomThumbnail,
}

#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub file_name: Arc<str>,
    pub content_type: Arc<str>,
    pub size: usize,
}

#[derive(Clone, Debug)]
pub struct StoredVideo {
    pub video: VideoSummary,
    pub flags: BitFlags<VideoFlags>,
    pub upload: Option<UploadedFile>,
}

impl StoredVideo {
    pub fn new(video: VideoSummary) -> Self {
        StoredVideo {
            video,
            flags: BitFlags::empty(),
            upload: None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.flags.contains(VideoFlags::Removed)
    }
}

impl Dedupe for StoredVideo {
    fn dedupe(&mut self, set: &mut StringSet) {
        self.video.dedupe(set);
        if let Some(ref mut upload) = self.upload {
            upload.content_type = set.intern(upload.content_type.clone());
        }
    }
}
