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

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use indexmap::IndexSet;
use log::{debug, info};
use regex::{Regex, RegexBuilder};
use vidcat_api::sync::{
    CreateVideo, DeleteResponse, FileUpload, SortField, SortOrder, ThumbnailResponse, UpdateVideo, UploadResponse, ValidationIssue, VideoListParams, VideoPage, VideoStats, VideoStatus, VideoSummary, MAX_PAGE_SIZE
};

use crate::{
    dedupe::{Dedupe, StringSet}, errors::CatalogError, types::{StoredVideo, UploadedFile, VideoFlags}
};

type Result<T> = std::result::Result<T, CatalogError>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct VideoCatalog {
    videos: Vec<StoredVideo>,
    /// id -> position in `videos`, includes removed videos
    index: HashMap<Arc<str>, usize>,
    strings: StringSet,
    next_id: u64,
    revision: u64,
}

fn numeric_suffix(id: &str) -> Option<u64> {
    id.strip_prefix("vid-")?.parse().ok()
}

fn unique<I: IntoIterator<Item = Arc<str>>>(values: I) -> IndexSet<Arc<str>> {
    values.into_iter()
        .map(|v| Arc::from(v.trim()))
        .filter(|v: &Arc<str>| !v.is_empty())
        .collect()
}

/// Accepts both plain dates and full ISO-8601 timestamps
fn parse_date(param: &'static str, value: &str) -> Result<NaiveDate> {
    let date = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| CatalogError::InvalidParam { param, value: value.to_owned() })
}

fn views(video: &VideoSummary) -> u64 {
    video.stats.as_ref().map_or(0, |s| s.views)
}

fn rating(video: &VideoSummary) -> f64 {
    video.stats.as_ref().map_or(0., |s| s.average_rating)
}

fn compare(a: &VideoSummary, b: &VideoSummary, field: SortField) -> Ordering {
    match field {
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortField::UploadDate => a.upload_date.cmp(&b.upload_date),
        SortField::Views => views(a).cmp(&views(b)),
        SortField::Duration => a.duration.cmp(&b.duration),
        SortField::Rating => rating(a).total_cmp(&rating(b)),
    }
}

/// Strips any directory components a browser might have sent along with the file name
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

struct ListFilter {
    search: Option<Regex>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl ListFilter {
    fn new(params: &VideoListParams) -> Result<Self> {
        let search = match params.search {
            Some(ref search) if !search.trim().is_empty() => Some(
                RegexBuilder::new(&regex::escape(search.trim()))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| CatalogError::Internal(e.to_string()))?
            ),
            _ => None,
        };
        Ok(ListFilter {
            search,
            start: params.start_date.as_deref().map(|d| parse_date("startDate", d)).transpose()?,
            end: params.end_date.as_deref().map(|d| parse_date("endDate", d)).transpose()?,
        })
    }

    fn matches(&self, params: &VideoListParams, video: &VideoSummary) -> bool {
        if let Some(ref search) = self.search {
            let hit = search.is_match(&video.title)
                || search.is_match(&video.description)
                || video.tags.iter().any(|t| search.is_match(t));
            if !hit {
                return false;
            }
        }
        if params.status.is_some_and(|s| s != video.status) {
            return false;
        }
        if !params.categories.is_empty() && !params.categories.iter().any(|c| video.categories.contains(c)) {
            return false;
        }
        if self.start.is_some() || self.end.is_some() {
            let Ok(date) = NaiveDate::parse_from_str(&video.upload_date, DATE_FORMAT) else {
                return false;
            };
            if self.start.is_some_and(|start| date < start) || self.end.is_some_and(|end| date > end) {
                return false;
            }
        }
        true
    }
}

impl VideoCatalog {
    pub fn new(videos: Vec<VideoSummary>) -> Self {
        let mut strings = StringSet::with_capacity(64);
        let mut index = HashMap::with_capacity(videos.len());
        let mut stored = Vec::with_capacity(videos.len());
        let mut next_id = 1;
        for video in videos {
            if index.contains_key(&video.id) {
                debug!("Skipping duplicate video {}", video.id);
                continue;
            }
            if let Some(n) = numeric_suffix(&video.id) {
                next_id = next_id.max(n + 1);
            }
            let mut entry = StoredVideo::new(video);
            strings.dedupe_struct(&mut entry);
            index.insert(entry.video.id.clone(), stored.len());
            stored.push(entry);
        }
        info!("Catalog initialized with {} videos", stored.len());
        VideoCatalog {
            videos: stored,
            index,
            strings,
            next_id,
            revision: 0,
        }
    }

    /// Number of live (not removed) videos
    pub fn len(&self) -> usize {
        self.videos.iter().filter(|v| !v.is_removed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn removed_count(&self) -> usize {
        self.videos.iter().filter(|v| v.is_removed()).count()
    }

    /// Incremented on every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn string_count(&self) -> usize {
        self.strings.set.len()
    }

    pub fn live(&self) -> impl Iterator<Item = &StoredVideo> {
        self.videos.iter().filter(|v| !v.is_removed())
    }

    pub fn get_stored(&self, id: &str) -> Option<&StoredVideo> {
        self.index.get(id)
            .map(|&i| &self.videos[i])
            .filter(|v| !v.is_removed())
    }

    fn live_index(&self, id: &str) -> Result<usize> {
        self.index.get(id)
            .copied()
            .filter(|&i| !self.videos[i].is_removed())
            .ok_or_else(|| CatalogError::NotFound { id: id.into() })
    }

    pub fn get(&self, id: &str) -> Result<&VideoSummary> {
        self.get_stored(id)
            .map(|v| &v.video)
            .ok_or_else(|| CatalogError::NotFound { id: id.into() })
    }

    pub fn list(&self, params: &VideoListParams) -> Result<VideoPage> {
        if params.page == 0 {
            return Err(CatalogError::InvalidParam { param: "page", value: "0".to_owned() });
        }
        if params.page_size == 0 || params.page_size > MAX_PAGE_SIZE {
            return Err(CatalogError::InvalidParam { param: "pageSize", value: params.page_size.to_string() });
        }
        let filter = ListFilter::new(params)?;
        let mut matches: Vec<&VideoSummary> = self.live()
            .map(|v| &v.video)
            .filter(|v| filter.matches(params, v))
            .collect();

        let field = params.sort.unwrap_or(SortField::UploadDate);
        let order = if params.sort.is_some() { params.order } else { SortOrder::Desc };
        matches.sort_by(|a, b| {
            let ord = compare(a, b, field);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }.then_with(|| a.id.cmp(&b.id))
        });

        let total = matches.len();
        let data = matches.into_iter()
            .skip((params.page - 1).saturating_mul(params.page_size))
            .take(params.page_size)
            .cloned()
            .collect();
        Ok(VideoPage {
            data,
            total,
            page: params.page,
            page_size: params.page_size,
            total_pages: total.div_ceil(params.page_size),
        })
    }

    pub fn create(&mut self, body: CreateVideo, today: NaiveDate) -> Result<VideoSummary> {
        body.validate()?;
        let id: Arc<str> = format!("vid-{:04}", self.next_id).into();
        self.next_id += 1;
        let mut entry = StoredVideo::new(VideoSummary {
            id: id.clone(),
            title: body.title.trim().into(),
            description: body.description,
            thumbnail_url: None,
            duration: 0,
            upload_date: today.format(DATE_FORMAT).to_string().into(),
            status: body.status,
            is_public: body.is_public,
            categories: unique(body.categories),
            tags: unique(body.tags),
            stats: Some(VideoStats::default()),
        });
        self.strings.dedupe_struct(&mut entry);
        let video = entry.video.clone();
        self.index.insert(id, self.videos.len());
        self.videos.push(entry);
        self.revision += 1;
        debug!("Created video {}", video.id);
        Ok(video)
    }

    pub fn update(&mut self, id: &str, changes: UpdateVideo) -> Result<VideoSummary> {
        changes.validate()?;
        let i = self.live_index(id)?;
        let entry = &mut self.videos[i];
        let video = &mut entry.video;
        if let Some(title) = changes.title {
            video.title = title.trim().into();
        }
        if let Some(description) = changes.description {
            video.description = description;
        }
        if let Some(thumbnail_url) = changes.thumbnail_url {
            video.thumbnail_url = Some(thumbnail_url);
        }
        if let Some(duration) = changes.duration {
            video.duration = duration;
        }
        if let Some(status) = changes.status {
            video.status = status;
        }
        if let Some(is_public) = changes.is_public {
            video.is_public = is_public;
        }
        if let Some(categories) = changes.categories {
            video.categories = unique(categories);
        }
        if let Some(tags) = changes.tags {
            video.tags = unique(tags);
        }
        entry.dedupe(&mut self.strings);
        let video = entry.video.clone();
        self.strings.clean();
        self.revision += 1;
        debug!("Updated video {id}");
        Ok(video)
    }

    /// Soft-deletes a video. Deleting an unknown or already removed video is not an error.
    pub fn delete(&mut self, id: &str) -> DeleteResponse {
        match self.live_index(id) {
            Ok(i) => {
                self.videos[i].flags |= VideoFlags::Removed;
                self.revision += 1;
                debug!("Removed video {id}");
                DeleteResponse { success: true }
            },
            Err(_) => DeleteResponse { success: false },
        }
    }

    pub fn attach_upload(&mut self, id: &str, file: &FileUpload) -> Result<UploadResponse> {
        if file.data.is_empty() {
            return Err(ValidationIssue { field: "file", message: "File is required" }.into());
        }
        let i = self.live_index(id)?;
        let entry = &mut self.videos[i];
        let file_name = base_name(&file.file_name);
        entry.upload = Some(UploadedFile {
            file_name: file_name.into(),
            content_type: file.content_type.clone(),
            size: file.data.len(),
        });
        entry.flags |= VideoFlags::Uploaded;
        entry.video.status = VideoStatus::Processing;
        let response = UploadResponse {
            id: entry.video.id.clone(),
            upload_url: format!("/uploads/{}/{file_name}", entry.video.id).into(),
            success: true,
        };
        entry.dedupe(&mut self.strings);
        self.revision += 1;
        debug!("Attached {} bytes of media to video {id}", file.data.len());
        Ok(response)
    }

    pub fn set_thumbnail(&mut self, id: &str, file: &FileUpload) -> Result<ThumbnailResponse> {
        if file.data.is_empty() {
            return Err(ValidationIssue { field: "file", message: "File is required" }.into());
        }
        if !file.content_type.starts_with("image/") {
            return Err(ValidationIssue { field: "file", message: "Thumbnail must be an image" }.into());
        }
        let i = self.live_index(id)?;
        let entry = &mut self.videos[i];
        let url: Arc<str> = format!("/thumbnails/{}/{}", entry.video.id, base_name(&file.file_name)).into();
        entry.video.thumbnail_url = Some(url.clone());
        entry.flags |= VideoFlags::CustomThumbnail;
        self.revision += 1;
        Ok(ThumbnailResponse { thumbnail_url: url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn video(id: &str, title: &str, date: &str, status: VideoStatus, categories: &[&str]) -> VideoSummary {
        VideoSummary {
            id: id.into(),
            title: title.into(),
            description: "".into(),
            thumbnail_url: None,
            duration: 60,
            upload_date: date.into(),
            status,
            is_public: true,
            categories: categories.iter().map(|&c| c.into()).collect(),
            tags: IndexSet::new(),
            stats: None,
        }
    }

    fn small_catalog() -> VideoCatalog {
        VideoCatalog::new(vec![
            video("vid-0001", "Rust for beginners", "2024-01-10", VideoStatus::Published, &["education"]),
            video("vid-0002", "Cooking pasta", "2024-02-01", VideoStatus::Draft, &["food"]),
            video("vid-0003", "Advanced rust macros", "2024-03-05", VideoStatus::Published, &["education", "tech"]),
            video("vid-0004", "Hiking vlog", "2024-04-20", VideoStatus::Ready, &["travel"]),
        ])
    }

    fn ids(page: &VideoPage) -> Vec<&str> {
        page.data.iter().map(|v| &*v.id).collect()
    }

    #[test]
    fn thirty_published_videos_paginate_into_three_pages() {
        let catalog = VideoCatalog::new(fixtures::published(30, today()));
        let page = catalog.list(&VideoListParams {
            status: Some(VideoStatus::Published),
            ..Default::default()
        }).unwrap();
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.total, 30);
        assert_eq!(page.total_pages, 3);
        assert!(page.data.iter().all(|v| v.status == VideoStatus::Published));
    }

    #[test]
    fn default_order_is_newest_first() {
        let page = small_catalog().list(&VideoListParams::default()).unwrap();
        assert_eq!(ids(&page), ["vid-0004", "vid-0003", "vid-0002", "vid-0001"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let page = small_catalog().list(&VideoListParams {
            search: Some("RUST".into()),
            sort: Some(SortField::Title),
            order: SortOrder::Asc,
            ..Default::default()
        }).unwrap();
        assert_eq!(ids(&page), ["vid-0003", "vid-0001"]);
    }

    #[test]
    fn search_treats_input_literally() {
        let page = small_catalog().list(&VideoListParams {
            search: Some("rust (".into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn filters_combine() {
        let catalog = small_catalog();
        let page = catalog.list(&VideoListParams {
            categories: vec!["education".into(), "travel".into()],
            ..Default::default()
        }).unwrap();
        assert_eq!(ids(&page), ["vid-0004", "vid-0003", "vid-0001"]);

        let page = catalog.list(&VideoListParams {
            categories: vec!["education".into()],
            start_date: Some("2024-02-01T00:00:00.000Z".into()),
            end_date: Some("2024-12-31".into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(ids(&page), ["vid-0003"]);
    }

    #[test]
    fn bad_dates_are_rejected() {
        let err = small_catalog().list(&VideoListParams {
            start_date: Some("yesterday".into()),
            ..Default::default()
        }).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidParam { param: "startDate", .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let page = small_catalog().list(&VideoListParams {
            page: 3,
            page_size: 2,
            ..Default::default()
        }).unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let mut catalog = small_catalog();
        let created = catalog.create(CreateVideo {
            title: "  New upload ".into(),
            description: "".into(),
            categories: vec!["education".into(), "education".into(), " ".into()],
            tags: vec![],
            status: VideoStatus::Draft,
            is_public: false,
        }, today()).unwrap();
        assert_eq!(&*created.id, "vid-0005");
        assert_eq!(&*created.title, "New upload");
        assert_eq!(&*created.upload_date, "2024-06-15");
        assert_eq!(created.categories.len(), 1);
        assert_eq!(catalog.revision(), 1);
        assert_eq!(catalog.get("vid-0005").unwrap().title, created.title);
    }

    #[test]
    fn create_rejects_empty_titles() {
        let mut catalog = small_catalog();
        let err = catalog.create(CreateVideo {
            title: "   ".into(),
            description: "".into(),
            categories: vec![],
            tags: vec![],
            status: VideoStatus::Draft,
            is_public: false,
        }, today()).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ValidationIssue { field: "title", .. })));
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.revision(), 0);
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut catalog = small_catalog();
        let updated = catalog.update("vid-0002", UpdateVideo {
            status: Some(VideoStatus::Published),
            ..Default::default()
        }).unwrap();
        assert_eq!(updated.status, VideoStatus::Published);
        assert_eq!(&*updated.title, "Cooking pasta");
        assert!(matches!(catalog.update("vid-9999", UpdateVideo::default()), Err(CatalogError::NotFound { .. })));
    }

    #[test]
    fn deleted_videos_disappear() {
        let mut catalog = small_catalog();
        assert!(catalog.delete("vid-0003").success);
        assert!(!catalog.delete("vid-0003").success);
        assert!(!catalog.delete("nope").success);
        assert!(matches!(catalog.get("vid-0003"), Err(CatalogError::NotFound { .. })));
        let page = catalog.list(&VideoListParams::default()).unwrap();
        assert_eq!(page.total, 3);
        assert!(!ids(&page).contains(&"vid-0003"));
        assert_eq!(catalog.removed_count(), 1);
    }

    #[test]
    fn uploads_move_videos_to_processing() {
        let mut catalog = small_catalog();
        let response = catalog.attach_upload("vid-0002", &FileUpload {
            file_name: "C:\\videos\\pasta.mp4".into(),
            content_type: "video/mp4".into(),
            data: vec![0; 16],
        }).unwrap();
        assert!(response.success);
        assert_eq!(&*response.upload_url, "/uploads/vid-0002/pasta.mp4");
        let stored = catalog.get_stored("vid-0002").unwrap();
        assert_eq!(stored.video.status, VideoStatus::Processing);
        assert!(stored.flags.contains(VideoFlags::Uploaded));
        assert_eq!(stored.upload.as_ref().unwrap().size, 16);
    }

    #[test]
    fn thumbnails_must_be_images() {
        let mut catalog = small_catalog();
        let mut file = FileUpload {
            file_name: "thumb.txt".into(),
            content_type: "text/plain".into(),
            data: vec![1, 2, 3],
        };
        assert!(matches!(catalog.set_thumbnail("vid-0001", &file), Err(CatalogError::Validation(..))));
        file.file_name = "thumb.png".into();
        file.content_type = "image/png".into();
        let response = catalog.set_thumbnail("vid-0001", &file).unwrap();
        assert_eq!(&*response.thumbnail_url, "/thumbnails/vid-0001/thumb.png");
        assert_eq!(catalog.get("vid-0001").unwrap().thumbnail_url, Some(response.thumbnail_url));
    }

    #[test]
    fn categories_are_interned() {
        let catalog = small_catalog();
        let first = catalog.get("vid-0001").unwrap().categories.get_index(0).unwrap().clone();
        let second = catalog.get("vid-0003").unwrap().categories.get_index(0).unwrap().clone();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
