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
// NOTE: This file is used as a template for vidcat-api::sync and ::unsync modules.
//       The RcStr type will be defined externally with the correct smart pointer variant for the
//       module.

use std::{fmt::Display, str::FromStr};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
pub const MAX_TITLE_LENGTH: usize = 100;
/// Upload endpoints take the raw file as the request body, with its name in this header
pub const FILE_NAME_HEADER: &str = "X-File-Name";

// Catalog entries

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default, strum::Display, strum::EnumString, strum::IntoStaticStr, strum::VariantNames)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoStatus {
    Uploaded,
    Processing,
    Ready,
    Error,
    #[default]
    Draft,
    Published,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoStats {
    pub views: u64,
    pub average_rating: f64,
    pub rating_count: u64,
    /// Total watch time in seconds
    pub total_watch_time: u64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: RcStr,
    pub title: RcStr,
    #[serde(default)]
    pub description: RcStr,
    #[serde(default)]
    pub thumbnail_url: Option<RcStr>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: u32,
    /// ISO-8601 date (`YYYY-MM-DD`)
    pub upload_date: RcStr,
    pub status: VideoStatus,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub categories: IndexSet<RcStr>,
    #[serde(default)]
    pub tags: IndexSet<RcStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<VideoStats>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub data: Vec<VideoSummary>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

// List query parameters

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, strum::Display, strum::EnumString, strum::IntoStaticStr)]
pub enum SortField {
    #[serde(rename = "title")]
    #[strum(serialize = "title")]
    Title,
    #[serde(rename = "uploadDate", alias = "date")]
    #[strum(to_string = "uploadDate", serialize = "date")]
    UploadDate,
    #[serde(rename = "views")]
    #[strum(serialize = "views")]
    Views,
    #[serde(rename = "duration")]
    #[strum(serialize = "duration")]
    Duration,
    #[serde(rename = "rating")]
    #[strum(serialize = "rating")]
    Rating,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default, strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Parameters of `GET /videos`
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct VideoListParams {
    /// 1-based
    pub page: usize,
    pub page_size: usize,
    pub search: Option<RcStr>,
    pub status: Option<VideoStatus>,
    pub categories: Vec<RcStr>,
    pub start_date: Option<RcStr>,
    pub end_date: Option<RcStr>,
    pub sort: Option<SortField>,
    pub order: SortOrder,
}

impl Default for VideoListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            status: None,
            categories: Vec::new(),
            start_date: None,
            end_date: None,
            sort: None,
            order: SortOrder::Desc,
        }
    }
}

/// A query string parameter that could not be parsed
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParamError {
    pub param: &'static str,
    pub value: String,
}

impl Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid value for query parameter '{}': '{}'", self.param, self.value)
    }
}

impl std::error::Error for ParamError {}

fn parse_param<T: FromStr>(param: &'static str, value: &str) -> Result<T, ParamError> {
    value.parse().map_err(|_| ParamError { param, value: value.to_owned() })
}

impl VideoListParams {
    /// Builds the parameters from decoded query string pairs
    ///
    /// Unknown parameters and empty values are ignored. `status=all` means "no status filter".
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "page" => params.page = parse_param("page", value)?,
                "pageSize" => params.page_size = parse_param("pageSize", value)?,
                "search" => params.search = Some(value.into()),
                "status" if value == "all" => params.status = None,
                "status" => params.status = Some(parse_param("status", value)?),
                "categories[]" | "categories" => params.categories.push(value.into()),
                "startDate" => params.start_date = Some(value.into()),
                "endDate" => params.end_date = Some(value.into()),
                "sort" => params.sort = Some(parse_param("sort", value)?),
                "order" => params.order = parse_param("order", value)?,
                _ => {},
            }
        }
        if params.page == 0 {
            return Err(ParamError { param: "page", value: "0".to_owned() });
        }
        if params.page_size == 0 || params.page_size > MAX_PAGE_SIZE {
            return Err(ParamError { param: "pageSize", value: params.page_size.to_string() });
        }
        Ok(params)
    }

    /// Encodes the parameters as query string pairs, in a stable order
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(ref search) = self.search {
            pairs.push(("search", search.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        for category in &self.categories {
            pairs.push(("categories[]", category.to_string()));
        }
        if let Some(ref date) = self.start_date {
            pairs.push(("startDate", date.to_string()));
        }
        if let Some(ref date) = self.end_date {
            pairs.push(("endDate", date.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.to_string()));
            pairs.push(("order", self.order.to_string()));
        }
        pairs
    }
}

// Mutations

/// A problem with a mutation payload, detected before it reaches the catalog
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub message: &'static str,
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn validate_title(title: &str) -> Result<(), ValidationIssue> {
    if title.trim().is_empty() {
        return Err(ValidationIssue { field: "title", message: "Title is required" });
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationIssue { field: "title", message: "Title must be at most 100 characters" });
    }
    Ok(())
}

/// Body of `POST /videos`
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideo {
    pub title: RcStr,
    #[serde(default)]
    pub description: RcStr,
    #[serde(default)]
    pub categories: Vec<RcStr>,
    #[serde(default)]
    pub tags: Vec<RcStr>,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub is_public: bool,
}

impl CreateVideo {
    pub fn validate(&self) -> Result<(), ValidationIssue> {
        validate_title(&self.title)
    }
}

/// Body of `PUT /videos/:id` - absent fields are left unchanged
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<RcStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RcStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<RcStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<RcStr>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<RcStr>>,
}

impl UpdateVideo {
    pub fn validate(&self) -> Result<(), ValidationIssue> {
        match self.title {
            Some(ref title) => validate_title(title),
            None => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct UploadResponse {
    pub id: RcStr,
    pub upload_url: RcStr,
    pub success: bool,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResponse {
    pub thumbnail_url: RcStr,
}

/// A file sent to one of the upload endpoints
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileUpload {
    pub file_name: RcStr,
    pub content_type: RcStr,
    pub data: Vec<u8>,
}

// Analytics

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_videos: u64,
    pub total_views: u64,
    /// Seconds
    pub total_watch_time: u64,
    pub average_rating: f64,
    // period-over-period change, in percent
    pub videos_change: f64,
    pub views_change: f64,
    pub watch_time_change: f64,
    pub rating_change: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug, Default, strum::Display, strum::EnumString, strum::IntoStaticStr)]
pub enum ViewsPeriod {
    #[default]
    #[serde(rename = "7d")]
    #[strum(serialize = "7d")]
    Week,
    #[serde(rename = "30d")]
    #[strum(serialize = "30d")]
    Month,
    #[serde(rename = "90d")]
    #[strum(serialize = "90d")]
    Quarter,
    #[serde(rename = "1y")]
    #[strum(serialize = "1y")]
    Year,
}

impl ViewsPeriod {
    pub fn days(self) -> u32 {
        match self {
            ViewsPeriod::Week => 7,
            ViewsPeriod::Month => 30,
            ViewsPeriod::Quarter => 90,
            ViewsPeriod::Year => 365,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ViewsPoint {
    /// ISO-8601 date (`YYYY-MM-DD`)
    pub date: RcStr,
    pub views: u64,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct TopVideo {
    pub id: RcStr,
    pub title: RcStr,
    pub thumbnail_url: Option<RcStr>,
    pub views: u64,
    /// Percentage of viewers who rated the video
    pub engagement: f64,
}

// Server info

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default, Debug)]
#[serde(default)]
pub struct StatusResponse {
    // catalog stats
    pub videos: Option<usize>,
    pub removed_videos: Option<usize>,
    pub revision: Option<u64>,
    // general server build data
    pub server_version: Option<RcStr>,
    pub server_git_hash: Option<RcStr>,
    pub server_git_dirty: Option<bool>,
    /// RFC 3339
    pub server_commit_timestamp: Option<RcStr>,
    pub server_build_timestamp: Option<i64>,
    pub server_startup_timestamp: Option<i64>,
}

// Typed requests

#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Every endpoint of the catalog API
#[derive(Clone, PartialEq, Debug)]
pub enum ApiRequest {
    ListVideos(VideoListParams),
    GetVideo { id: RcStr },
    CreateVideo(CreateVideo),
    UpdateVideo { id: RcStr, changes: UpdateVideo },
    DeleteVideo { id: RcStr },
    UploadVideo { id: RcStr, file: FileUpload },
    UploadThumbnail { id: RcStr, file: FileUpload },
    AnalyticsSummary,
    AnalyticsViews { period: ViewsPeriod },
    TopVideos { limit: usize },
    Status,
}

impl ApiRequest {
    pub fn method(&self) -> Method {
        match self {
            ApiRequest::ListVideos(..)
            | ApiRequest::GetVideo { .. }
            | ApiRequest::AnalyticsSummary
            | ApiRequest::AnalyticsViews { .. }
            | ApiRequest::TopVideos { .. }
            | ApiRequest::Status => Method::Get,
            ApiRequest::CreateVideo(..)
            | ApiRequest::UploadVideo { .. }
            | ApiRequest::UploadThumbnail { .. } => Method::Post,
            ApiRequest::UpdateVideo { .. } => Method::Put,
            ApiRequest::DeleteVideo { .. } => Method::Delete,
        }
    }

    /// Path segments relative to the API base URL
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            ApiRequest::ListVideos(..) | ApiRequest::CreateVideo(..) => vec!["videos"],
            ApiRequest::GetVideo { id }
            | ApiRequest::UpdateVideo { id, .. }
            | ApiRequest::DeleteVideo { id } => vec!["videos", &**id],
            ApiRequest::UploadVideo { id, .. } => vec!["videos", &**id, "upload"],
            ApiRequest::UploadThumbnail { id, .. } => vec!["videos", &**id, "thumbnail"],
            ApiRequest::AnalyticsSummary => vec!["analytics", "summary"],
            ApiRequest::AnalyticsViews { .. } => vec!["analytics", "views"],
            ApiRequest::TopVideos { .. } => vec!["analytics", "top-videos"],
            ApiRequest::Status => vec!["status"],
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            ApiRequest::ListVideos(params) => params.to_query_pairs(),
            ApiRequest::AnalyticsViews { period } => vec![("period", period.to_string())],
            ApiRequest::TopVideos { limit } => vec![("limit", limit.to_string())],
            _ => Vec::new(),
        }
    }
}

// Browser-local state

/// One element of the `videoProgress` local storage array
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub video_id: RcStr,
    /// Seconds
    pub progress: f64,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
}

/// One element of the `watchlist` local storage array
///
/// Plain ids are what gets written, the object form is accepted for forward compatibility.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(untagged)]
pub enum WatchlistItem {
    Id(RcStr),
    #[serde(rename_all = "camelCase")]
    Entry {
        video_id: RcStr,
        #[serde(default)]
        date_added: Option<i64>,
    },
}

impl WatchlistItem {
    pub fn video_id(&self) -> &RcStr {
        match self {
            WatchlistItem::Id(id) | WatchlistItem::Entry { video_id: id, .. } => id,
        }
    }
}
