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

use std::{collections::BTreeMap, fmt::Display, rc::Rc};

use crate::api::{VideoListParams, ViewsPeriod};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Resource {
    Videos,
    Video,
    AnalyticsSummary,
    AnalyticsViews,
    TopVideos,
}

/// Identity of a cached server resource
///
/// Derived deterministically from request parameters, so the same request always maps to the same
/// cache entry regardless of the order its filters were given in.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QueryKey {
    pub resource: Resource,
    pub id: Option<Rc<str>>,
    /// `(page, page_size)`
    pub pagination: Option<(usize, usize)>,
    pub filters: BTreeMap<&'static str, Rc<str>>,
    /// `(field, order)`
    pub sort: Option<(&'static str, &'static str)>,
}

impl QueryKey {
    fn new(resource: Resource) -> QueryKey {
        QueryKey {
            resource,
            id: None,
            pagination: None,
            filters: BTreeMap::new(),
            sort: None,
        }
    }

    pub fn videos(params: &VideoListParams) -> QueryKey {
        let mut key = QueryKey::new(Resource::Videos);
        key.pagination = Some((params.page, params.page_size));
        if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            key.filters.insert("search", search.into());
        }
        if let Some(status) = params.status {
            key.filters.insert("status", Rc::from(<&'static str>::from(status)));
        }
        let mut categories: Vec<&str> = params.categories.iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort_unstable();
        categories.dedup();
        if !categories.is_empty() {
            key.filters.insert("categories", categories.join(",").into());
        }
        if let Some(ref date) = params.start_date {
            key.filters.insert("startDate", date.clone());
        }
        if let Some(ref date) = params.end_date {
            key.filters.insert("endDate", date.clone());
        }
        if let Some(sort) = params.sort {
            key.sort = Some((sort.into(), params.order.into()));
        }
        key
    }

    pub fn video(id: Rc<str>) -> QueryKey {
        QueryKey {
            id: Some(id),
            ..QueryKey::new(Resource::Video)
        }
    }

    pub fn analytics_summary() -> QueryKey {
        QueryKey::new(Resource::AnalyticsSummary)
    }

    pub fn analytics_views(period: ViewsPeriod) -> QueryKey {
        let mut key = QueryKey::new(Resource::AnalyticsViews);
        key.filters.insert("period", Rc::from(<&'static str>::from(period)));
        key
    }

    pub fn top_videos(limit: usize) -> QueryKey {
        let mut key = QueryKey::new(Resource::TopVideos);
        key.filters.insert("limit", limit.to_string().into());
        key
    }

    pub fn is_video_list(&self) -> bool {
        self.resource == Resource::Videos
    }

    pub fn is_video(&self, id: &str) -> bool {
        self.resource == Resource::Video && self.id.as_deref() == Some(id)
    }

    /// Analytics are computed from the whole catalog
    pub fn is_analytics(&self) -> bool {
        matches!(self.resource, Resource::AnalyticsSummary | Resource::AnalyticsViews | Resource::TopVideos)
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", <&'static str>::from(self.resource))?;
        if let Some(ref id) = self.id {
            write!(f, "/{id}")?;
        }
        if let Some((page, size)) = self.pagination {
            write!(f, " page={page} size={size}")?;
        }
        for (name, value) in &self.filters {
            write!(f, " {name}={value}")?;
        }
        if let Some((field, order)) = self.sort {
            write!(f, " sort={field}:{order}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{SortField, SortOrder, VideoStatus};

    use super::*;

    #[test]
    fn filter_order_does_not_matter() {
        let a = VideoListParams {
            categories: vec!["music".into(), "travel".into(), "music".into()],
            status: Some(VideoStatus::Published),
            search: Some("  cats ".into()),
            ..VideoListParams::default()
        };
        let b = VideoListParams {
            categories: vec!["travel".into(), "music".into()],
            status: Some(VideoStatus::Published),
            search: Some("cats".into()),
            ..VideoListParams::default()
        };
        assert_eq!(QueryKey::videos(&a), QueryKey::videos(&b));
        assert_eq!(QueryKey::videos(&a).filters["categories"].as_ref(), "music,travel");
    }

    #[test]
    fn distinct_requests_get_distinct_keys() {
        let first = VideoListParams::default();
        let second = VideoListParams { page: 2, ..VideoListParams::default() };
        let sorted = VideoListParams { sort: Some(SortField::Views), order: SortOrder::Asc, ..VideoListParams::default() };
        assert_ne!(QueryKey::videos(&first), QueryKey::videos(&second));
        assert_ne!(QueryKey::videos(&first), QueryKey::videos(&sorted));
        let empty_search = VideoListParams { search: Some("   ".into()), ..VideoListParams::default() };
        assert_eq!(QueryKey::videos(&first), QueryKey::videos(&empty_search));
        assert_ne!(QueryKey::video("a".into()), QueryKey::video("b".into()));
    }

    #[test]
    fn predicates_and_display() {
        let key = QueryKey::video("vid-0001".into());
        assert!(key.is_video("vid-0001"));
        assert!(!key.is_video("vid-0002"));
        assert!(!key.is_video_list());
        assert_eq!(key.to_string(), "video/vid-0001");
        let list = QueryKey::videos(&VideoListParams { sort: Some(SortField::UploadDate), ..VideoListParams::default() });
        assert_eq!(list.to_string(), "videos page=1 size=10 sort=uploadDate:desc");
        assert!(QueryKey::top_videos(5).is_analytics());
    }
}
