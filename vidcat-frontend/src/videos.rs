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

use std::{future::Future, rc::Rc};

use log::debug;

use crate::{
    api::{
        AnalyticsSummary, ApiRequest, CreateVideo, DeleteResponse, FileUpload, ThumbnailResponse, TopVideo,
        UpdateVideo, UploadResponse, ValidationIssue, VideoListParams, VideoPage, VideoSummary, ViewsPeriod, ViewsPoint,
    },
    api_client::ApiClient,
    errors::QueryError,
    query_cache::{QueryCache, QuerySnapshot},
    query_key::QueryKey,
};

fn rejected(issue: ValidationIssue) -> QueryError {
    QueryError::Validation(issue.to_string().into())
}

/// Upload lifecycle events
///
/// Neither transport exposes bytes-sent updates (reqwest has no upload progress on wasm32), so the
/// request is reported once when it starts and once when it settles.
#[derive(Clone, Debug)]
pub enum UploadProgress {
    Started { bytes: usize },
    Completed(UploadResponse),
    Failed(QueryError),
}

/// Typed catalog reads through the query cache, and mutations that keep it coherent
#[derive(Clone)]
pub struct VideoService {
    cache: QueryCache,
    client: ApiClient,
}

impl VideoService {
    pub fn new(cache: QueryCache, client: ApiClient) -> VideoService {
        VideoService { cache, client }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn fetch<T>(&self, key: QueryKey, request: ApiRequest) -> impl Future<Output = QuerySnapshot<T>> + 'static
    where T: serde::de::DeserializeOwned + 'static
    {
        let client = self.client.clone();
        self.cache.fetch(key, move || client.request(request.clone()))
    }

    fn query<T>(&self, key: QueryKey, request: ApiRequest) -> QuerySnapshot<T>
    where T: serde::de::DeserializeOwned + 'static
    {
        let client = self.client.clone();
        self.cache.query(key, move || client.request(request.clone()))
    }

    pub fn videos(&self, params: VideoListParams) -> impl Future<Output = QuerySnapshot<VideoPage>> + 'static {
        self.fetch(QueryKey::videos(&params), ApiRequest::ListVideos(params))
    }

    pub fn query_videos(&self, params: VideoListParams) -> QuerySnapshot<VideoPage> {
        self.query(QueryKey::videos(&params), ApiRequest::ListVideos(params))
    }

    pub fn video(&self, id: Rc<str>) -> impl Future<Output = QuerySnapshot<VideoSummary>> + 'static {
        self.fetch(QueryKey::video(id.clone()), ApiRequest::GetVideo { id })
    }

    pub fn query_video(&self, id: Rc<str>) -> QuerySnapshot<VideoSummary> {
        self.query(QueryKey::video(id.clone()), ApiRequest::GetVideo { id })
    }

    pub fn analytics_summary(&self) -> impl Future<Output = QuerySnapshot<AnalyticsSummary>> + 'static {
        self.fetch(QueryKey::analytics_summary(), ApiRequest::AnalyticsSummary)
    }

    pub fn analytics_views(&self, period: ViewsPeriod) -> impl Future<Output = QuerySnapshot<Vec<ViewsPoint>>> + 'static {
        self.fetch(QueryKey::analytics_views(period), ApiRequest::AnalyticsViews { period })
    }

    pub fn top_videos(&self, limit: usize) -> impl Future<Output = QuerySnapshot<Vec<TopVideo>>> + 'static {
        self.fetch(QueryKey::top_videos(limit), ApiRequest::TopVideos { limit })
    }

    /// Invalidates everything a change to `id` can affect
    fn invalidate_video(&self, id: Option<&str>) {
        let count = self.cache.invalidate(|key| {
            key.is_video_list() || key.is_analytics() || id.is_some_and(|id| key.is_video(id))
        });
        debug!("Mutation of {} invalidated {count} cache entries", id.unwrap_or("a new video"));
    }

    pub fn create_video(&self, body: CreateVideo) -> impl Future<Output = Result<VideoSummary, QueryError>> + 'static {
        let this = self.clone();
        async move {
            body.validate().map_err(rejected)?;
            let created: VideoSummary = this.client.request(ApiRequest::CreateVideo(body)).await?;
            this.invalidate_video(None);
            Ok(created)
        }
    }

    pub fn update_video(&self, id: Rc<str>, changes: UpdateVideo) -> impl Future<Output = Result<VideoSummary, QueryError>> + 'static {
        let this = self.clone();
        async move {
            changes.validate().map_err(rejected)?;
            let updated: VideoSummary = this.client.request(ApiRequest::UpdateVideo { id: id.clone(), changes }).await?;
            this.invalidate_video(Some(&*id));
            Ok(updated)
        }
    }

    /// Returns whether the video existed
    pub fn delete_video(&self, id: Rc<str>) -> impl Future<Output = Result<bool, QueryError>> + 'static {
        let this = self.clone();
        async move {
            let response: DeleteResponse = this.client.request(ApiRequest::DeleteVideo { id: id.clone() }).await?;
            if response.success {
                this.invalidate_video(Some(&*id));
            }
            Ok(response.success)
        }
    }

    /// Uploads the video file, reporting progress through `on_progress`
    pub fn upload_video(
        &self,
        id: Rc<str>,
        file: FileUpload,
        on_progress: impl Fn(UploadProgress) + 'static,
    ) -> impl Future<Output = Result<UploadResponse, QueryError>> + 'static {
        let this = self.clone();
        async move {
            if file.data.is_empty() {
                let err = QueryError::Validation("File is required".into());
                on_progress(UploadProgress::Failed(err.clone()));
                return Err(err);
            }
            on_progress(UploadProgress::Started { bytes: file.data.len() });
            match this.client.request::<UploadResponse>(ApiRequest::UploadVideo { id: id.clone(), file }).await {
                Ok(response) => {
                    this.invalidate_video(Some(&*id));
                    on_progress(UploadProgress::Completed(response.clone()));
                    Ok(response)
                },
                Err(err) => {
                    on_progress(UploadProgress::Failed(err.clone()));
                    Err(err)
                },
            }
        }
    }

    pub fn upload_thumbnail(&self, id: Rc<str>, file: FileUpload) -> impl Future<Output = Result<ThumbnailResponse, QueryError>> + 'static {
        let this = self.clone();
        async move {
            if !file.content_type.starts_with("image/") {
                return Err(QueryError::Validation("Thumbnails must be images".into()));
            }
            let response: ThumbnailResponse = this.client.request(ApiRequest::UploadThumbnail { id: id.clone(), file }).await?;
            this.invalidate_video(Some(&*id));
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use chrono::NaiveDate;
    use vidcat_catalog::{fixtures, VideoCatalog};

    use crate::{
        api::VideoStatus,
        mock::CatalogTransport,
        query_cache::{CacheSettings, QueryStatus},
        testing::TestRuntime,
    };

    use super::*;

    fn setup() -> (TestRuntime, Rc<CatalogTransport>, VideoService) {
        let rt = TestRuntime::new();
        let runtime = rt.runtime();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let transport = Rc::new(CatalogTransport::new(
            VideoCatalog::new(fixtures::published(30, today)),
            runtime.clock.clone(),
        ));
        let service = VideoService::new(
            QueryCache::new(CacheSettings::default(), runtime),
            ApiClient::new(transport.clone()),
        );
        (rt, transport, service)
    }

    fn draft(title: &str) -> CreateVideo {
        CreateVideo {
            title: title.into(),
            description: "".into(),
            categories: vec!["music".into()],
            tags: vec![],
            status: VideoStatus::Draft,
            is_public: false,
        }
    }

    fn result<T>(slot: &Rc<RefCell<Option<T>>>) -> T {
        slot.borrow_mut().take().expect("the future should have completed")
    }

    #[test]
    fn deleted_videos_disappear() {
        let (mut rt, _, service) = setup();
        let id: Rc<str> = "vid-0004".into();
        let _sub = service.cache().subscribe(QueryKey::video(id.clone()), || {});
        let before = result(&rt.spawn(service.video(id.clone())));
        assert_eq!(before.status, QueryStatus::Success);

        assert!(result(&rt.spawn(service.delete_video(id.clone()))).unwrap());
        rt.run();
        let after = result(&rt.spawn(service.video(id.clone())));
        assert!(after.data.is_none());
        assert!(after.into_result().unwrap_err().is_not_found());
        assert!(!result(&rt.spawn(service.delete_video(id))).unwrap());
    }

    #[test]
    fn mutations_invalidate_lists() {
        let (mut rt, transport, service) = setup();
        let first = result(&rt.spawn(service.videos(VideoListParams::default()))).into_result().unwrap();
        assert_eq!(first.total, 30);
        let created = result(&rt.spawn(service.create_video(draft("Fresh upload")))).unwrap();
        assert_eq!(&*created.id, "vid-0031");
        let second = result(&rt.spawn(service.videos(VideoListParams::default()))).into_result().unwrap();
        assert_eq!(second.total, 31);
        assert_eq!(transport.calls(), 3);

        let changes = UpdateVideo { title: Some("Renamed".into()), ..UpdateVideo::default() };
        let updated = result(&rt.spawn(service.update_video(created.id.clone(), changes))).unwrap();
        assert_eq!(&*updated.title, "Renamed");
    }

    #[test]
    fn watched_lists_are_refetched_once_after_a_mutation() {
        let (mut rt, transport, service) = setup();
        let key = QueryKey::videos(&VideoListParams::default());
        let _ = result(&rt.spawn(service.videos(VideoListParams::default())));
        let notified = Rc::new(Cell::new(0));
        let notified2 = notified.clone();
        let _sub = service.cache().subscribe(key.clone(), move || notified2.set(notified2.get() + 1));
        let before = transport.calls();

        result(&rt.spawn(service.create_video(draft("Fresh upload")))).unwrap();
        rt.run();
        // the create request plus a single refetch of the watched list
        assert_eq!(transport.calls(), before + 2);
        assert_eq!(notified.get(), 1);
        let page = service.cache().peek::<VideoPage>(&key).unwrap();
        assert_eq!(page.status, QueryStatus::Success);
        assert_eq!(page.data.unwrap().total, 31);
    }

    #[test]
    fn failed_mutations_leave_the_cache_alone() {
        let (mut rt, transport, service) = setup();
        let _ = result(&rt.spawn(service.videos(VideoListParams::default())));
        let err = result(&rt.spawn(service.create_video(draft("  ")))).unwrap_err();
        assert!(matches!(err, QueryError::Validation(..)));
        let err = result(&rt.spawn(service.update_video("missing".into(), UpdateVideo::default()))).unwrap_err();
        assert!(err.is_not_found());
        // rejected locally, then 404
        assert_eq!(transport.calls(), 2);
        assert_eq!(service.cache().stats().cached, 1);
    }

    #[test]
    fn uploads_report_progress() {
        let (mut rt, _, service) = setup();
        let events = Rc::new(RefCell::new(Vec::new()));
        let events2 = events.clone();
        let file = FileUpload { file_name: "clip.mp4".into(), content_type: "video/mp4".into(), data: vec![0; 2048] };
        let response = result(&rt.spawn(service.upload_video("vid-0002".into(), file, move |e| events2.borrow_mut().push(e)))).unwrap();
        assert!(response.success);
        assert_eq!(&*response.upload_url, "/uploads/vid-0002/clip.mp4");
        assert!(matches!(events.borrow()[..], [UploadProgress::Started { bytes: 2048 }, UploadProgress::Completed(ref r)] if *r == response));

        let video = result(&rt.spawn(service.video("vid-0002".into()))).into_result().unwrap();
        assert_eq!(video.status, VideoStatus::Processing);

        let empty = FileUpload { file_name: "clip.mp4".into(), content_type: "video/mp4".into(), data: vec![] };
        let err = result(&rt.spawn(service.upload_video("vid-0002".into(), empty, |_| {}))).unwrap_err();
        assert!(matches!(err, QueryError::Validation(..)));

        let text = FileUpload { file_name: "notes.txt".into(), content_type: "text/plain".into(), data: vec![1] };
        assert!(result(&rt.spawn(service.upload_thumbnail("vid-0002".into(), text))).is_err());
    }

    #[test]
    fn analytics_reads() {
        let (mut rt, _, service) = setup();
        let summary = result(&rt.spawn(service.analytics_summary())).into_result().unwrap();
        assert_eq!(summary.total_videos, 30);
        let views = result(&rt.spawn(service.analytics_views(ViewsPeriod::Month))).into_result().unwrap();
        assert_eq!(views.len(), 30);
        let top = result(&rt.spawn(service.top_videos(3))).into_result().unwrap();
        assert_eq!(top.len(), 3);
        assert!(top[0].views >= top[1].views);
    }
}
