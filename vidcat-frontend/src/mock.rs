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
//! In-process transport serving requests from a [`VideoCatalog`]

use std::{cell::{Cell, RefCell}, collections::VecDeque, rc::Rc, sync::Arc};

use chrono::{DateTime, NaiveDate};
use futures::{channel::oneshot, future::LocalBoxFuture, FutureExt};
use log::debug;
use serde_json::Value;
use vidcat_api::sync;
use vidcat_catalog::{fixtures, router, CatalogError, VideoCatalog};

use crate::{
    api::{ApiRequest, FileUpload},
    api_client::Transport,
    errors::QueryError,
    platform::Clock,
};

/// Serves [`ApiRequest`]s from a catalog living in the same thread
///
/// Responses are computed when the request is sent. While the transport is held, they are only
/// delivered once [`CatalogTransport::release`] is called.
pub struct CatalogTransport {
    catalog: Rc<RefCell<VideoCatalog>>,
    clock: Rc<dyn Clock>,
    calls: Cell<usize>,
    failures: RefCell<VecDeque<QueryError>>,
    held: RefCell<Option<Vec<oneshot::Sender<()>>>>,
}

impl CatalogTransport {
    pub fn new(catalog: VideoCatalog, clock: Rc<dyn Clock>) -> CatalogTransport {
        CatalogTransport {
            catalog: Rc::new(RefCell::new(catalog)),
            clock,
            calls: Cell::new(0),
            failures: RefCell::new(VecDeque::new()),
            held: RefCell::new(None),
        }
    }

    /// A catalog of `count` generated videos, dated relative to the clock
    pub fn with_fixtures(count: usize, seed: &str, clock: Rc<dyn Clock>) -> CatalogTransport {
        let today = today(&*clock);
        CatalogTransport::new(VideoCatalog::new(fixtures::generate(count, seed, today)), clock)
    }

    pub fn catalog(&self) -> &Rc<RefCell<VideoCatalog>> {
        &self.catalog
    }

    /// Number of requests sent so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Makes the next request fail with `error` instead of reaching the catalog
    pub fn fail_next(&self, error: QueryError) {
        self.failures.borrow_mut().push_back(error);
    }

    /// Holds back responses until [`CatalogTransport::release`] is called
    pub fn hold(&self) {
        self.held.borrow_mut().get_or_insert_with(Vec::new);
    }

    /// Delivers every held response and stops holding
    pub fn release(&self) {
        let senders = self.held.borrow_mut().take();
        for sender in senders.into_iter().flatten() {
            let _ = sender.send(());
        }
    }

    fn dispatch(&self, request: ApiRequest) -> Result<Value, QueryError> {
        let request = to_sync(request)?;
        let today = today(&*self.clock);
        router::handle(&mut self.catalog.borrow_mut(), request, today).map_err(|err| from_catalog_error(&err))
    }
}

impl Transport for CatalogTransport {
    fn send(&self, request: ApiRequest) -> LocalBoxFuture<'static, Result<Value, QueryError>> {
        self.calls.set(self.calls.get() + 1);
        debug!("Mock API request #{}: {} /{}", self.calls.get(), request.method(), request.path_segments().join("/"));
        let failure = self.failures.borrow_mut().pop_front();
        let result = match failure {
            Some(err) => Err(err),
            None => self.dispatch(request),
        };
        let gate = self.held.borrow_mut().as_mut().map(|senders| {
            let (sender, receiver) = oneshot::channel();
            senders.push(sender);
            receiver
        });
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        }.boxed_local()
    }
}

fn today(clock: &dyn Clock) -> NaiveDate {
    DateTime::from_timestamp_millis(clock.now_ms())
        .map(|t| t.date_naive())
        .unwrap_or_default()
}

fn from_catalog_error(err: &CatalogError) -> QueryError {
    QueryError::from_status(err.status_code(), err.to_string().into())
}

fn arc(value: &str) -> Arc<str> {
    Arc::from(value)
}

fn convert_file(file: FileUpload) -> sync::FileUpload {
    sync::FileUpload {
        file_name: arc(&file.file_name),
        content_type: arc(&file.content_type),
        data: file.data,
    }
}

/// Re-encodes a body through JSON, the way it would travel over the network
fn reencode<S: serde::Serialize, D: serde::de::DeserializeOwned>(body: &S) -> Result<D, QueryError> {
    serde_json::to_value(body)
        .and_then(serde_json::from_value)
        .map_err(|err| QueryError::Validation(err.to_string().into()))
}

fn to_sync(request: ApiRequest) -> Result<sync::ApiRequest, QueryError> {
    Ok(match request {
        ApiRequest::ListVideos(params) => sync::ApiRequest::ListVideos(
            sync::VideoListParams::from_query_pairs(params.to_query_pairs())
                .map_err(|err| QueryError::Validation(err.to_string().into()))?,
        ),
        ApiRequest::GetVideo { id } => sync::ApiRequest::GetVideo { id: arc(&id) },
        ApiRequest::CreateVideo(body) => sync::ApiRequest::CreateVideo(reencode(&body)?),
        ApiRequest::UpdateVideo { id, changes } => sync::ApiRequest::UpdateVideo { id: arc(&id), changes: reencode(&changes)? },
        ApiRequest::DeleteVideo { id } => sync::ApiRequest::DeleteVideo { id: arc(&id) },
        ApiRequest::UploadVideo { id, file } => sync::ApiRequest::UploadVideo { id: arc(&id), file: convert_file(file) },
        ApiRequest::UploadThumbnail { id, file } => sync::ApiRequest::UploadThumbnail { id: arc(&id), file: convert_file(file) },
        ApiRequest::AnalyticsSummary => sync::ApiRequest::AnalyticsSummary,
        ApiRequest::AnalyticsViews { period } => sync::ApiRequest::AnalyticsViews { period: reencode(&period)? },
        ApiRequest::TopVideos { limit } => sync::ApiRequest::TopVideos { limit },
        ApiRequest::Status => sync::ApiRequest::Status,
    })
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use crate::{
        api::{CreateVideo, VideoListParams, VideoPage, VideoStatus, VideoSummary, ViewsPeriod, ViewsPoint},
        api_client::ApiClient,
        testing::{VirtualTime, START_MS},
    };

    use super::*;

    fn setup() -> (Rc<CatalogTransport>, ApiClient) {
        let transport = Rc::new(CatalogTransport::with_fixtures(25, "mock", Rc::new(VirtualTime::new(START_MS))));
        (transport.clone(), ApiClient::new(transport))
    }

    #[test]
    fn lists_and_gets_through_the_client() {
        let (transport, client) = setup();
        let page: VideoPage = block_on(client.request(ApiRequest::ListVideos(VideoListParams::default()))).unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        let id = page.data[0].id.clone();
        let video: VideoSummary = block_on(client.request(ApiRequest::GetVideo { id: id.clone() })).unwrap();
        assert_eq!(video.id, id);
        assert_eq!(transport.calls(), 2);

        let err = block_on(client.request::<VideoSummary>(ApiRequest::GetVideo { id: "nope".into() })).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rejected_mutations_become_validation_errors() {
        let (_, client) = setup();
        let body = CreateVideo {
            title: "".into(),
            description: "".into(),
            categories: vec![],
            tags: vec![],
            status: VideoStatus::Draft,
            is_public: false,
        };
        let err = block_on(client.request::<VideoSummary>(ApiRequest::CreateVideo(body))).unwrap_err();
        assert!(matches!(err, QueryError::Validation(..)), "{err}");
    }

    #[test]
    fn dates_follow_the_clock() {
        let (_, client) = setup();
        let points: Vec<ViewsPoint> = block_on(client.request(ApiRequest::AnalyticsViews { period: ViewsPeriod::Week })).unwrap();
        assert_eq!(points.len(), 7);
        assert_eq!(&*points[6].date, "2024-06-15");
    }

    #[test]
    fn injected_failures_and_holding() {
        let (transport, client) = setup();
        transport.fail_next(QueryError::Server { status: 503, message: "down".into() });
        let err = block_on(client.request::<VideoPage>(ApiRequest::ListVideos(VideoListParams::default()))).unwrap_err();
        assert!(err.is_retryable());

        transport.hold();
        let mut pending = client.request::<VideoPage>(ApiRequest::ListVideos(VideoListParams::default()));
        assert!((&mut pending).now_or_never().is_none());
        transport.release();
        assert!(block_on(pending).is_ok());
    }
}
