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

use std::rc::Rc;

use cloneable_errors::{anyhow, bail, ErrContext, ErrorContext, ResContext, SerializableError};
use futures::{future::LocalBoxFuture, FutureExt};
use reqwest::{header::{ACCEPT, CONTENT_TYPE}, Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    api::{ApiRequest, Method, FILE_NAME_HEADER},
    constants::REQWEST_CLIENT,
    errors::QueryError,
    utils::ReqwestUrlExt,
};

/// Carries typed requests to the catalog and hands back the JSON response body
pub trait Transport {
    fn send(&self, request: ApiRequest) -> LocalBoxFuture<'static, Result<Value, QueryError>>;
}

/// Resolves the configured API base URL against the page origin
///
/// Absolute URLs are used as-is, anything else is treated as a path on the origin.
pub fn resolve_base_url(base: &str, origin: Option<&Url>) -> Result<Url, ErrorContext> {
    let url = match (Url::parse(base), origin) {
        (Ok(url), _) => url,
        (Err(..), Some(origin)) => origin.join(base).with_context(|| format!("Failed to resolve {base} against {origin}"))?,
        (Err(err), None) => return Err(err.context(format!("Invalid API base URL ({base}), relative URLs require a page origin"))),
    };
    if url.cannot_be_a_base() {
        bail!("The API base URL ({url}) cannot be a base",);
    }
    Ok(url)
}

trait ReqwestResponseExt: Sized {
    #[allow(async_fn_in_trait)]  // this is for local use
    async fn check_status(self) -> Result<Self, QueryError>;
}

impl ReqwestResponseExt for reqwest::Response {
    async fn check_status(self) -> Result<Self, QueryError> {
        let status = self.status();
        if status.is_success() {
            return Ok(self);
        }
        let message: Rc<str> = match self.text().await {
            Err(..) => status.to_string().into(),
            Ok(body) => match serde_json::from_str::<SerializableError>(&body) {
                Ok(err) => err.to_string().into(),
                Err(..) if body.trim().is_empty() => status.to_string().into(),
                Err(..) => body.into(),
            },
        };
        Err(QueryError::from_status(status.as_u16(), message))
    }
}

/// Talks to the catalog server over HTTP
pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> HttpTransport {
        HttpTransport { base_url, client: REQWEST_CLIENT.clone() }
    }

    pub fn request_url(&self, request: &ApiRequest) -> Result<Url, QueryError> {
        let mut url = self.base_url
            .join_segments(request.path_segments())
            .ok_or_else(|| QueryError::Network(anyhow!("The API base URL ({}) cannot be a base", self.base_url)))?;
        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> LocalBoxFuture<'static, Result<Value, QueryError>> {
        let url = match self.request_url(&request) {
            Ok(url) => url,
            Err(err) => return futures::future::ready(Err(err)).boxed_local(),
        };
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let builder = self.client
            .request(method, url)
            .header(ACCEPT, "application/json");
        let builder = match request {
            ApiRequest::CreateVideo(body) => builder.json(&body),
            ApiRequest::UpdateVideo { changes, .. } => builder.json(&changes),
            ApiRequest::UploadVideo { file, .. } | ApiRequest::UploadThumbnail { file, .. } => builder
                .header(CONTENT_TYPE, &*file.content_type)
                .header(FILE_NAME_HEADER, &*file.file_name)
                .body(file.data),
            _ => builder,
        };
        async move {
            let response = builder
                .send().await.context("Failed to send the request").map_err(QueryError::Network)?
                .check_status().await?;
            let body = response.bytes().await.context("Failed to read the response body").map_err(QueryError::Network)?;
            serde_json::from_slice(&body).context("Failed to deserialize response").map_err(QueryError::Decode)
        }.boxed_local()
    }
}

/// Typed front of a [`Transport`]
#[derive(Clone)]
pub struct ApiClient {
    transport: Rc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Rc<dyn Transport>) -> ApiClient {
        ApiClient { transport }
    }

    pub fn http(base_url: Url) -> ApiClient {
        ApiClient::new(Rc::new(HttpTransport::new(base_url)))
    }

    pub fn request<R: DeserializeOwned + 'static>(&self, request: ApiRequest) -> LocalBoxFuture<'static, Result<R, QueryError>> {
        let response = self.transport.send(request);
        async move {
            let value = response.await?;
            serde_json::from_value(value).context("Failed to deserialize response").map_err(QueryError::Decode)
        }.boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use serde_json::json;

    use crate::api::{VideoListParams, VideoSummary};

    use super::*;

    struct Canned(Value);

    impl Transport for Canned {
        fn send(&self, _request: ApiRequest) -> LocalBoxFuture<'static, Result<Value, QueryError>> {
            futures::future::ready(Ok(self.0.clone())).boxed_local()
        }
    }

    #[test]
    fn base_url_resolution() {
        let origin = Url::parse("https://videos.example.com/library/index.html").unwrap();
        assert_eq!(resolve_base_url("/api", Some(&origin)).unwrap().as_str(), "https://videos.example.com/api");
        assert_eq!(resolve_base_url("http://localhost:9393/api/", None).unwrap().as_str(), "http://localhost:9393/api/");
        assert!(resolve_base_url("/api", None).is_err());
        assert!(resolve_base_url("mailto:someone@example.com", None).is_err());
    }

    #[test]
    fn request_urls_carry_path_and_query() {
        let transport = HttpTransport::new(Url::parse("http://localhost:9393/api/").unwrap());
        let url = transport.request_url(&ApiRequest::ListVideos(VideoListParams {
            categories: vec!["music".into(), "live shows".into()],
            ..VideoListParams::default()
        })).unwrap();
        assert_eq!(url.path(), "/api/videos");
        assert_eq!(url.query(), Some("page=1&pageSize=10&categories%5B%5D=music&categories%5B%5D=live+shows"));
        let url = transport.request_url(&ApiRequest::GetVideo { id: "vid-0007".into() }).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9393/api/videos/vid-0007");
    }

    #[test]
    fn responses_are_decoded() {
        let client = ApiClient::new(Rc::new(Canned(json!({
            "id": "v1", "title": "Hello", "uploadDate": "2024-01-01", "status": "draft"
        }))));
        let video: VideoSummary = block_on(client.request(ApiRequest::GetVideo { id: "v1".into() })).unwrap();
        assert_eq!(&*video.title, "Hello");
        assert!(video.stats.is_none());

        let client = ApiClient::new(Rc::new(Canned(json!({"unexpected": true}))));
        let err = block_on(client.request::<VideoSummary>(ApiRequest::GetVideo { id: "v1".into() })).unwrap_err();
        assert!(matches!(err, QueryError::Decode(..)));
        assert!(!err.is_retryable());
    }
}
