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

#![allow(clippy::needless_pass_by_value)]
use actix_web::{delete, get, http::{header::CONTENT_TYPE, StatusCode}, post, put, web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use cloneable_errors::anyhow;
use serde::Deserialize;
use serde_json::Value;
use vidcat_api::sync::*;
use vidcat_catalog::router;

use crate::{built_info, constants::*, errors::{self, Error}, state::*};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_videos)
       .service(get_video)
       .service(create_video)
       .service(update_video)
       .service(delete_video)
       .service(upload_video)
       .service(upload_thumbnail)
       .service(get_analytics_summary)
       .service(get_analytics_views)
       .service(get_top_videos)
       .service(get_status);
}

type JsonResult = errors::Result<web::Json<Value>>;

fn serve(catalog: &CatalogLock, request: ApiRequest) -> errors::Result<Value> {
    let mut catalog = catalog.write().map_err(|_| CATALOG_WRITE_ERR.clone())?;
    Ok(router::handle(&mut catalog, request, Utc::now().date_naive())?)
}

fn bad_request<T: std::fmt::Display>(err: T) -> Error {
    Error::from(anyhow!("{err}",)).set_status(StatusCode::BAD_REQUEST)
}

fn file_upload(req: &HttpRequest, body: web::Bytes) -> FileUpload {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    FileUpload {
        file_name: header(FILE_NAME_HEADER).unwrap_or("upload").into(),
        content_type: header(CONTENT_TYPE.as_str()).unwrap_or("application/octet-stream").into(),
        data: body.to_vec(),
    }
}

#[get("/videos")]
async fn list_videos(catalog: CatalogLock, query: web::Query<Vec<(String, String)>>) -> JsonResult {
    let params = VideoListParams::from_query_pairs(query.into_inner()).map_err(bad_request)?;
    Ok(web::Json(serve(&catalog, ApiRequest::ListVideos(params))?))
}

#[get("/videos/{id}")]
async fn get_video(catalog: CatalogLock, path: web::Path<String>) -> JsonResult {
    Ok(web::Json(serve(&catalog, ApiRequest::GetVideo { id: path.into_inner().into() })?))
}

#[post("/videos")]
async fn create_video(catalog: CatalogLock, body: web::Json<CreateVideo>) -> errors::Result<HttpResponse> {
    let created = serve(&catalog, ApiRequest::CreateVideo(body.into_inner()))?;
    Ok(HttpResponse::Created().json(created))
}

#[put("/videos/{id}")]
async fn update_video(catalog: CatalogLock, path: web::Path<String>, body: web::Json<UpdateVideo>) -> JsonResult {
    Ok(web::Json(serve(&catalog, ApiRequest::UpdateVideo { id: path.into_inner().into(), changes: body.into_inner() })?))
}

#[delete("/videos/{id}")]
async fn delete_video(catalog: CatalogLock, path: web::Path<String>) -> JsonResult {
    Ok(web::Json(serve(&catalog, ApiRequest::DeleteVideo { id: path.into_inner().into() })?))
}

#[post("/videos/{id}/upload")]
async fn upload_video(catalog: CatalogLock, path: web::Path<String>, req: HttpRequest, body: web::Bytes) -> JsonResult {
    let file = file_upload(&req, body);
    Ok(web::Json(serve(&catalog, ApiRequest::UploadVideo { id: path.into_inner().into(), file })?))
}

#[post("/videos/{id}/thumbnail")]
async fn upload_thumbnail(catalog: CatalogLock, path: web::Path<String>, req: HttpRequest, body: web::Bytes) -> JsonResult {
    let file = file_upload(&req, body);
    Ok(web::Json(serve(&catalog, ApiRequest::UploadThumbnail { id: path.into_inner().into(), file })?))
}

#[get("/analytics/summary")]
async fn get_analytics_summary(catalog: CatalogLock) -> JsonResult {
    Ok(web::Json(serve(&catalog, ApiRequest::AnalyticsSummary)?))
}

#[derive(Deserialize)]
#[serde(default)]
struct ViewsQuery {
    period: String,
}

impl Default for ViewsQuery {
    fn default() -> Self {
        Self { period: ViewsPeriod::default().to_string() }
    }
}

#[get("/analytics/views")]
async fn get_analytics_views(catalog: CatalogLock, query: web::Query<ViewsQuery>) -> JsonResult {
    let period: ViewsPeriod = query.period.parse()
        .map_err(|_| bad_request(format!("Invalid period '{}', expected one of 7d, 30d, 90d, 1y", query.period)))?;
    Ok(web::Json(serve(&catalog, ApiRequest::AnalyticsViews { period })?))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TopVideosQuery {
    limit: usize,
}

#[get("/analytics/top-videos")]
async fn get_top_videos(catalog: CatalogLock, query: web::Query<TopVideosQuery>) -> JsonResult {
    Ok(web::Json(serve(&catalog, ApiRequest::TopVideos { limit: query.limit })?))
}

#[get("/status")]
async fn get_status(catalog: CatalogLock, config: web::Data<AppConfig>) -> errors::Result<web::Json<StatusResponse>> {
    let catalog = catalog.read().map_err(|_| CATALOG_READ_ERR.clone())?;
    Ok(web::Json(StatusResponse {
        server_version: Some(built_info::PKG_VERSION.into()),
        server_git_hash: built_info::GIT_COMMIT_HASH.map(std::convert::Into::into),
        server_git_dirty: built_info::GIT_DIRTY,
        server_commit_timestamp: built_info::GIT_COMMIT_TIMESTAMP.map(std::convert::Into::into),
        server_build_timestamp: DateTime::parse_from_rfc2822(built_info::BUILT_TIME_UTC).ok().map(|t| t.timestamp()),
        server_startup_timestamp: Some(config.startup_timestamp.timestamp()),
        ..router::catalog_status(&catalog)
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use actix_web::{test, App};
    use chrono::NaiveDate;
    use serde_json::json;
    use vidcat_catalog::{fixtures, VideoCatalog};

    use super::*;

    fn catalog() -> CatalogLock {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        web::Data::new(RwLock::new(VideoCatalog::new(fixtures::published(30, today))))
    }

    macro_rules! app {
        ($catalog:expr) => {
            test::init_service(
                App::new()
                    .app_data($catalog.clone())
                    .app_data(web::Data::new(AppConfig::default()))
                    .service(web::scope("/api").configure(configure))
            ).await
        };
    }

    #[actix_web::test]
    async fn lists_first_page() {
        let app = app!(catalog());
        let req = test::TestRequest::get().uri("/api/videos?page=1&pageSize=10&status=published").to_request();
        let page: VideoPage = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 1);
    }

    #[actix_web::test]
    async fn bad_page_size_is_rejected() {
        let app = app!(catalog());
        let req = test::TestRequest::get().uri("/api/videos?pageSize=1000").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_video_is_404() {
        let app = app!(catalog());
        let req = test::TestRequest::get().uri("/api/videos/vid-9999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn api_root_has_no_route() {
        let app = app!(catalog());
        let req = test::TestRequest::get().uri("/api/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn create_update_delete() {
        let catalog = catalog();
        let app = app!(catalog);

        let req = test::TestRequest::post().uri("/api/videos")
            .set_json(json!({"title": "Fresh", "description": "", "categories": ["music"], "tags": [], "status": "draft", "isPublic": false}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: VideoSummary = test::read_body_json(resp).await;
        assert_eq!(&*created.id, "vid-0031");

        let req = test::TestRequest::put().uri("/api/videos/vid-0031")
            .set_json(json!({"status": "published"}))
            .to_request();
        let updated: VideoSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.status, VideoStatus::Published);
        assert_eq!(&*updated.title, "Fresh");

        let req = test::TestRequest::delete().uri("/api/videos/vid-0031").to_request();
        let deleted: DeleteResponse = test::call_and_read_body_json(&app, req).await;
        assert!(deleted.success);
        let req = test::TestRequest::delete().uri("/api/videos/vid-0031").to_request();
        let deleted: DeleteResponse = test::call_and_read_body_json(&app, req).await;
        assert!(!deleted.success);

        let req = test::TestRequest::get().uri("/api/videos/vid-0031").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(catalog.read().unwrap().revision(), 3);
    }

    #[actix_web::test]
    async fn empty_title_is_400() {
        let app = app!(catalog());
        let req = test::TestRequest::post().uri("/api/videos")
            .set_json(json!({"title": ""}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["context"], "Validation failed: title: Title is required");
    }

    #[actix_web::test]
    async fn uploads_take_raw_bodies() {
        let app = app!(catalog());
        let req = test::TestRequest::post().uri("/api/videos/vid-0002/upload")
            .insert_header((FILE_NAME_HEADER, "clip.mp4"))
            .insert_header((CONTENT_TYPE, "video/mp4"))
            .set_payload(vec![0u8; 64])
            .to_request();
        let resp: UploadResponse = test::call_and_read_body_json(&app, req).await;
        assert!(resp.success);
        assert_eq!(&*resp.upload_url, "/uploads/vid-0002/clip.mp4");

        let req = test::TestRequest::post().uri("/api/videos/vid-0002/thumbnail")
            .insert_header((FILE_NAME_HEADER, "thumb.jpg"))
            .insert_header((CONTENT_TYPE, "image/jpeg"))
            .set_payload(vec![1u8; 8])
            .to_request();
        let resp: ThumbnailResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(&*resp.thumbnail_url, "/thumbnails/vid-0002/thumb.jpg");
    }

    #[actix_web::test]
    async fn analytics_endpoints() {
        let app = app!(catalog());
        let req = test::TestRequest::get().uri("/api/analytics/views?period=30d").to_request();
        let points: Vec<ViewsPoint> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(points.len(), 30);

        let req = test::TestRequest::get().uri("/api/analytics/views?period=2w").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/analytics/top-videos?limit=3").to_request();
        let top: Vec<TopVideo> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(top.len(), 3);
        assert!(top[0].views >= top[1].views);

        let req = test::TestRequest::get().uri("/api/analytics/summary").to_request();
        let summary: AnalyticsSummary = test::call_and_read_body_json(&app, req).await;
        assert_eq!(summary.total_videos, 30);
    }

    #[actix_web::test]
    async fn status_reports_counts() {
        let app = app!(catalog());
        let req = test::TestRequest::get().uri("/api/status").to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status.videos, Some(30));
        assert_eq!(status.removed_videos, Some(0));
        assert!(status.server_version.is_some());
    }
}
