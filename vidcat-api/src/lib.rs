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

#[cfg(feature = "sync")]
pub mod sync {
    pub type RcStr = std::sync::Arc<str>;
    include!("api.rs");
}

#[cfg(feature = "unsync")]
pub mod unsync {
    pub type RcStr = std::rc::Rc<str>;
    include!("api.rs");
}

#[cfg(all(test, feature = "sync"))]
mod tests {
    use crate::sync::*;

    #[test]
    fn list_params_parse_repeated_categories() {
        let params = VideoListParams::from_query_pairs([
            ("page", "2"),
            ("pageSize", "25"),
            ("status", "published"),
            ("categories[]", "music"),
            ("categories[]", "travel"),
            ("sort", "views"),
            ("order", "asc"),
            ("search", ""),
            ("utm_source", "newsletter"),
        ]).unwrap();
        assert_eq!(params.page, 2);
        assert_eq!(params.page_size, 25);
        assert_eq!(params.status, Some(VideoStatus::Published));
        assert_eq!(params.categories.len(), 2);
        assert_eq!(params.sort, Some(SortField::Views));
        assert_eq!(params.order, SortOrder::Asc);
        assert_eq!(params.search, None);
    }

    #[test]
    fn list_params_reject_garbage() {
        let err = VideoListParams::from_query_pairs([("page", "two")]).unwrap_err();
        assert_eq!(err.param, "page");
        assert!(VideoListParams::from_query_pairs([("pageSize", "1000")]).is_err());
        assert!(VideoListParams::from_query_pairs([("page", "0")]).is_err());
        assert!(VideoListParams::from_query_pairs([("status", "bogus")]).is_err());
        assert_eq!(VideoListParams::from_query_pairs([("status", "all")]).unwrap().status, None);
    }

    #[test]
    fn list_params_survive_the_query_string() {
        let params = VideoListParams {
            page: 3,
            search: Some("cats".into()),
            categories: vec!["pets".into()],
            start_date: Some("2024-01-01".into()),
            sort: Some(SortField::UploadDate),
            order: SortOrder::Asc,
            ..VideoListParams::default()
        };
        let parsed = VideoListParams::from_query_pairs(params.to_query_pairs()).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn create_video_requires_a_title() {
        let mut body = CreateVideo {
            title: "   ".into(),
            description: "".into(),
            categories: vec![],
            tags: vec![],
            status: VideoStatus::Draft,
            is_public: false,
        };
        assert_eq!(body.validate().unwrap_err().field, "title");
        body.title = "Sunset timelapse".into();
        assert!(body.validate().is_ok());
    }

    #[test]
    fn wire_names_match_the_contract() {
        let page: VideoPage = serde_json::from_str(r#"{
            "data": [{
                "id": "v1", "title": "A", "description": "", "thumbnailUrl": null,
                "duration": 60, "uploadDate": "2024-05-01", "status": "published",
                "isPublic": true, "categories": ["music"], "tags": [],
                "stats": {"views": 10, "averageRating": 4.5, "ratingCount": 2, "totalWatchTime": 300}
            }],
            "total": 1, "page": 1, "pageSize": 10, "totalPages": 1
        }"#).unwrap();
        assert_eq!(page.data[0].status, VideoStatus::Published);
        assert_eq!(page.total_pages, 1);

        let upload = serde_json::to_value(UploadResponse { id: "v1".into(), upload_url: "/u".into(), success: true }).unwrap();
        assert!(upload.get("upload_url").is_some());
        let thumb = serde_json::to_value(ThumbnailResponse { thumbnail_url: "/t".into() }).unwrap();
        assert!(thumb.get("thumbnailUrl").is_some());
        assert_eq!(serde_json::to_value(ViewsPeriod::Year).unwrap(), "1y");
    }

    #[test]
    fn watchlist_items_accept_both_forms() {
        let items: Vec<WatchlistItem> = serde_json::from_str(r#"["a", {"videoId": "b", "dateAdded": 5}]"#).unwrap();
        assert_eq!(&**items[0].video_id(), "a");
        assert_eq!(&**items[1].video_id(), "b");
    }

    #[test]
    fn requests_know_their_routes() {
        let req = ApiRequest::UploadThumbnail {
            id: "v9".into(),
            file: FileUpload { file_name: "t.png".into(), content_type: "image/png".into(), data: vec![] },
        };
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.path_segments(), vec!["videos", "v9", "thumbnail"]);
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert_eq!(ApiRequest::TopVideos { limit: 5 }.query_pairs(), vec![("limit", "5".to_owned())]);
    }
}
