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

use chrono::NaiveDate;
use serde_json::Value;
use vidcat_api::sync::{ApiRequest, StatusResponse};

use crate::{analytics::DEFAULT_TOP_VIDEOS, db::VideoCatalog, errors::CatalogError};

/// Catalog-level part of the `/status` response
pub fn catalog_status(catalog: &VideoCatalog) -> StatusResponse {
    StatusResponse {
        videos: Some(catalog.len()),
        removed_videos: Some(catalog.removed_count()),
        revision: Some(catalog.revision()),
        ..Default::default()
    }
}

/// Serves a typed request against the catalog, returning the JSON body of a successful response
///
/// `today` anchors new upload dates and the analytics time series.
pub fn handle(catalog: &mut VideoCatalog, request: ApiRequest, today: NaiveDate) -> Result<Value, CatalogError> {
    let value = match request {
        ApiRequest::ListVideos(ref params) => serde_json::to_value(catalog.list(params)?)?,
        ApiRequest::GetVideo { ref id } => serde_json::to_value(catalog.get(id)?)?,
        ApiRequest::CreateVideo(body) => serde_json::to_value(catalog.create(body, today)?)?,
        ApiRequest::UpdateVideo { ref id, changes } => serde_json::to_value(catalog.update(id, changes)?)?,
        ApiRequest::DeleteVideo { ref id } => serde_json::to_value(catalog.delete(id))?,
        ApiRequest::UploadVideo { ref id, ref file } => serde_json::to_value(catalog.attach_upload(id, file)?)?,
        ApiRequest::UploadThumbnail { ref id, ref file } => serde_json::to_value(catalog.set_thumbnail(id, file)?)?,
        ApiRequest::AnalyticsSummary => serde_json::to_value(catalog.analytics_summary())?,
        ApiRequest::AnalyticsViews { period } => serde_json::to_value(catalog.views_over_time(period, today))?,
        ApiRequest::TopVideos { limit } => serde_json::to_value(catalog.top_videos(if limit == 0 { DEFAULT_TOP_VIDEOS } else { limit }))?,
        ApiRequest::Status => serde_json::to_value(catalog_status(catalog))?,
    };
    Ok(value)
}
