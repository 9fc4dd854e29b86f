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

use chrono::{Days, NaiveDate};
use vidcat_api::sync::{AnalyticsSummary, TopVideo, ViewsPeriod, ViewsPoint, VideoSummary};

use crate::{db::{VideoCatalog, DATE_FORMAT}, fixtures::SeededRng};

pub const DEFAULT_TOP_VIDEOS: usize = 5;
pub const MAX_TOP_VIDEOS: usize = 50;

fn round1(value: f64) -> f64 {
    (value * 10.).round() / 10.
}

impl VideoCatalog {
    /// Totals over live videos
    ///
    /// The period-over-period changes are simulated, but stable for a given catalog revision.
    pub fn analytics_summary(&self) -> AnalyticsSummary {
        let mut summary = AnalyticsSummary::default();
        let mut rating_sum = 0.;
        let mut rating_count = 0;
        for video in self.live() {
            summary.total_videos += 1;
            if let Some(ref stats) = video.video.stats {
                summary.total_views += stats.views;
                summary.total_watch_time += stats.total_watch_time;
                rating_sum += stats.average_rating * stats.rating_count as f64;
                rating_count += stats.rating_count;
            }
        }
        if rating_count > 0 {
            summary.average_rating = round1(rating_sum / rating_count as f64);
        }
        let mut rng = SeededRng::new(&format!("summary:{}", self.revision()));
        let mut change = || round1(rng.next_f64() * 60. - 20.);
        summary.videos_change = change();
        summary.views_change = change();
        summary.watch_time_change = change();
        summary.rating_change = change();
        summary
    }

    /// Daily views for the period ending at `today`, oldest first
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn views_over_time(&self, period: ViewsPeriod, today: NaiveDate) -> Vec<ViewsPoint> {
        let total_views: u64 = self.live()
            .filter_map(|v| v.video.stats.as_ref())
            .map(|s| s.views)
            .sum();
        let daily_base = (total_views as f64 / 365.).max(50.);
        (0..period.days()).rev().map(|days_ago| {
            let date = (today - Days::new(u64::from(days_ago))).format(DATE_FORMAT).to_string();
            // seeded by date, so overlapping periods agree with each other
            let jitter = SeededRng::new(&date).next_f64();
            ViewsPoint {
                date: date.into(),
                views: (daily_base * (0.6 + 0.8 * jitter)).round() as u64,
            }
        }).collect()
    }

    /// Most viewed live videos, `limit` clamped to `1..=50`
    pub fn top_videos(&self, limit: usize) -> Vec<TopVideo> {
        let mut videos: Vec<_> = self.live().map(|v| &v.video).collect();
        videos.sort_by(|a, b| {
            let views = |v: &&VideoSummary| v.stats.as_ref().map_or(0, |s| s.views);
            views(b).cmp(&views(a)).then_with(|| a.id.cmp(&b.id))
        });
        videos.into_iter()
            .take(limit.clamp(1, MAX_TOP_VIDEOS))
            .map(|v| {
                let (views, ratings) = v.stats.as_ref().map_or((0, 0), |s| (s.views, s.rating_count));
                TopVideo {
                    id: v.id.clone(),
                    title: v.title.clone(),
                    thumbnail_url: v.thumbnail_url.clone(),
                    views,
                    engagement: if views == 0 { 0. } else { round1(ratings as f64 / views as f64 * 100.) },
                }
            })
            .collect()
    }
}
