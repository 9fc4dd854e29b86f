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

use alea_js::Alea;
use chrono::{Days, NaiveDate};
use indexmap::IndexSet;
use vidcat_api::sync::{VideoStats, VideoStatus, VideoSummary};

use crate::db::DATE_FORMAT;

const ADJECTIVES: &[&str] = &["Quick", "Complete", "Relaxing", "Hidden", "Ultimate", "Beginner's", "Late night", "Weekend"];
const SUBJECTS: &[&str] = &["guide to sourdough", "city walk", "synth jam", "mountain hike", "code review", "garden tour", "chess analysis", "bike repair"];
pub const CATEGORIES: &[&str] = &["education", "music", "travel", "food", "tech", "sports"];
const TAGS: &[&str] = &["tutorial", "vlog", "live", "4k", "shorts", "review", "diy", "ambient"];
const STATUSES: &[VideoStatus] = &[
    VideoStatus::Published, VideoStatus::Published, VideoStatus::Published,
    VideoStatus::Ready, VideoStatus::Draft, VideoStatus::Processing, VideoStatus::Uploaded, VideoStatus::Error,
];

/// Deterministic random source, seeded by a string
pub struct SeededRng(Alea);

impl SeededRng {
    pub fn new(seed: &str) -> Self {
        SeededRng(Alea::new(seed))
    }

    /// Uniform in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.0.random()
    }

    /// Uniform in `[low, high)`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn range(&mut self, low: u64, high: u64) -> u64 {
        low + (self.next_f64() * (high - low) as f64) as u64
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.range(0, items.len() as u64) as usize]
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.).round() / 10.
}

/// Generates `count` videos with ids `vid-0001` and up, uploaded within the year before `today`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate(count: usize, seed: &str, today: NaiveDate) -> Vec<VideoSummary> {
    let mut rng = SeededRng::new(seed);
    (1..=count).map(|i| {
        let id = format!("vid-{i:04}");
        let title = format!("{} {} #{i}", rng.pick(ADJECTIVES), rng.pick(SUBJECTS));
        let status = *rng.pick(STATUSES);
        let upload_date = today - Days::new(rng.range(0, 365));
        let duration = rng.range(30, 3600);
        let categories: IndexSet<_> = (0..rng.range(1, 3)).map(|_| (*rng.pick(CATEGORIES)).into()).collect();
        let tags: IndexSet<_> = (0..rng.range(0, 4)).map(|_| (*rng.pick(TAGS)).into()).collect();
        let views = rng.range(0, 50_000);
        let rating_count = (views as f64 * (0.01 + rng.next_f64() * 0.09)) as u64;
        let watch_ratio = 0.2 + rng.next_f64() * 0.6;
        VideoSummary {
            thumbnail_url: Some(format!("/thumbnails/{id}/default.jpg").into()),
            id: id.into(),
            description: format!("{title}, recorded on {}", upload_date.format(DATE_FORMAT)).into(),
            title: title.into(),
            duration: duration as u32,
            upload_date: upload_date.format(DATE_FORMAT).to_string().into(),
            is_public: status == VideoStatus::Published,
            status,
            categories,
            tags,
            stats: Some(VideoStats {
                views,
                average_rating: if rating_count == 0 { 0. } else { round1(1. + rng.next_f64() * 4.) },
                rating_count,
                total_watch_time: (views as f64 * duration as f64 * watch_ratio) as u64,
            }),
        }
    }).collect()
}

/// Like [`generate`], but every video is published and public
pub fn published(count: usize, today: NaiveDate) -> Vec<VideoSummary> {
    let mut videos = generate(count, "published", today);
    for video in &mut videos {
        video.status = VideoStatus::Published;
        video.is_public = true;
    }
    videos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn same_seed_same_catalog() {
        assert_eq!(generate(20, "abc", today()), generate(20, "abc", today()));
        assert_ne!(generate(20, "abc", today()), generate(20, "xyz", today()));
    }

    #[test]
    fn generated_videos_are_plausible() {
        let videos = generate(50, "plausible", today());
        assert_eq!(videos.len(), 50);
        assert_eq!(&*videos[0].id, "vid-0001");
        assert_eq!(&*videos[49].id, "vid-0050");
        for video in &videos {
            assert!(!video.title.is_empty());
            assert!((30..3600).contains(&video.duration));
            assert!(!video.categories.is_empty());
            let date = NaiveDate::parse_from_str(&video.upload_date, DATE_FORMAT).unwrap();
            assert!(date <= today());
            let stats = video.stats.as_ref().unwrap();
            assert!((0. ..=5.).contains(&stats.average_rating));
            assert!(stats.rating_count <= stats.views);
        }
    }

    #[test]
    fn published_fixtures_are_all_published() {
        assert!(published(30, today()).iter().all(|v| v.status == VideoStatus::Published && v.is_public));
    }
}
