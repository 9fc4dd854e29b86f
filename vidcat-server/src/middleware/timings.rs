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

use std::{future::{ready, Ready}, time::{Duration, Instant}};

use actix_web::{dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform}, error::Error, http::header::{HeaderName, HeaderValue}, web};
use futures::{future::LocalBoxFuture, FutureExt};
use log::error;

use crate::state::AppConfig;

pub const TIME_SPENT_HEADER: &str = "x-time-spent";

/// Adds an `X-Time-Spent` header to every response when enabled in the config
pub struct Timings;

impl<S, B> Transform<S, ServiceRequest> for Timings
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TimingsInstance<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TimingsInstance { service }))
    }
}

pub struct TimingsInstance<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TimingsInstance<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let enabled = req.app_data::<web::Data<AppConfig>>().is_some_and(|c| c.enable_timings_header);
        if !enabled {
            return self.service.call(req).boxed_local()
        }
        let start = Instant::now();
        let srv = self.service.call(req);

        async move {
            let mut resp = srv.await?;
            let elapsed = Instant::elapsed(&start);
            match HeaderValue::try_from(format!("{} ns", render_duration(&elapsed))) {
                Ok(value) => { resp.headers_mut().append(HeaderName::from_static(TIME_SPENT_HEADER), value); },
                Err(e) => error!("Failed to append the X-Time-Spent header: {e}"),
            }
            Ok(resp)
        }.boxed_local()
    }
}

/// Groups digits in threes, `1234567` -> `1 234 567`
fn render_duration(duration: &Duration) -> String {
    let string_n = format!("{}", duration.as_nanos());
    let chunks = string_n.as_bytes() // digits are ASCII = 1B each
        .rchunks(3)
        .rev()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>();
    chunks.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_grouped() {
        assert_eq!(render_duration(&Duration::from_nanos(1_234_567)), "1 234 567");
        assert_eq!(render_duration(&Duration::from_nanos(12)), "12");
        assert_eq!(render_duration(&Duration::from_nanos(123_456)), "123 456");
    }
}
