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

use std::{future::{ready, Ready}, time::Duration};

use actix_web::{dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform}, error::Error, rt::time::sleep, web};
use futures::{future::LocalBoxFuture, FutureExt};

use crate::state::AppConfig;

/// Delays every response by `simulated_latency_ms`, so that loading states can be observed
pub struct SimulatedLatency;

impl<S, B> Transform<S, ServiceRequest> for SimulatedLatency
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SimulatedLatencyInstance<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SimulatedLatencyInstance { service }))
    }
}

pub struct SimulatedLatencyInstance<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for SimulatedLatencyInstance<S>
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
        let latency = req.app_data::<web::Data<AppConfig>>().map_or(0, |c| c.simulated_latency_ms);
        let srv = self.service.call(req);
        if latency == 0 {
            return srv.boxed_local();
        }
        async move {
            let resp = srv.await?;
            sleep(Duration::from_millis(latency)).await;
            Ok(resp)
        }.boxed_local()
    }
}
