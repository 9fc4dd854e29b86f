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

use std::{fs::{set_permissions, Permissions}, os::unix::prelude::PermissionsExt, path::Path, sync::RwLock};

use actix_files::{Files, NamedFile};
use actix_web::{dev::{fn_service, ServiceRequest, ServiceResponse}, middleware::NormalizePath, web, App, HttpServer};
use chrono::Utc;
use cloneable_errors::{ErrorContext, ResContext};
use env_logger::Env;
use log::info;
use vidcat_catalog::{fixtures, VideoCatalog};

mod constants;
mod errors;
mod middleware;
mod routes;
mod state;
use constants::CONFIG_PATH;
use state::*;

/// Serves `index.html` for any path the static file service doesn't know, so that client-side routes survive a reload
async fn spa_index(req: ServiceRequest) -> Result<ServiceResponse, actix_web::Error> {
    let config = req.app_data::<web::Data<AppConfig>>().cloned();
    let (req, _) = req.into_parts();
    let Some(config) = config else {
        return Err(actix_web::error::ErrorInternalServerError("Missing app configuration"));
    };
    let file = NamedFile::open_async(config.static_content_path.join("index.html")).await?;
    let resp = file.into_response(&req);
    Ok(ServiceResponse::new(req, resp))
}

fn set_socket_mode(path: &str, mode: Option<u32>) -> Result<(), ErrorContext> {
    match mode {
        Some(mode) => set_permissions(path, Permissions::from_mode(mode))
            .with_context(|| format!("Failed to change mode of unix socket {path} to {mode:o}")),
        None => Ok(()),
    }
}

#[actix_web::main]
async fn main() -> Result<(), ErrorContext> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = web::Data::new(AppConfig::load_or_create(Path::new(CONFIG_PATH))?);

    info!("Generating {} fixture videos with seed '{}'...", config.fixtures.count, config.fixtures.seed);
    let today = Utc::now().date_naive();
    let catalog: CatalogLock = web::Data::new(RwLock::new(VideoCatalog::new(
        fixtures::generate(config.fixtures.count, &config.fixtures.seed, today)
    )));
    info!("Catalog ready with {} videos", config.fixtures.count);

    let app_config = config.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .app_data(app_config.clone())
            .app_data(catalog.clone())
            .app_data(web::PayloadConfig::new(app_config.max_upload_size))
            .service(web::scope("/api")
                .wrap(middleware::SimulatedLatency)
                .wrap(middleware::Timings)
                .configure(routes::configure)
            )
            .service(
                Files::new("/", app_config.static_content_path.as_path())
                    .index_file("index.html")
                    .default_handler(fn_service(spa_index))
            )
    });
    let listen = &config.listen;
    if let Some((host, port)) = &listen.tcp {
        server = server.bind((host.as_str(), *port)).with_context(|| format!("Failed to bind to tcp port {host}:{port}"))?;
        info!("Listening on {host}:{port}");
    }
    if let Some(path) = &listen.unix {
        server = server.bind_uds(path).with_context(|| format!("Failed to bind to unix socket {path}"))?;
        set_socket_mode(path, listen.unix_mode)?;
        info!("Listening on {path}");
    }
    server.run()
        .await
        .context("Error while running the server")
}

mod built_info {
    // Contents generated by buildscript, using built
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
