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

use std::fmt::{Debug, Display};

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use cloneable_errors::{ErrorContext, IntoErrorIterator};
use log::warn;
use vidcat_catalog::CatalogError;

/// Request handler error, rendered as a JSON [`cloneable_errors::SerializableError`]
pub struct Error {
    err: ErrorContext,
    status: StatusCode,
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] ", self.status)?;
        Debug::fmt(&self.err, f)
    }
}
impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.err, f)
    }
}
impl From<ErrorContext> for Error {
    fn from(err: ErrorContext) -> Self {
        Error { err, status: StatusCode::INTERNAL_SERVER_ERROR }
    }
}
impl From<CatalogError> for Error {
    fn from(value: CatalogError) -> Self {
        Error {
            status: StatusCode::from_u16(value.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            err: ErrorContext::new(value.to_string()),
        }
    }
}
impl std::error::Error for Error {}
impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        if self.status.is_server_error() {
            warn!("Request failed: {:?}", self.err);
        }
        HttpResponse::build(self.status).json(self.err.serializable_copy())
    }
}

impl Error {
    pub fn set_status(self, status: StatusCode) -> Self {
        Error { status, ..self }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use cloneable_errors::anyhow;

    use super::*;

    #[test]
    fn catalog_errors_keep_their_status() {
        let err = Error::from(CatalogError::NotFound { id: "vid-0001".into() });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Video vid-0001 was not found");
    }

    #[test]
    fn set_status_overrides() {
        let err = Error::from(anyhow!("nope")).set_status(StatusCode::BAD_REQUEST);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_response().status(), StatusCode::BAD_REQUEST);
    }
}
