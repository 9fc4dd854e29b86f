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

use std::{fmt::Display, sync::Arc};

use vidcat_api::sync::{ParamError, ValidationIssue};

#[derive(Debug, Clone)]
pub enum CatalogError {
    /// No live video with this id
    NotFound { id: Arc<str> },
    /// The mutation payload was rejected
    Validation(ValidationIssue),
    /// A list/analytics parameter could not be understood
    InvalidParam { param: &'static str, value: String },
    /// A response could not be serialized
    Internal(String),
}

impl std::error::Error for CatalogError {}
impl Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::NotFound { id } => write!(f, "Video {id} was not found"),
            CatalogError::Validation(issue) => write!(f, "Validation failed: {issue}"),
            CatalogError::InvalidParam { param, value } => write!(f, "Invalid value for parameter '{param}': '{value}'"),
            CatalogError::Internal(message) => write!(f, "Internal catalog error: {message}"),
        }
    }
}

impl From<ValidationIssue> for CatalogError {
    fn from(value: ValidationIssue) -> Self {
        CatalogError::Validation(value)
    }
}

impl From<ParamError> for CatalogError {
    fn from(value: ParamError) -> Self {
        CatalogError::InvalidParam { param: value.param, value: value.value }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(value: serde_json::Error) -> Self {
        CatalogError::Internal(value.to_string())
    }
}

impl CatalogError {
    /// HTTP status code this error should be reported with
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::NotFound { .. } => 404,
            CatalogError::Validation(..) | CatalogError::InvalidParam { .. } => 400,
            CatalogError::Internal(..) => 500,
        }
    }
}
