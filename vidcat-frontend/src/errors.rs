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

use std::{fmt::Display, rc::Rc};

use cloneable_errors::ErrorContext;

/// Failure of a catalog API request
#[derive(Clone, Debug)]
pub enum QueryError {
    /// The request never got a response
    Network(ErrorContext),
    Server {
        status: u16,
        message: Rc<str>,
    },
    NotFound,
    /// The request was rejected, either locally or with a 400 response
    Validation(Rc<str>),
    /// The response body did not have the expected shape
    Decode(ErrorContext),
}

impl QueryError {
    /// Classifies a non-success HTTP response
    pub fn from_status(status: u16, message: Rc<str>) -> QueryError {
        match status {
            404 => QueryError::NotFound,
            400 | 422 => QueryError::Validation(message),
            _ => QueryError::Server { status, message },
        }
    }

    /// Transient failures worth one more attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            QueryError::Network(..) => true,
            QueryError::Server { status, .. } => *status >= 500,
            QueryError::NotFound | QueryError::Validation(..) | QueryError::Decode(..) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFound)
    }
}

impl std::error::Error for QueryError {}
impl Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Network(err) => write!(f, "Network error: {err}"),
            QueryError::Server { status, message } => write!(f, "The server returned a '{status}' status code: {message}"),
            QueryError::NotFound => write!(f, "Not found"),
            QueryError::Validation(message) => write!(f, "Invalid request: {message}"),
            QueryError::Decode(err) => write!(f, "Malformed response: {err}"),
        }
    }
}

/// Failure of the browser-local key-value storage
#[derive(Clone, Debug)]
pub enum StorageError {
    /// Storage is disabled or not accessible in this context
    Unavailable,
    /// Writing failed, usually because the quota was exceeded
    Write {
        key: Rc<str>,
        message: Rc<str>,
    },
    Serialize(ErrorContext),
}

impl std::error::Error for StorageError {}
impl Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Unavailable => write!(f, "Local storage is unavailable"),
            StorageError::Write { key, message } => write!(f, "Failed to write '{key}' to local storage: {message}"),
            StorageError::Serialize(err) => write!(f, "Failed to serialize local state: {err}"),
        }
    }
}

/// Mirrors the `MediaError.code` values of HTML media elements
#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display)]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Unknown,
}

impl MediaErrorKind {
    pub fn from_code(code: u16) -> MediaErrorKind {
        match code {
            1 => MediaErrorKind::Aborted,
            2 => MediaErrorKind::Network,
            3 => MediaErrorKind::Decode,
            4 => MediaErrorKind::SourceNotSupported,
            _ => MediaErrorKind::Unknown,
        }
    }
}

/// Terminal failure of a playback session
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PlaybackError {
    pub kind: MediaErrorKind,
    pub detail: Option<Rc<str>>,
}

impl PlaybackError {
    /// Text suitable for showing to the viewer
    pub fn message(&self) -> &'static str {
        match self.kind {
            MediaErrorKind::Aborted => "Playback was aborted.",
            MediaErrorKind::Network => "A network error interrupted the video download.",
            MediaErrorKind::Decode => "The video could not be decoded.",
            MediaErrorKind::SourceNotSupported => "This video format is not supported by your browser.",
            MediaErrorKind::Unknown => "An unknown error occurred while playing the video.",
        }
    }
}

impl std::error::Error for PlaybackError {}
impl Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.detail {
            Some(ref detail) => write!(f, "{} ({detail})", self.message()),
            None => write!(f, "{}", self.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use cloneable_errors::anyhow;

    use super::*;

    #[test]
    fn status_classification() {
        assert!(QueryError::from_status(404, "".into()).is_not_found());
        assert!(matches!(QueryError::from_status(400, "bad".into()), QueryError::Validation(..)));
        let server = QueryError::from_status(503, "busy".into());
        assert!(server.is_retryable());
        assert!(!QueryError::from_status(409, "conflict".into()).is_retryable());
        assert!(QueryError::Network(anyhow!("offline")).is_retryable());
        assert!(!QueryError::Decode(anyhow!("garbage")).is_retryable());
    }

    #[test]
    fn playback_errors_have_messages() {
        let err = PlaybackError { kind: MediaErrorKind::from_code(4), detail: Some("video/x-flv".into()) };
        assert_eq!(err.kind, MediaErrorKind::SourceNotSupported);
        assert_eq!(err.to_string(), "This video format is not supported by your browser. (video/x-flv)");
    }
}
