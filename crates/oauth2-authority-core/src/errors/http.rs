// ABOUTME: axum IntoResponse implementation for GrantError
// ABOUTME: Adds RFC 6750 Bearer and RFC 6749 Basic challenges and no-store caching headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{CACHE_CONTROL, LOCATION, PRAGMA, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};

use super::grant::GrantError;

/// Realm advertised in `WWW-Authenticate` challenges
pub const BEARER_REALM: &str = "oauth2";

impl GrantError {
    fn challenge(&self) -> Option<String> {
        match self {
            Self::InvalidToken(_) => Some(format!(
                r#"Bearer realm="{BEARER_REALM}", error="invalid_token", error_description="{}""#,
                self.description()
            )),
            Self::BearerTokenMissing => Some(format!(r#"Bearer realm="{BEARER_REALM}""#)),
            Self::InvalidClient => Some(format!(r#"Basic realm="{BEARER_REALM}""#)),
            _ => None,
        }
    }
}

impl IntoResponse for GrantError {
    fn into_response(self) -> Response {
        if let Self::AuthenticationRequired { resume_url } = &self {
            if let Ok(location) = HeaderValue::from_str(resume_url) {
                return (StatusCode::FOUND, [(LOCATION, location)]).into_response();
            }
        }

        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_oauth2_error())).into_response();
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        if let Some(challenge) = self.challenge() {
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}
