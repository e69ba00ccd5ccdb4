//! Document version endpoints.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::state::AppState;
use docseal_catalog::{DownloadUrl, VersionDetails};
use docseal_common::{Password, VersionId};
use docseal_service::{DownloadError, DownloadResponse};

/// Header carrying the document password, preferred over the query string.
pub const PASSWORD_HEADER: &str = "x-document-password";

/// RFC 5987 `attr-char`: everything else is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Build the document version router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/document-versions/{version_id}", get(details))
        .route("/document-versions/{version_id}/download", get(download))
        .route("/document-versions/{version_id}/download-url", get(download_url))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    password: Option<String>,
}

async fn download(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(version_id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let version_id = parse_version_id(&version_id)?;
    let password = headers
        .get(PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or(query.password)
        .map(Password::from);

    let response = state.gateway.download(&caller, version_id, password).await?;
    Ok(attachment(response))
}

async fn download_url(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(version_id): Path<String>,
) -> Result<Json<DownloadUrl>, ApiError> {
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(state.gateway.download_url(&caller, version_id).await?))
}

async fn details(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(version_id): Path<String>,
) -> Result<Json<VersionDetails>, ApiError> {
    let version_id = parse_version_id(&version_id)?;
    Ok(Json(state.gateway.details(&caller, version_id).await?))
}

fn parse_version_id(raw: &str) -> Result<VersionId, ApiError> {
    VersionId::parse(raw).map_err(|e| ApiError::Download(DownloadError::from(e)))
}

fn attachment(response: DownloadResponse) -> Response {
    let content_type = HeaderValue::from_str(&response.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static(docseal_service::flow::DEFAULT_MEDIA_TYPE));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(response.size));
    headers.insert(CONTENT_DISPOSITION, content_disposition(&response.file_name));

    (headers, Body::from_stream(response.body)).into_response()
}

/// `attachment` disposition with an ASCII fallback and a UTF-8 file name.
pub fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(file_name, ATTR_CHAR);

    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
