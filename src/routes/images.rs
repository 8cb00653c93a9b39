use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};

use crate::{error::ApiError, util::object_key, AppState};

/// Image keys are never rewritten, so clients may cache them for good.
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

pub async fn get_image(
    State(state): State<AppState>,
    Path((artist_id, image_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    // Path segments arrive percent-decoded, so `b%2Fc.png` would reach
    // another key.
    if !is_plain_segment(&artist_id) || !is_plain_segment(&image_name) {
        return Ok(object_not_found());
    }
    let objects = state.objects()?;
    let key = object_key(&artist_id, &image_name);

    let Some(object) = objects.get(&key).await? else {
        return Ok(object_not_found());
    };

    let etag = object
        .etag
        .as_deref()
        .and_then(|tag| HeaderValue::from_str(tag).ok());

    if let (Some(etag), Some(candidates)) = (&etag, headers.get(IF_NONE_MATCH)) {
        if etag_matches(etag, candidates) {
            let mut resp = StatusCode::NOT_MODIFIED.into_response();
            resp.headers_mut().insert(ETAG, etag.clone());
            return Ok(resp);
        }
    }

    let mut resp = Response::new(Body::from(object.bytes));
    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    resp.headers_mut().insert(CONTENT_TYPE, content_type);
    resp.headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE));
    if let Some(etag) = etag {
        resp.headers_mut().insert(ETAG, etag);
    }
    Ok(resp)
}

fn object_not_found() -> Response {
    (StatusCode::NOT_FOUND, "Object Not Found").into_response()
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

fn etag_matches(etag: &HeaderValue, if_none_match: &HeaderValue) -> bool {
    let (Ok(etag), Ok(candidates)) = (etag.to_str(), if_none_match.to_str()) else {
        return false;
    };
    candidates.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.trim_start_matches("W/") == etag.trim_start_matches("W/")
    })
}
