use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use futures::future::join_all;

use crate::{
    error::ApiError,
    form::{ArtistForm, NewArtist},
    models::{ArtistRecord, DeleteResponse},
    storage::{MetadataStore, ObjectStore},
    util::{
        image_url, object_key, object_key_from_url, random_suffix, safe_file_name, slugify,
        timestamp_id, IdScheme,
    },
    AppState,
};

const MAX_ID_ATTEMPTS: usize = 5;

pub async fn list_artists(
    State(state): State<AppState>,
) -> Result<Json<Vec<ArtistRecord>>, ApiError> {
    let metadata = state.metadata()?;
    let keys = metadata.list_keys().await?;

    let fetched = join_all(keys.iter().map(|key| metadata.get(key))).await;

    let artists = keys
        .into_iter()
        .zip(fetched)
        .filter_map(|(key, result)| match result {
            Ok(Some(raw)) => match serde_json::from_str::<ArtistRecord>(&raw) {
                Ok(mut artist) => {
                    if artist.id.is_empty() {
                        artist.id = key;
                    }
                    Some(artist)
                }
                Err(err) => {
                    tracing::warn!("skipping unreadable artist document {}: {}", key, err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("skipping artist {} after fetch failure: {}", key, err);
                None
            }
        })
        .collect();

    Ok(Json(artists))
}

pub async fn create_artist(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ArtistRecord>), ApiError> {
    let multipart = multipart.map_err(|_| {
        ApiError::BadRequest("Invalid content-type. Expected multipart/form-data.".to_string())
    })?;
    let artist = ArtistForm::from_multipart(multipart).await?.validate()?;

    let metadata = state.metadata()?;
    let objects = state.objects()?;

    let id = derive_id(metadata.as_ref(), state.id_scheme, &artist).await?;
    let record = store_artist(metadata.as_ref(), objects.as_ref(), id, artist).await?;

    tracing::info!(artist = %record.id, images = record.images.len(), "created artist");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn derive_id(
    metadata: &dyn MetadataStore,
    scheme: IdScheme,
    artist: &NewArtist,
) -> Result<String, ApiError> {
    match scheme {
        IdScheme::Slug => {
            let source = artist.english_name.as_deref().unwrap_or(&artist.name);
            let id = slugify(source);
            if !id.chars().any(|c| c.is_ascii_alphanumeric()) {
                return Err(ApiError::BadRequest(
                    "Artist name must contain at least one ASCII letter or digit".to_string(),
                ));
            }
            if metadata.get(&id).await?.is_some() {
                return Err(ApiError::Conflict(format!("Artist '{id}' already exists")));
            }
            Ok(id)
        }
        IdScheme::Timestamp => {
            let base = timestamp_id();
            if metadata.get(&base).await?.is_none() {
                return Ok(base);
            }
            for _ in 0..MAX_ID_ATTEMPTS {
                let id = format!("{base}_{}", random_suffix());
                if metadata.get(&id).await?.is_none() {
                    return Ok(id);
                }
            }
            Err(ApiError::Conflict(format!(
                "Could not allocate a free id near '{base}'"
            )))
        }
    }
}

/// Uploads the images in submission order, then writes the metadata
/// document. Nothing is rolled back if a later step fails.
async fn store_artist(
    metadata: &dyn MetadataStore,
    objects: &dyn ObjectStore,
    id: String,
    artist: NewArtist,
) -> Result<ArtistRecord, ApiError> {
    let mut images = Vec::with_capacity(artist.images.len());

    for (i, upload) in artist.images.into_iter().enumerate() {
        let file_name = safe_file_name(i + 1, upload.file_name.as_deref(), &upload.content_type);
        let key = object_key(&id, &file_name);
        if let Err(err) = objects.put(&key, upload.bytes, &upload.content_type).await {
            if !images.is_empty() {
                tracing::warn!(artist = %id, orphaned = ?images, "image upload failed part way");
            }
            return Err(err);
        }
        images.push(image_url(&key));
    }

    let record = ArtistRecord {
        id,
        name: artist.name,
        english_name: artist.english_name,
        short_intro: artist.short_intro,
        images,
        career: artist.career,
        home_banner_index: artist.home_banner_index,
        artists_banner_index: artist.artists_banner_index,
        created_at: Some(Utc::now()),
    };

    let body = serde_json::to_string(&record)?;
    if let Err(err) = metadata.put(&record.id, &body).await {
        tracing::warn!(
            artist = %record.id,
            orphaned = ?record.images,
            "metadata write failed after upload"
        );
        return Err(err);
    }

    Ok(record)
}

pub async fn delete_artist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let metadata = state.metadata()?;
    let objects = state.objects()?;

    if let Some(raw) = metadata.get(&id).await? {
        match serde_json::from_str::<ArtistRecord>(&raw) {
            Ok(artist) => {
                let keys: Vec<String> = artist
                    .image_urls()
                    .filter_map(object_key_from_url)
                    .map(str::to_string)
                    .collect();
                delete_images(objects.as_ref(), &keys).await;
            }
            Err(err) => {
                tracing::warn!(
                    "artist {} has an unreadable document, images left in place: {}",
                    id,
                    err
                );
            }
        }
    }

    metadata.delete(&id).await?;
    tracing::info!(artist = %id, "deleted artist");

    Ok(Json(DeleteResponse { success: true }))
}

async fn delete_images(objects: &dyn ObjectStore, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    if let Err(err) = objects.delete_many(keys).await {
        tracing::warn!("batch delete failed, deleting one at a time: {}", err);
        for key in keys {
            if let Err(err) = objects.delete(key).await {
                tracing::warn!("failed to delete object {}: {}", key, err);
            }
        }
    }
}
