//! Multipart ingestion for artist creation.
//!
//! The form is read completely into [`ArtistForm`] before anything is
//! checked, then [`ArtistForm::validate`] turns it into a [`NewArtist`] or
//! the first validation failure. Nothing touches a store until that passes.

use axum::extract::Multipart;
use bytes::Bytes;

use crate::{error::ApiError, models::Career};

pub const IMAGES_FIELD: &str = "images";

/// One uploaded file, in submission order.
#[derive(Clone, Debug)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Raw, untyped form contents. Text fields are kept verbatim.
#[derive(Clone, Debug, Default)]
pub struct ArtistForm {
    pub name: Option<String>,
    pub english_name: Option<String>,
    pub short_intro: Option<String>,
    pub bio: Option<String>,
    pub career: Option<String>,
    pub home_banner_index: Option<String>,
    pub artists_banner_index: Option<String>,
    pub banner_image_index: Option<String>,
    pub images: Vec<UploadedImage>,
}

/// A submission that passed validation.
#[derive(Clone, Debug)]
pub struct NewArtist {
    pub name: String,
    pub english_name: Option<String>,
    pub short_intro: Option<String>,
    pub career: Career,
    pub home_banner_index: Option<usize>,
    pub artists_banner_index: Option<usize>,
    pub images: Vec<UploadedImage>,
}

impl ArtistForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ArtistForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);

            if name == IMAGES_FIELD || file_name.is_some() {
                let content_type = field
                    .content_type()
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                if name != IMAGES_FIELD {
                    tracing::debug!(field = %name, "ignoring file outside the images field");
                    continue;
                }
                // An untouched browser file input still submits an empty part.
                if bytes.is_empty() && file_name.as_deref().unwrap_or("").is_empty() {
                    continue;
                }
                form.images.push(UploadedImage {
                    file_name: file_name.filter(|f| !f.is_empty()),
                    content_type,
                    bytes,
                });
                continue;
            }

            let value = field.text().await?;
            let slot = match name.as_str() {
                "name" => &mut form.name,
                "englishName" => &mut form.english_name,
                "shortIntro" => &mut form.short_intro,
                "bio" => &mut form.bio,
                "career" => &mut form.career,
                "homeBannerIndex" => &mut form.home_banner_index,
                "artistsBannerIndex" => &mut form.artists_banner_index,
                "bannerImageIndex" => &mut form.banner_image_index,
                _ => {
                    tracing::debug!(field = %name, "ignoring unknown form field");
                    continue;
                }
            };
            *slot = Some(value);
        }

        Ok(form)
    }

    pub fn validate(self) -> Result<NewArtist, ApiError> {
        let english_name = non_empty(self.english_name);
        let name = non_empty(self.name)
            .or_else(|| english_name.clone())
            .ok_or_else(|| ApiError::BadRequest("Artist name is required".to_string()))?;

        if self.images.is_empty() {
            return Err(ApiError::BadRequest(
                "At least one image is required".to_string(),
            ));
        }

        let count = self.images.len();
        let legacy = banner_index("bannerImageIndex", self.banner_image_index, count)?;
        let home_banner_index =
            banner_index("homeBannerIndex", self.home_banner_index, count)?.or(legacy);
        let artists_banner_index =
            banner_index("artistsBannerIndex", self.artists_banner_index, count)?.or(legacy);

        Ok(NewArtist {
            name,
            english_name,
            short_intro: non_empty(self.short_intro).or_else(|| non_empty(self.bio)),
            career: parse_career(self.career.as_deref()),
            home_banner_index,
            artists_banner_index,
            images: self.images,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Blank means "not supplied"; anything else must be an index into the
/// uploaded images.
fn banner_index(
    field: &str,
    raw: Option<String>,
    image_count: usize,
) -> Result<Option<usize>, ApiError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    match raw.parse::<usize>() {
        Ok(index) if index < image_count => Ok(Some(index)),
        _ => Err(ApiError::BadRequest(format!("Invalid {field}"))),
    }
}

/// Malformed career JSON degrades to an empty career.
pub fn parse_career(raw: Option<&str>) -> Career {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Career::new();
    };
    match serde_json::from_str::<Option<Career>>(raw) {
        Ok(career) => career.unwrap_or_default(),
        Err(err) => {
            tracing::warn!("ignoring malformed career data: {err}");
            Career::new()
        }
    }
}
