use std::str::FromStr;

use chrono::Utc;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

pub const IMAGE_URL_PREFIX: &str = "/images/";

/// How a new artist's id is derived from the submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdScheme {
    /// `artist_<epoch-millis>`
    Timestamp,
    /// Slug of the English name, falling back to the display name.
    Slug,
}

impl FromStr for IdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Ok(IdScheme::Timestamp),
            "slug" => Ok(IdScheme::Slug),
            other => Err(format!("unknown id scheme {other:?}")),
        }
    }
}

pub fn timestamp_id() -> String {
    format!("artist_{}", Utc::now().timestamp_millis())
}

/// Lower-cases `name` and replaces every char outside `[a-z0-9]` with `_`.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn random_suffix() -> String {
    let mut bytes = [0u8; 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `image_<position>.<ext>`, with `position` 1-based.
pub fn safe_file_name(position: usize, original: Option<&str>, content_type: &str) -> String {
    let ext = original
        .and_then(extension_of)
        .or_else(|| extension_for_content_type(content_type).map(str::to_string));
    match ext {
        Some(ext) => format!("image_{position}.{ext}"),
        None => format!("image_{position}"),
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext: String = ext
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    (!ext.is_empty()).then_some(ext)
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let base = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match base.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

pub fn object_key(artist_id: &str, file_name: &str) -> String {
    format!("{artist_id}/{file_name}")
}

pub fn image_url(key: &str) -> String {
    format!("{IMAGE_URL_PREFIX}{key}")
}

/// Recovers the object key behind a public image URL. URLs that do not point
/// into the image namespace yield `None`.
pub fn object_key_from_url(url: &str) -> Option<&str> {
    url.strip_prefix(IMAGE_URL_PREFIX).filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_everything_outside_alnum() {
        assert_eq!(slugify("Jane Doe"), "jane_doe");
        assert_eq!(slugify("Kim Min-Ji 2"), "kim_min_ji_2");
        assert_eq!(slugify("  O'Neil  "), "o_neil");
        assert_eq!(slugify("김민지"), "___");
    }

    #[test]
    fn timestamp_ids_are_prefixed_millis() {
        let id = timestamp_id();
        let millis = id.strip_prefix("artist_").unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
    }

    #[test]
    fn safe_names_keep_original_extension() {
        assert_eq!(safe_file_name(1, Some("a.png"), "image/png"), "image_1.png");
        assert_eq!(safe_file_name(2, Some("Photo.JPEG"), "image/jpeg"), "image_2.jpeg");
        assert_eq!(safe_file_name(3, Some("../../etc/pa.ss/wd.p?g"), "image/png"), "image_3.pg");
    }

    #[test]
    fn safe_names_fall_back_to_content_type() {
        assert_eq!(safe_file_name(1, Some("scan"), "image/jpeg"), "image_1.jpg");
        assert_eq!(safe_file_name(1, None, "image/webp"), "image_1.webp");
        assert_eq!(safe_file_name(4, Some(".hidden"), "application/octet-stream"), "image_4");
    }

    #[test]
    fn urls_and_keys() {
        let key = object_key("artist_1", "image_1.png");
        assert_eq!(key, "artist_1/image_1.png");
        assert_eq!(image_url(&key), "/images/artist_1/image_1.png");
        assert_eq!(
            object_key_from_url("/images/artist_1/image_1.png"),
            Some("artist_1/image_1.png")
        );
        assert_eq!(object_key_from_url("https://cdn.example/x.png"), None);
        assert_eq!(object_key_from_url("/images/"), None);
    }

    #[test]
    fn id_scheme_names() {
        assert_eq!("slug".parse::<IdScheme>().unwrap(), IdScheme::Slug);
        assert_eq!("Timestamp".parse::<IdScheme>().unwrap(), IdScheme::Timestamp);
        assert!("uuid".parse::<IdScheme>().is_err());
    }
}
