use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::IMAGE_URL_PREFIX;

/// Career history: category (`drama`, `movie`, ...) to entries by year.
pub type Career = BTreeMap<String, Vec<CareerEntry>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerEntry {
    #[serde(deserialize_with = "lenient_number")]
    pub year: i32,
    #[serde(default)]
    pub works: Vec<String>,
}

/// An artist as the handlers see it. Always in the current shape; documents
/// written by older revisions are normalized on the way in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ArtistDocument", into = "ArtistDocument")]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
    pub english_name: Option<String>,
    pub short_intro: Option<String>,
    pub images: Vec<String>,
    pub career: Career,
    pub home_banner_index: Option<usize>,
    pub artists_banner_index: Option<usize>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ArtistRecord {
    pub fn home_banner(&self) -> Option<&str> {
        self.image_at(self.home_banner_index)
    }

    pub fn artists_banner(&self) -> Option<&str> {
        self.image_at(self.artists_banner_index)
    }

    fn image_at(&self, index: Option<usize>) -> Option<&str> {
        index.and_then(|i| self.images.get(i)).map(String::as_str)
    }

    /// Every image URL the record references.
    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(String::as_str)
    }
}

/// Wire shape of an artist document. Reads accept every field any revision
/// ever wrote; writes only emit the current ones.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_intro: Option<String>,
    /// Written as a copy of `short_intro` for clients that still read `bio`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub career: Career,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_index"
    )]
    pub home_banner_index: Option<usize>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_index"
    )]
    pub artists_banner_index: Option<usize>,
    #[serde(default, skip_serializing, deserialize_with = "lenient_index")]
    pub banner_image_index: Option<usize>,
    /// Written as `[artists_banner_index]` for the portfolio grid.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient_indices"
    )]
    pub artists_banner_indices: Vec<usize>,
    #[serde(default, skip_serializing)]
    pub banner_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub home_banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub artists_banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ArtistDocument> for ArtistRecord {
    fn from(doc: ArtistDocument) -> Self {
        let mut images = doc.images;

        let legacy_banner = doc.banner_image.filter(|url| url.starts_with(IMAGE_URL_PREFIX));
        let legacy_banner_index = match legacy_banner {
            Some(url) => match images.iter().position(|u| *u == url) {
                Some(i) => Some(i),
                None => {
                    images.push(url);
                    Some(images.len() - 1)
                }
            },
            None => None,
        };
        let legacy_index = doc.banner_image_index.or(legacy_banner_index);

        let home = doc.home_banner_index.or(legacy_index);
        let artists = doc
            .artists_banner_index
            .or_else(|| doc.artists_banner_indices.first().copied())
            .or(legacy_index);

        let in_range = |field: &str, index: Option<usize>| match index {
            Some(i) if i >= images.len() => {
                tracing::warn!(
                    artist = %doc.id,
                    field,
                    index = i,
                    images = images.len(),
                    "dropping out-of-range banner index"
                );
                None
            }
            other => other,
        };
        let home_banner_index = in_range("homeBannerIndex", home);
        let artists_banner_index = in_range("artistsBannerIndex", artists);

        ArtistRecord {
            id: doc.id,
            name: doc.name,
            english_name: doc.english_name.filter(|n| !n.is_empty()),
            short_intro: doc.short_intro.or(doc.bio),
            images,
            career: doc.career,
            home_banner_index,
            artists_banner_index,
            created_at: doc.created_at,
        }
    }
}

impl From<ArtistRecord> for ArtistDocument {
    fn from(record: ArtistRecord) -> Self {
        let home_banner = record.home_banner().map(str::to_string);
        let artists_banner = record.artists_banner().map(str::to_string);
        let artists_banner_indices = record.artists_banner_index.into_iter().collect();
        ArtistDocument {
            id: record.id,
            name: record.name,
            english_name: record.english_name,
            bio: record.short_intro.clone(),
            short_intro: record.short_intro,
            images: record.images,
            career: record.career,
            home_banner_index: record.home_banner_index,
            artists_banner_index: record.artists_banner_index,
            artists_banner_indices,
            home_banner,
            artists_banner,
            created_at: record.created_at,
            ..ArtistDocument::default()
        }
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Numbers that older front-ends may have sent as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

impl NumberOrString {
    fn to_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = NumberOrString::deserialize(deserializer)?;
    raw.to_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| serde::de::Error::custom("expected an integer year"))
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|r| r.to_i64())
        .and_then(|n| usize::try_from(n).ok()))
}

fn lenient_indices<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<NumberOrString>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(NumberOrString::to_i64)
        .filter_map(|n| usize::try_from(n).ok())
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
