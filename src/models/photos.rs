use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use galleria_api_structs::PhotoMetadata;

pub type PhotoId = String;

/// The renditions generated for every upload, smallest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeVariant {
    Thumbnail,
    Small,
    Medium,
    Large,
    Original,
}

impl SizeVariant {
    pub const ALL: [SizeVariant; 5] = [
        SizeVariant::Thumbnail,
        SizeVariant::Small,
        SizeVariant::Medium,
        SizeVariant::Large,
        SizeVariant::Original,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeVariant::Thumbnail => "thumbnail",
            SizeVariant::Small => "small",
            SizeVariant::Medium => "medium",
            SizeVariant::Large => "large",
            SizeVariant::Original => "original",
        }
    }

    /// Bound on the longest edge of the rendition, `None` for the original.
    pub fn max_edge(&self) -> Option<u32> {
        match self {
            SizeVariant::Thumbnail => Some(200),
            SizeVariant::Small => Some(640),
            SizeVariant::Medium => Some(1280),
            SizeVariant::Large => Some(1920),
            SizeVariant::Original => None,
        }
    }

    pub fn next_larger(&self) -> Option<SizeVariant> {
        match self {
            SizeVariant::Thumbnail => Some(SizeVariant::Small),
            SizeVariant::Small => Some(SizeVariant::Medium),
            SizeVariant::Medium => Some(SizeVariant::Large),
            SizeVariant::Large => Some(SizeVariant::Original),
            SizeVariant::Original => None,
        }
    }
}

impl fmt::Display for SizeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown size variant {0:?}")]
pub struct UnknownSizeVariant(pub String);

impl FromStr for SizeVariant {
    type Err = UnknownSizeVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeVariant::ALL
            .iter()
            .copied()
            .find(|variant| variant.as_str() == s)
            .ok_or_else(|| UnknownSizeVariant(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Photo {
    pub id: PhotoId,
    pub original_name: String,
    pub upload_date: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
    pub thumbnail: String,
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub original: String,
}

impl Photo {
    /// The stored reference for exactly this variant.
    pub fn reference(&self, size: SizeVariant) -> Option<&str> {
        match size {
            SizeVariant::Thumbnail => Some(self.thumbnail.as_str()),
            SizeVariant::Small => self.small.as_deref(),
            SizeVariant::Medium => self.medium.as_deref(),
            SizeVariant::Large => self.large.as_deref(),
            SizeVariant::Original => Some(self.original.as_str()),
        }
    }

    /// Remote URL for `size`, walking up to the next larger rendition when it was never
    /// generated. Always resolves since every photo carries an original.
    pub fn url_for(&self, size: SizeVariant) -> &str {
        let mut current = Some(size);
        while let Some(variant) = current {
            if let Some(url) = self.reference(variant) {
                return url;
            }
            current = variant.next_larger();
        }
        &self.original
    }

    /// Pixel size of the rendition, used to reserve layout space before it loads.
    pub fn dimensions_for(&self, size: SizeVariant) -> Dimensions {
        let longest = self.width.max(self.height);
        match size.max_edge() {
            Some(bound) if longest > bound => {
                let scale = |edge: u32| {
                    ((u64::from(edge) * u64::from(bound) + u64::from(longest) / 2)
                        / u64::from(longest)) as u32
                };
                Dimensions {
                    width: scale(self.width),
                    height: scale(self.height),
                }
            },
            _ => Dimensions {
                width: self.width,
                height: self.height,
            },
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("photo {id} has no {missing} reference")]
pub struct InvalidPhoto {
    pub id: PhotoId,
    pub missing: SizeVariant,
}

fn non_empty(url: String) -> Option<String> {
    if url.trim().is_empty() {
        None
    } else {
        Some(url)
    }
}

impl TryFrom<PhotoMetadata> for Photo {
    type Error = InvalidPhoto;

    fn try_from(p: PhotoMetadata) -> Result<Self, Self::Error> {
        let thumbnail = non_empty(p.thumbnail_url).ok_or_else(|| InvalidPhoto {
            id: p.id.clone(),
            missing: SizeVariant::Thumbnail,
        })?;
        let original = non_empty(p.original_url).ok_or_else(|| InvalidPhoto {
            id: p.id.clone(),
            missing: SizeVariant::Original,
        })?;

        Ok(Photo {
            id: p.id,
            original_name: p.original_name,
            upload_date: p.upload_date,
            file_size: p.file_size,
            width: p.width,
            height: p.height,
            thumbnail,
            small: non_empty(p.small_url),
            medium: non_empty(p.medium_url),
            large: non_empty(p.large_url),
            original,
        })
    }
}

impl From<Photo> for PhotoMetadata {
    fn from(p: Photo) -> Self {
        PhotoMetadata {
            id: p.id,
            original_name: p.original_name,
            upload_date: p.upload_date,
            file_size: p.file_size,
            thumbnail_url: p.thumbnail,
            small_url: p.small.unwrap_or_default(),
            medium_url: p.medium.unwrap_or_default(),
            large_url: p.large.unwrap_or_default(),
            original_url: p.original,
            width: p.width,
            height: p.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> PhotoMetadata {
        PhotoMetadata {
            id: "p1".into(),
            original_name: "harbour.jpg".into(),
            upload_date: "2024-03-02T08:15:00Z".into(),
            file_size: 2_400_000,
            thumbnail_url: "https://cdn/p1/thumbnail.jpg".into(),
            small_url: "https://cdn/p1/small.jpg".into(),
            medium_url: String::new(),
            large_url: String::new(),
            original_url: "https://cdn/p1/original.jpg".into(),
            width: 1000,
            height: 750,
        }
    }

    #[test]
    fn missing_intermediate_sizes_fall_back_to_next_larger() {
        let photo = Photo::try_from(metadata()).unwrap();

        assert_eq!(photo.url_for(SizeVariant::Small), "https://cdn/p1/small.jpg");
        assert_eq!(photo.url_for(SizeVariant::Medium), "https://cdn/p1/original.jpg");
        assert_eq!(photo.url_for(SizeVariant::Large), "https://cdn/p1/original.jpg");
    }

    #[test]
    fn photos_without_original_are_rejected() {
        let mut p = metadata();
        p.original_url = String::new();

        assert_eq!(
            Photo::try_from(p),
            Err(InvalidPhoto {
                id: "p1".into(),
                missing: SizeVariant::Original,
            })
        );
    }

    #[test]
    fn dimensions_are_capped_but_never_upscaled() {
        let photo = Photo::try_from(metadata()).unwrap();

        assert_eq!(
            photo.dimensions_for(SizeVariant::Thumbnail),
            Dimensions {
                width: 200,
                height: 150
            }
        );
        assert_eq!(
            photo.dimensions_for(SizeVariant::Large),
            Dimensions {
                width: 1000,
                height: 750
            }
        );
    }

    #[test]
    fn size_variants_parse_from_wire_names() {
        for variant in SizeVariant::ALL.iter() {
            assert_eq!(variant.as_str().parse::<SizeVariant>(), Ok(*variant));
        }
        assert!("huge".parse::<SizeVariant>().is_err());
    }
}
