/// A photo as listed by the native shell. Intermediate size URLs may be empty when the
/// original was too small for that rendition to be generated.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PhotoMetadata {
    pub id: String,
    pub original_name: String,
    pub upload_date: String,
    pub file_size: u64,
    pub thumbnail_url: String,
    #[serde(default)]
    pub small_url: String,
    #[serde(default)]
    pub medium_url: String,
    #[serde(default)]
    pub large_url: String,
    pub original_url: String,
    pub width: u32,
    pub height: u32,
}

/// Payload of the `upload-progress` event.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_name: String,
    #[serde(deserialize_with = "percent")]
    pub progress: u8,
    pub status: String,
}

impl UploadProgress {
    pub fn new(file_name: impl Into<String>, progress: u8, status: impl Into<String>) -> Self {
        UploadProgress {
            file_name: file_name.into(),
            progress: progress.min(100),
            status: status.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100
    }
}

// The shell reports fractional percentages.
fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <f64 as serde::Deserialize>::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, 100.0) as u8)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl S3Config {
    /// Name of the first empty field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("accessKey", &self.access_key),
            ("secretKey", &self.secret_key),
        ]
        .iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
    }

    pub fn is_configured(&self) -> bool {
        self.missing_field().is_none()
    }
}

/// Returned by `google_login`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
    pub has_s3_config: bool,
}

/// Returned by `check_drive_permission`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveStatus {
    pub has_drive_access: bool,
    pub last_config_sync: Option<String>,
    pub last_metadata_sync: Option<String>,
    pub pending_changes: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percentages_are_rounded_and_clamped() {
        let event: UploadProgress = serde_json::from_str(
            r#"{"fileName": "a.jpg", "progress": 33.333, "status": "Processing"}"#,
        )
        .unwrap();
        assert_eq!(event.progress, 33);

        let event: UploadProgress =
            serde_json::from_str(r#"{"fileName": "a.jpg", "progress": 140, "status": "x"}"#)
                .unwrap();
        assert_eq!(event.progress, 100);
        assert!(event.is_complete());
    }

    #[test]
    fn missing_intermediate_urls_default_to_empty() {
        let photo: PhotoMetadata = serde_json::from_str(
            r#"{
                "id": "p1",
                "original_name": "beach.jpg",
                "upload_date": "2024-01-01T10:00:00Z",
                "file_size": 1024,
                "thumbnail_url": "https://b.s3.eu-west-1.amazonaws.com/photos/p1/thumbnail.jpg",
                "original_url": "https://b.s3.eu-west-1.amazonaws.com/photos/p1/original.jpg",
                "width": 300,
                "height": 200
            }"#,
        )
        .unwrap();
        assert!(photo.small_url.is_empty());
        assert!(photo.large_url.is_empty());
    }

    #[test]
    fn s3_config_reports_first_missing_field() {
        let mut config = S3Config {
            bucket: "photos".into(),
            region: "eu-west-1".into(),
            access_key: " ".into(),
            secret_key: String::new(),
        };
        assert_eq!(config.missing_field(), Some("accessKey"));

        config.access_key = "AKIA".into();
        config.secret_key = "secret".into();
        assert!(config.is_configured());
    }
}
