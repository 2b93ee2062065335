//! Media pipeline configuration.
//!
//! Every field has a default so an empty JSON object describes a working
//! single-pipeline stack.

use crate::resource::DeletionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use streamstack_core::{CoreError, CoreResult};

/// How the live input receives its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    /// File looped from the ingest bucket
    Mp4File,
    /// Pull from a URL under the ingest bucket
    UrlPull,
    /// RTMP stream pushed by the contributor
    RtmpPush,
}

impl InputType {
    /// Engine value for the input `type` property
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4File => "MP4_FILE",
            Self::UrlPull => "URL_PULL",
            Self::RtmpPush => "RTMP_PUSH",
        }
    }

    /// Whether the input reads from the ingest bucket
    #[must_use]
    pub const fn reads_bucket(&self) -> bool {
        matches!(self, Self::Mp4File | Self::UrlPull)
    }
}

/// Encoder redundancy class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelClass {
    /// One encoding pipeline
    SinglePipeline,
    /// Two redundant pipelines
    Standard,
}

impl ChannelClass {
    /// Engine value for the channel `channelClass` property
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePipeline => "SINGLE_PIPELINE",
            Self::Standard => "STANDARD",
        }
    }
}

/// Configuration of the media pipeline stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Stack name; prefixes RTMP stream paths
    pub stack_name: String,
    /// Template description
    pub description: String,
    /// Physical bucket name; generated by the engine when absent
    pub bucket_name: Option<String>,
    /// Keep object versions in the ingest bucket
    pub versioned: bool,
    /// Days before archived objects expire (0 = never)
    pub archive_expiration_days: u32,
    /// What happens to the ingest bucket when the stack is deleted
    pub bucket_deletion_policy: DeletionPolicy,
    /// Input source type
    pub input_type: InputType,
    /// Physical name of the live input
    pub input_name: String,
    /// Object key of the source file for bucket-backed inputs
    pub input_key: String,
    /// Physical name of the live channel
    pub channel_name: String,
    /// Encoder redundancy
    pub channel_class: ChannelClass,
    /// Physical id of the packaging channel
    pub packaging_channel_id: String,
    /// Physical id of the packaging endpoint
    pub endpoint_id: String,
    /// HLS manifest name
    pub manifest_name: String,
    /// HLS segment duration
    pub segment_duration_seconds: u32,
    /// HLS playlist window
    pub playlist_window_seconds: u32,
    /// Start-over window (0 = disabled)
    pub startover_window_seconds: u32,
    /// Delay applied to the live playlist
    pub time_delay_seconds: u32,
    /// Opaque encoder settings table; the built-in table when absent
    pub encoder_settings: Option<serde_json::Value>,
    /// Tags applied to every taggable resource
    pub tags: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stack_name: "MediaServicesStack".to_string(),
            description: "Live media streaming pipeline".to_string(),
            bucket_name: None,
            versioned: true,
            archive_expiration_days: 0,
            bucket_deletion_policy: DeletionPolicy::Delete,
            input_type: InputType::Mp4File,
            input_name: "MediaLiveInput".to_string(),
            input_key: "example.mp4".to_string(),
            channel_name: "LiveChannel".to_string(),
            channel_class: ChannelClass::SinglePipeline,
            packaging_channel_id: "MediaPackageChannelId".to_string(),
            endpoint_id: "MediaPackageEndpointId".to_string(),
            manifest_name: "index".to_string(),
            segment_duration_seconds: 10,
            playlist_window_seconds: 60,
            startover_window_seconds: 1800,
            time_delay_seconds: 0,
            encoder_settings: None,
            tags: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Parse from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or a value is invalid
    pub fn from_json_str(input: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&input)
    }

    /// Check value constraints serde cannot express
    ///
    /// # Errors
    ///
    /// Returns the first offending field
    pub fn validate(&self) -> CoreResult<()> {
        let non_empty = [
            ("stack_name", &self.stack_name),
            ("input_name", &self.input_name),
            ("channel_name", &self.channel_name),
            ("packaging_channel_id", &self.packaging_channel_id),
            ("endpoint_id", &self.endpoint_id),
            ("manifest_name", &self.manifest_name),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(config_error(field, "must not be empty"));
            }
        }
        if self.input_type.reads_bucket() && self.input_key.trim().is_empty() {
            return Err(config_error("input_key", "required for bucket-backed inputs"));
        }
        if self.segment_duration_seconds == 0 {
            return Err(config_error("segment_duration_seconds", "must be positive"));
        }
        if self.playlist_window_seconds < self.segment_duration_seconds {
            return Err(config_error(
                "playlist_window_seconds",
                "must be at least one segment long",
            ));
        }
        if let Some(settings) = &self.encoder_settings {
            if !settings.is_object() {
                return Err(config_error("encoder_settings", "must be a JSON object"));
            }
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: &str) -> CoreError {
    CoreError::Config {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
