//! The media streaming stack.
//!
//! An ingest bucket feeds a live input. The encoding channel assumes the
//! access role, reads the input and pushes to a packaging channel. An HLS
//! endpoint on that channel serves playback. The endpoint also carries an
//! explicit edge to its channel; it is implied by the `channelId`
//! reference and never shows up as an ordering hint.

use crate::config::{ChannelClass, PipelineConfig};
use crate::dag::StackGraph;
use crate::emit::Emitter;
use crate::error::GraphResult;
use crate::output::OutputBinding;
use crate::resource::{ResourceDescriptor, ResourceHandle};
use crate::value::PropertyValue;
use serde_json::json;
use streamstack_core::{LogicalId, ResourceKind};
use tracing::debug;

/// Logical id of the ingest bucket
pub const INPUT_BUCKET: &str = "MediaLiveInputBucket";
/// Logical id of the encoder access role
pub const ACCESS_ROLE: &str = "MediaLiveRole";
/// Logical id of the live input
pub const LIVE_INPUT: &str = "MediaLiveInput";
/// Logical id of the packaging channel
pub const PACKAGING_CHANNEL: &str = "MediaPackageChannel";
/// Logical id of the HLS packaging endpoint
pub const PACKAGING_ENDPOINT: &str = "MediaPackageEndpoint";
/// Logical id of the live channel
pub const LIVE_CHANNEL: &str = "MediaLiveChannel";

/// Destination id tying the encoder output group to the packaging channel
const PACKAGING_DESTINATION: &str = "destination1";

const MANAGED_POLICIES: [&str; 2] = [
    "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess",
    "arn:aws:iam::aws:policy/AWSElementalMediaPackageFullAccess",
];

/// Declares the media pipeline from a [`PipelineConfig`]
#[derive(Debug, Clone)]
pub struct MediaPipeline {
    config: PipelineConfig,
}

impl MediaPipeline {
    /// Create a pipeline declaration
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration in use
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Emitter carrying the stack description
    #[must_use]
    pub fn emitter(&self) -> Emitter {
        Emitter::new().with_description(self.config.description.clone())
    }

    /// Declare every resource and output of the stack
    ///
    /// # Errors
    ///
    /// Returns error if the encoder settings table is malformed
    pub fn declare(&self) -> GraphResult<StackGraph> {
        debug!(stack = %self.config.stack_name, "declaring media pipeline");
        let mut graph = StackGraph::new();

        let bucket = graph.add_resource(self.bucket()?)?;
        let role = graph.add_resource(self.role()?)?;
        let input = graph.add_resource(self.input(&bucket, &role)?)?;
        let packaging = graph.add_resource(self.packaging_channel()?)?;
        let endpoint = graph.add_resource(self.packaging_endpoint(&packaging)?)?;
        graph.add_edge(endpoint.logical_id(), packaging.logical_id())?;
        let channel = graph.add_resource(self.channel(&role, &input, &packaging)?)?;

        graph.add_output(
            OutputBinding::new(LogicalId::new("PlaybackUrl")?, endpoint.reference("url")?)
                .with_description("HLS playback URL"),
        )?;
        graph.add_output(
            OutputBinding::new(
                LogicalId::new("InputBucketName")?,
                bucket.reference("bucketName")?,
            )
            .with_description("Bucket holding source media"),
        )?;
        graph.add_output(
            OutputBinding::new(LogicalId::new("LiveChannelId")?, channel.reference("id")?)
                .with_description("Live channel to start and stop"),
        )?;

        Ok(graph)
    }

    fn tags(&self) -> Option<PropertyValue> {
        if self.config.tags.is_empty() {
            return None;
        }
        Some(PropertyValue::list(self.config.tags.iter().map(|(k, v)| {
            PropertyValue::map([("key", k.as_str()), ("value", v.as_str())])
        })))
    }

    fn bucket(&self) -> GraphResult<ResourceDescriptor> {
        let versioning = self
            .config
            .versioned
            .then(|| PropertyValue::map([("status", "Enabled")]));
        let lifecycle = (self.config.archive_expiration_days > 0).then(|| {
            PropertyValue::map([(
                "rules",
                PropertyValue::list([PropertyValue::map([
                    ("id", PropertyValue::from("ExpireArchive")),
                    ("status", PropertyValue::from("Enabled")),
                    (
                        "expirationInDays",
                        PropertyValue::from(self.config.archive_expiration_days),
                    ),
                ])]),
            )])
        });

        Ok(
            ResourceDescriptor::builder(ResourceKind::Bucket, LogicalId::new(INPUT_BUCKET)?)
                .optional_property("bucketName", self.config.bucket_name.clone())
                .optional_property("versioningConfiguration", versioning)
                .optional_property("lifecycleConfiguration", lifecycle)
                .optional_property("tags", self.tags())
                .deletion_policy(self.config.bucket_deletion_policy)
                .build(),
        )
    }

    fn role(&self) -> GraphResult<ResourceDescriptor> {
        let trust = PropertyValue::map([
            ("Version", PropertyValue::from("2012-10-17")),
            (
                "Statement",
                PropertyValue::list([PropertyValue::map([
                    ("Effect", PropertyValue::from("Allow")),
                    (
                        "Principal",
                        PropertyValue::map([("Service", "medialive.amazonaws.com")]),
                    ),
                    ("Action", PropertyValue::from("sts:AssumeRole")),
                ])]),
            ),
        ]);

        Ok(
            ResourceDescriptor::builder(ResourceKind::Role, LogicalId::new(ACCESS_ROLE)?)
                .property("assumeRolePolicyDocument", trust)
                .property("managedPolicyArns", PropertyValue::list(MANAGED_POLICIES))
                .optional_property("tags", self.tags())
                .build(),
        )
    }

    /// Standard channels run two pipelines and need one source per pipeline
    fn pipeline_count(&self) -> usize {
        match self.config.channel_class {
            ChannelClass::SinglePipeline => 1,
            ChannelClass::Standard => 2,
        }
    }

    fn input(&self, bucket: &ResourceHandle, role: &ResourceHandle) -> GraphResult<ResourceDescriptor> {
        let builder = ResourceDescriptor::builder(ResourceKind::Input, LogicalId::new(LIVE_INPUT)?)
            .property("name", self.config.input_name.as_str())
            .property("type", self.config.input_type.as_str())
            .property("roleArn", role.reference("arn")?);

        let builder = if self.config.input_type.reads_bucket() {
            let url = PropertyValue::join("", [
                PropertyValue::from("s3://"),
                PropertyValue::from(bucket.reference("bucketName")?),
                PropertyValue::from(format!("/{}", self.config.input_key)),
            ]);
            let sources =
                (0..self.pipeline_count()).map(|_| PropertyValue::map([("url", url.clone())]));
            builder.property("sources", PropertyValue::list(sources))
        } else {
            let streams = ["primary", "secondary"]
                .into_iter()
                .take(self.pipeline_count())
                .map(|name| {
                    PropertyValue::map([(
                        "streamName",
                        format!("{}/{}", self.config.stack_name, name),
                    )])
                });
            builder.property("destinations", PropertyValue::list(streams))
        };

        Ok(builder.build())
    }

    fn packaging_channel(&self) -> GraphResult<ResourceDescriptor> {
        Ok(ResourceDescriptor::builder(
            ResourceKind::PackagingChannel,
            LogicalId::new(PACKAGING_CHANNEL)?,
        )
        .property("id", self.config.packaging_channel_id.as_str())
        .property("description", "MediaPackage Channel for Live Stream")
        .optional_property("tags", self.tags())
        .build())
    }

    fn packaging_endpoint(&self, packaging: &ResourceHandle) -> GraphResult<ResourceDescriptor> {
        let startover = (self.config.startover_window_seconds > 0)
            .then_some(self.config.startover_window_seconds);

        Ok(ResourceDescriptor::builder(
            ResourceKind::PackagingEndpoint,
            LogicalId::new(PACKAGING_ENDPOINT)?,
        )
        .property("id", self.config.endpoint_id.as_str())
        .property("channelId", packaging.reference("channelId")?)
        .property("manifestName", self.config.manifest_name.as_str())
        .optional_property("startoverWindowSeconds", startover)
        .property("timeDelaySeconds", self.config.time_delay_seconds)
        .property(
            "hlsPackage",
            PropertyValue::map([
                (
                    "segmentDurationSeconds",
                    PropertyValue::from(self.config.segment_duration_seconds),
                ),
                (
                    "playlistWindowSeconds",
                    PropertyValue::from(self.config.playlist_window_seconds),
                ),
                ("useAudioRenditionGroup", PropertyValue::from(false)),
                (
                    "streamSelection",
                    PropertyValue::map([("streamOrder", "ORIGINAL")]),
                ),
            ]),
        )
        .optional_property("tags", self.tags())
        .build())
    }

    fn channel(
        &self,
        role: &ResourceHandle,
        input: &ResourceHandle,
        packaging: &ResourceHandle,
    ) -> GraphResult<ResourceDescriptor> {
        let encoder_settings = match &self.config.encoder_settings {
            Some(settings) => PropertyValue::from_json(settings.clone())?,
            None => PropertyValue::from_json(default_encoder_settings())?,
        };

        Ok(
            ResourceDescriptor::builder(ResourceKind::Channel, LogicalId::new(LIVE_CHANNEL)?)
                .property("name", self.config.channel_name.as_str())
                .property("channelClass", self.config.channel_class.as_str())
                .property("roleArn", role.reference("arn")?)
                .property(
                    "inputAttachments",
                    PropertyValue::list([PropertyValue::map([
                        ("inputAttachmentName", PropertyValue::from("InputAttachment")),
                        ("inputId", PropertyValue::from(input.reference("id")?)),
                    ])]),
                )
                .property(
                    "destinations",
                    PropertyValue::list([PropertyValue::map([
                        ("id", PropertyValue::from(PACKAGING_DESTINATION)),
                        (
                            "mediaPackageSettings",
                            PropertyValue::list([PropertyValue::map([(
                                "channelId",
                                packaging.reference("channelId")?,
                            )])]),
                        ),
                    ])]),
                )
                .property("encoderSettings", encoder_settings)
                .build(),
        )
    }
}

/// One 1080p30 AVC rendition with stereo AAC, sent to the packaging
/// destination
fn default_encoder_settings() -> serde_json::Value {
    json!({
        "timecodeConfig": { "source": "SYSTEMCLOCK" },
        "videoDescriptions": [{
            "name": "video_1080p30",
            "width": 1920,
            "height": 1080,
            "codecSettings": {
                "h264Settings": {
                    "rateControlMode": "CBR",
                    "bitrate": 5_000_000,
                    "framerateControl": "SPECIFIED",
                    "framerateNumerator": 30,
                    "framerateDenominator": 1,
                    "parControl": "SPECIFIED",
                    "parNumerator": 1,
                    "parDenominator": 1
                }
            }
        }],
        "audioDescriptions": [{
            "name": "audio_1",
            "languageCode": "eng",
            "codecSettings": {
                "aacSettings": {
                    "bitrate": 96000,
                    "codingMode": "CODING_MODE_2_0",
                    "inputType": "NORMAL",
                    "profile": "LC",
                    "rateControlMode": "CBR",
                    "rawFormat": "NONE",
                    "sampleRate": 48000,
                    "spec": "MPEG4"
                }
            }
        }],
        "outputGroups": [{
            "name": "MediaPackageGroup",
            "outputGroupSettings": {
                "mediaPackageGroupSettings": {
                    "destination": { "destinationRefId": PACKAGING_DESTINATION }
                }
            },
            "outputs": [{
                "outputName": "Output1",
                "videoDescriptionName": "video_1080p30",
                "audioDescriptionNames": ["audio_1"],
                "outputSettings": { "mediaPackageOutputSettings": {} }
            }]
        }]
    })
}
