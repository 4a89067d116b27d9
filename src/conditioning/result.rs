//! Outcome of one conditioning invocation.
use super::ConditioningType;
use crate::error::ConditioningError;
use crate::image::io::encode_png_base64;
use crate::image::Raster;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Method diagnostics (`edge_density`, `depth_range`, `input_size`, ...).
pub type Metadata = BTreeMap<String, Value>;

/// Result of a single generation. `success == false` implies `image == None`;
/// `quality_score` is only meaningful on success.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConditioningResult {
    pub success: bool,
    #[serde(skip)]
    pub image: Option<Raster>,
    pub method_used: String,
    pub processing_time_ms: u64,
    pub quality_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metadata: Metadata,
}

impl ConditioningResult {
    pub fn succeeded(
        image: Raster,
        method_used: impl Into<String>,
        processing_time_ms: u64,
        quality_score: f32,
        metadata: Metadata,
    ) -> Self {
        Self {
            success: true,
            image: Some(image),
            method_used: method_used.into(),
            processing_time_ms,
            quality_score: quality_score.clamp(0.0, 1.0),
            error_message: None,
            metadata,
        }
    }

    pub fn failed(method_used: impl Into<String>, error: &ConditioningError, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            image: None,
            method_used: method_used.into(),
            processing_time_ms,
            quality_score: 0.0,
            error_message: Some(error.to_string()),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Re-encode the image as a base64 PNG channel for a downstream
    /// multi-channel pipeline. Failed results carry no channel.
    pub fn to_guidance_channel(
        &self,
        kind: ConditioningType,
        weight: f32,
    ) -> Result<Option<GuidanceChannel>, ConditioningError> {
        let Some(image) = self.image.as_ref() else {
            return Ok(None);
        };
        Ok(Some(GuidanceChannel {
            kind,
            method: self.method_used.clone(),
            weight,
            image_base64: encode_png_base64(image)?,
        }))
    }
}

/// Transport form of a guidance image plus its steering weight.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GuidanceChannel {
    pub kind: ConditioningType,
    pub method: String,
    pub weight: f32,
    pub image_base64: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::io::decode_png_base64;

    #[test]
    fn failure_has_no_image() {
        let err = ConditioningError::UnknownMethod("nope".into());
        let r = ConditioningResult::failed("nope", &err, 3);
        assert!(!r.success);
        assert!(r.image.is_none());
        assert_eq!(r.error_message.as_deref(), Some("Unknown method: nope"));
        assert_eq!(r.to_guidance_channel(ConditioningType::Edge, 1.0), Ok(None));
    }

    #[test]
    fn guidance_channel_round_trips_png() {
        let img = Raster::from_gray(4, 3, (0..12).map(|v| v * 20).collect()).unwrap();
        let r = ConditioningResult::succeeded(img.clone(), "opencv_canny", 1, 0.7, Metadata::new());
        let channel = r.to_guidance_channel(ConditioningType::Edge, 0.8).unwrap().unwrap();
        assert_eq!(channel.weight, 0.8);
        assert_eq!(decode_png_base64(&channel.image_base64).unwrap(), img);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("image").is_none());
        assert_eq!(json["method_used"], "opencv_canny");
    }
}
