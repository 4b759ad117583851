//! OCR service REST client.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use vblur_media::{Frame, MediaError, MediaResult, TextDetection, TextDetector};

use crate::error::{OcrClientError, OcrResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};

/// OCR client configuration.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Service base URL (the client appends `/detect`)
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

impl OcrConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            base_url: std::env::var("OCR_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: secs("OCR_TIMEOUT_SECS", defaults.timeout),
            connect_timeout: secs("OCR_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            retry: RetryConfig::from_env(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    /// Base64-encoded PNG
    image: String,
    languages: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    polygon: Vec<[f64; 2]>,
    #[serde(default)]
    text: String,
    confidence: f64,
}

impl WireDetection {
    fn into_detection(self) -> OcrResult<TextDetection> {
        if !self.confidence.is_finite() {
            return Err(OcrClientError::InvalidResponse(format!(
                "non-finite confidence for {:?}",
                self.text
            )));
        }
        let polygon = self
            .polygon
            .iter()
            .map(|[x, y]| (x.round() as i32, y.round() as i32))
            .collect();
        Ok(TextDetection::new(polygon, self.text, self.confidence))
    }
}

/// HTTP client for the OCR service.
#[derive(Clone)]
pub struct OcrClient {
    http: Client,
    detect_url: String,
    retry: RetryConfig,
}

impl OcrClient {
    /// Create a new OCR client.
    pub fn new(config: OcrConfig) -> OcrResult<Self> {
        let base = config.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(OcrClientError::Config("OCR service URL is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vblur-ocr-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            detect_url: format!("{}/detect", base),
            retry: config.retry,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> OcrResult<Self> {
        Self::new(OcrConfig::from_env())
    }

    /// Detect text in an RGB frame.
    pub async fn detect_frame(
        &self,
        frame: &Frame,
        languages: &[String],
    ) -> OcrResult<Vec<TextDetection>> {
        let image = encode_png(frame)?;
        let body = DetectRequest { image, languages };

        let response = with_retry(&self.retry, || self.post_detect(&body)).await?;

        response
            .detections
            .into_iter()
            .map(WireDetection::into_detection)
            .collect()
    }

    async fn post_detect(&self, body: &DetectRequest<'_>) -> OcrResult<DetectResponse> {
        let started = Instant::now();
        let response = match self.http.post(&self.detect_url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                record_request(0, started.elapsed().as_secs_f64());
                return Err(e.into());
            }
        };

        let status = response.status();
        record_request(status.as_u16(), started.elapsed().as_secs_f64());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| OcrClientError::InvalidResponse(format!("{}", e)))
    }
}

#[async_trait]
impl TextDetector for OcrClient {
    async fn detect(&self, frame: &Frame, languages: &[String]) -> MediaResult<Vec<TextDetection>> {
        let detections = self.detect_frame(frame, languages).await.map_err(MediaError::from)?;
        debug!(count = detections.len(), "OCR detections received");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "ocr-http"
    }
}

fn encode_png(frame: &Frame) -> OcrResult<String> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8)
        .map_err(|e| OcrClientError::Encode(e.to_string()))?;
    Ok(BASE64.encode(png))
}
