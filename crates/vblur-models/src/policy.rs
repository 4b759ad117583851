//! Blur policy: what gets blurred and how strongly.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default Gaussian kernel size.
pub const DEFAULT_BLUR_STRENGTH: u32 = 51;

/// Default minimum detection confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Default padding around detected text, in pixels.
pub const DEFAULT_PADDING: u32 = 10;

/// Configuration for selecting and blurring text regions.
///
/// `strength` is always odd and at least 1. `target_words` is `None` to
/// blur every detected string; otherwise it holds lowercase, non-blank words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "RawBlurPolicy")]
pub struct BlurPolicy {
    /// Gaussian kernel size (both dimensions)
    strength: u32,
    /// Minimum detection confidence for a region to be considered
    pub confidence_threshold: f64,
    /// Words to blur (lowercase); `None` blurs all text
    target_words: Option<Vec<String>>,
    /// Extra pixels around each region
    pub padding: u32,
}

impl BlurPolicy {
    /// Create a policy, normalizing strength and target words.
    pub fn new<I, S>(
        strength: u32,
        confidence_threshold: f64,
        target_words: Option<I>,
        padding: u32,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            strength: normalize_strength(strength),
            confidence_threshold,
            target_words: target_words.and_then(normalize_words),
            padding,
        }
    }

    /// Policy that blurs every detected string with the default settings.
    pub fn blur_all() -> Self {
        Self::default()
    }

    /// Effective (odd) kernel size.
    pub fn strength(&self) -> u32 {
        self.strength
    }

    /// Lowercase target words, or `None` when every string matches.
    pub fn target_words(&self) -> Option<&[String]> {
        self.target_words.as_deref()
    }

    /// Replace the kernel size, normalizing it to an odd value.
    pub fn with_strength(mut self, strength: u32) -> Self {
        self.strength = normalize_strength(strength);
        self
    }
}

/// Wire form of [`BlurPolicy`]; deserialized values go through
/// [`BlurPolicy::new`].
#[derive(Deserialize)]
struct RawBlurPolicy {
    strength: u32,
    confidence_threshold: f64,
    #[serde(default)]
    target_words: Option<Vec<String>>,
    padding: u32,
}

impl From<RawBlurPolicy> for BlurPolicy {
    fn from(raw: RawBlurPolicy) -> Self {
        BlurPolicy::new(
            raw.strength,
            raw.confidence_threshold,
            raw.target_words,
            raw.padding,
        )
    }
}

impl Default for BlurPolicy {
    fn default() -> Self {
        Self {
            strength: DEFAULT_BLUR_STRENGTH,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            target_words: None,
            padding: DEFAULT_PADDING,
        }
    }
}

/// Round a kernel size up to the nearest odd value >= 1.
pub fn normalize_strength(strength: u32) -> u32 {
    if strength == 0 {
        1
    } else if strength % 2 == 0 {
        // u32::MAX is odd, so an even value never overflows here
        strength + 1
    } else {
        strength
    }
}

/// Lowercase, trim and drop blank words. An empty result means "blur all".
fn normalize_words<I, S>(words: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let words: Vec<String> = words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words)
    }
}
