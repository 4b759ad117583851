use vblur_models::BlurPolicy;

/// Decides whether recognized text should be obscured.
///
/// Matching is case-insensitive substring containment: the target `"cat"`
/// also matches `"Category"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionMatcher;

impl RegionMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn matches(&self, text: &str, policy: &BlurPolicy) -> bool {
        let Some(targets) = policy.target_words() else {
            return true;
        };

        if text.is_empty() {
            return false;
        }

        let text = text.to_lowercase();
        targets.iter().any(|word| text.contains(word.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(words: &[&str]) -> BlurPolicy {
        BlurPolicy::new(51, 0.5, Some(words.to_vec()), 10)
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let matcher = RegionMatcher::new();
        let policy = policy(&["confidential"]);

        assert!(matcher.matches("Confidential Report", &policy));
        assert!(matcher.matches("STRICTLY CONFIDENTIAL", &policy));
        assert!(!matcher.matches("Report", &policy));
    }

    #[test]
    fn test_substring_overmatches() {
        let matcher = RegionMatcher::new();
        assert!(matcher.matches("Category", &policy(&["cat"])));
    }

    #[test]
    fn test_no_targets_matches_everything() {
        let matcher = RegionMatcher::new();
        let policy = BlurPolicy::blur_all();

        assert!(matcher.matches("anything", &policy));
        assert!(matcher.matches("", &policy));
    }

    #[test]
    fn test_empty_text_never_matches_targets() {
        let matcher = RegionMatcher::new();
        assert!(!matcher.matches("", &policy(&["secret"])));
    }

    #[test]
    fn test_any_target_suffices() {
        let matcher = RegionMatcher::new();
        let policy = policy(&["password", "email"]);

        assert!(matcher.matches("E-mail or Email:", &policy));
        assert!(!matcher.matches("username", &policy));
    }
}
