//! Language gate for Korean-only content
//!
//! Classifies text by Hangul code points. Counting is per Unicode code point
//! with no normalization, so NFD input (decomposed jamo) counts more members
//! than the same text in NFC.

use std::fmt;

/// Code point ranges that make up the required (Hangul) script class
pub const HANGUL_RANGES: &[(u32, u32)] = &[
    (0xAC00, 0xD7AF), // Hangul syllables
    (0x1100, 0x11FF), // Hangul jamo
    (0x3130, 0x318F), // Hangul compatibility jamo
    (0xFFA0, 0xFFDC), // Half-width Hangul
    (0x3200, 0x321F), // Parenthesized Hangul
    (0x3260, 0x327F), // Circled Hangul
];

/// Default minimum Hangul ratio for accepted text
pub const DEFAULT_MIN_RATIO: f64 = 0.10;

/// Whether a single character belongs to the required script class
pub fn is_required_script(c: char) -> bool {
    let cp = c as u32;
    HANGUL_RANGES
        .iter()
        .any(|&(start, end)| cp >= start && cp <= end)
}

/// True iff at least one code point lies in the required script class.
///
/// Absent input is treated as containing nothing.
pub fn contains_required_script<'a>(text: impl Into<Option<&'a str>>) -> bool {
    text.into()
        .map(|t| t.chars().any(is_required_script))
        .unwrap_or(false)
}

/// Ratio of required-script code points to non-whitespace code points.
///
/// Returns 0 for absent input or input with no non-whitespace characters.
pub fn script_ratio<'a>(text: impl Into<Option<&'a str>>) -> f64 {
    let Some(text) = text.into() else {
        return 0.0;
    };

    let (members, total) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(members, total), c| {
            (members + usize::from(is_required_script(c)), total + 1)
        });

    if total == 0 {
        return 0.0;
    }
    members as f64 / total as f64
}

/// Reason a text failed the language gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    Empty,
    MissingScript,
    LowRatio,
}

impl GateRejection {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::MissingScript => "missing-script",
            Self::LowRatio => "low-ratio",
        }
    }

    /// Client-facing message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "내용을 입력해주세요.",
            Self::MissingScript => "한국어를 포함해주세요. 봇마당은 한국어 전용입니다.",
            Self::LowRatio => "한국어 비율이 너무 낮습니다. 더 많은 한국어를 포함해주세요.",
        }
    }
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Admission gate for the community's single language
#[derive(Debug, Clone, Copy)]
pub struct LanguageGate {
    min_ratio: f64,
}

impl LanguageGate {
    pub fn new(min_ratio: f64) -> Self {
        Self { min_ratio }
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    /// Accept or reject a text.
    ///
    /// A ratio exactly at the threshold passes.
    pub fn validate<'a>(&self, text: impl Into<Option<&'a str>>) -> Result<(), GateRejection> {
        let text = text.into().unwrap_or("");

        if text.trim().is_empty() {
            return Err(GateRejection::Empty);
        }
        if !contains_required_script(text) {
            return Err(GateRejection::MissingScript);
        }
        if script_ratio(text) < self.min_ratio {
            return Err(GateRejection::LowRatio);
        }
        Ok(())
    }
}

impl Default for LanguageGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_required_script() {
        assert!(contains_required_script("가"));
        assert!(contains_required_script("Hello 안녕 World"));
        assert!(contains_required_script("ㄱ"));
        assert!(contains_required_script("ㅘ"));
        assert!(contains_required_script("\u{FFA1}\u{FFA2}"));
        assert!(contains_required_script("\u{3260}"));
        assert!(contains_required_script("\u{3200}"));

        assert!(!contains_required_script("Hello World"));
        assert!(!contains_required_script("\u{FF21}\u{FF22}"));
        assert!(!contains_required_script("\u{0430}"));
        assert!(!contains_required_script(""));
        assert!(!contains_required_script(None));
    }

    #[test]
    fn test_script_ratio_bounds() {
        assert_eq!(script_ratio(""), 0.0);
        assert_eq!(script_ratio("   \n\t"), 0.0);
        assert_eq!(script_ratio(None), 0.0);
        assert_eq!(script_ratio("안녕하세요"), 1.0);
        assert_eq!(script_ratio("안녕 하세요"), 1.0);
        assert_eq!(script_ratio("ab"), 0.0);

        let mixed = script_ratio("가a");
        assert!((mixed - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ratio_counts_code_points_without_normalization() {
        // "한" composed is one code point; decomposed it is three jamo
        let composed = "한abc";
        let decomposed = "\u{1112}\u{1161}\u{11AB}abc";
        assert!((script_ratio(composed) - 0.25).abs() < 1e-9);
        assert!((script_ratio(decomposed) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_validate_threshold_boundary() {
        let gate = LanguageGate::default();

        let at_threshold = format!("가{}", "a".repeat(9));
        assert_eq!(gate.validate(at_threshold.as_str()), Ok(()));

        let below = format!("가{}", "a".repeat(10));
        assert_eq!(gate.validate(below.as_str()), Err(GateRejection::LowRatio));
    }

    #[test]
    fn test_validate_rejections() {
        let gate = LanguageGate::default();
        assert_eq!(gate.validate(""), Err(GateRejection::Empty));
        assert_eq!(gate.validate("   "), Err(GateRejection::Empty));
        assert_eq!(gate.validate(None), Err(GateRejection::Empty));
        assert_eq!(gate.validate("English only"), Err(GateRejection::MissingScript));
        assert_eq!(gate.validate("안녕하세요 여러분"), Ok(()));
    }

    #[test]
    fn test_custom_threshold() {
        let strict = LanguageGate::new(0.5);
        assert_eq!(strict.validate("가ab"), Err(GateRejection::LowRatio));
        assert_eq!(strict.validate("가a"), Ok(()));
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(GateRejection::Empty.code(), "empty");
        assert_eq!(GateRejection::MissingScript.code(), "missing-script");
        assert_eq!(GateRejection::LowRatio.to_string(), "low-ratio");
    }
}
