//! Risk score shown to streaming clients
//!
//! Placeholder policy: substring matches on the risk analyst's text,
//! until the risk analyst returns a structured score of its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskScore {
    /// 0-100
    pub score: u8,
    pub label: &'static str,
}

const HIGH_SCORE: u8 = 70;
const WITHIN_SCORE: u8 = 25;
const DEFAULT_SCORE: u8 = 35;
const HIGH_THRESHOLD: u8 = 60;

pub fn score_risk(assessment: &str) -> RiskScore {
    let score = if assessment.contains("EXCEEDS") || assessment.to_lowercase().contains("high") {
        HIGH_SCORE
    } else if assessment.contains("WITHIN") {
        WITHIN_SCORE
    } else {
        DEFAULT_SCORE
    };

    RiskScore {
        score,
        label: if score < HIGH_THRESHOLD { "Moderate" } else { "High" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exceeds_is_high() {
        let score = score_risk("Volatility 62%. Result: EXCEEDS limit.");
        assert_eq!(score.score, 70);
        assert_eq!(score.label, "High");
    }

    #[test]
    fn test_high_wins_over_within() {
        assert_eq!(score_risk("Position WITHIN limit but HIGH drawdown").score, 70);
    }

    #[test]
    fn test_within_is_lower_than_default() {
        let within = score_risk("Result: WITHIN limit.");
        let neutral = score_risk("No risk assessment requested or available.");
        assert_eq!(within.score, 25);
        assert_eq!(neutral.score, 35);
        assert!(within.score < neutral.score);
        assert_eq!(neutral.label, "Moderate");
    }
}
