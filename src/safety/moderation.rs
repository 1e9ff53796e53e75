//! Pre-LLM content moderation for patient input.
//!
//! Runs before intent classification to short-circuit unsafe requests:
//! severe matches (threats, abuse) escalate straight to human review and
//! never reach the LLM. Mild-language matches are logged and proceed.

use regex::Regex;
use tracing::debug;

/// A single moderation rule with a compiled regex.
#[derive(Debug, Clone)]
struct FlagRule {
    regex: Regex,
    /// Why this rule triggers.
    reason: &'static str,
}

/// Outcome of screening a piece of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenOutcome {
    /// Content passes moderation.
    Clear,
    /// Mild language detected; proceed, but note it.
    MildLanguage,
    /// Content safety concern; escalate, do not process.
    Flagged { reason: String },
}

/// Keyword/regex content screen.
pub struct Moderator {
    flagged_rules: Vec<FlagRule>,
    mild_rules: Vec<Regex>,
}

impl Moderator {
    /// Create a moderator with the default rule set.
    pub fn default_rules() -> Self {
        let flagged_rules = vec![
            FlagRule {
                regex: Regex::new(r"(?i)\b(threat|threaten|kill|harm|attack|bomb)\b").unwrap(),
                reason: "violent or threatening language",
            },
            FlagRule {
                regex: Regex::new(r"(?i)\b(abuse|harass)\b").unwrap(),
                reason: "abusive or harassing language",
            },
        ];

        let mild_rules = vec![Regex::new(r"(?i)\b(damn|hell|crap)\b").unwrap()];

        Self {
            flagged_rules,
            mild_rules,
        }
    }

    /// Create an empty moderator (for testing).
    pub fn empty() -> Self {
        Self {
            flagged_rules: Vec::new(),
            mild_rules: Vec::new(),
        }
    }

    /// Add a custom flagged pattern.
    pub fn add_flagged(&mut self, pattern: &str, reason: &'static str) -> Result<(), regex::Error> {
        self.flagged_rules.push(FlagRule {
            regex: Regex::new(pattern)?,
            reason,
        });
        Ok(())
    }

    /// Screen input text against all rules. Flagged rules win over mild ones.
    pub fn screen(&self, text: &str) -> ScreenOutcome {
        for rule in &self.flagged_rules {
            if rule.regex.is_match(text) {
                debug!(reason = rule.reason, "Input matched flagged rule");
                return ScreenOutcome::Flagged {
                    reason: rule.reason.to_string(),
                };
            }
        }

        if self.mild_rules.iter().any(|r| r.is_match(text)) {
            debug!("Mild language detected, proceeding");
            return ScreenOutcome::MildLanguage;
        }

        ScreenOutcome::Clear
    }
}

impl Default for Moderator {
    fn default() -> Self {
        Self::default_rules()
    }
}
