//! PII detection and masking for log output.
//!
//! Masking applies to what we log, never to the text the workflow processes:
//! the classifier still needs the raw identifiers to extract them.

use regex::Regex;

/// A category of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiKind {
    PatientId,
    Phone,
    Email,
    Ssn,
    PatientName,
}

impl std::fmt::Display for PiiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatientId => write!(f, "patient_id"),
            Self::Phone => write!(f, "phone"),
            Self::Email => write!(f, "email"),
            Self::Ssn => write!(f, "ssn"),
            Self::PatientName => write!(f, "patient_name"),
        }
    }
}

/// A masking rule: what to find and what to put in its place.
#[derive(Debug, Clone)]
struct MaskRule {
    kind: PiiKind,
    regex: Regex,
    replacement: &'static str,
}

/// Detects and masks identifying information in free text.
pub struct PiiMasker {
    rules: Vec<MaskRule>,
    /// Patient names to initials-mask, sourced from the schedule data.
    known_names: Vec<String>,
}

impl PiiMasker {
    /// Create a masker with the default pattern set and a list of patient
    /// names to mask by initials.
    pub fn new(known_names: Vec<String>) -> Self {
        let rules = vec![
            MaskRule {
                kind: PiiKind::Ssn,
                regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
                replacement: "***-**-****",
            },
            MaskRule {
                kind: PiiKind::Phone,
                regex: Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").unwrap(),
                replacement: "***-***-****",
            },
            MaskRule {
                kind: PiiKind::Email,
                regex: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
                replacement: "***@***.***",
            },
            MaskRule {
                kind: PiiKind::PatientId,
                regex: Regex::new(r"\bP-\d{3,}\b").unwrap(),
                replacement: "P-***",
            },
        ];
        Self { rules, known_names }
    }

    /// Replace PII with masked placeholders; names become initials ("S. J.").
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for name in &self.known_names {
            if masked.contains(name.as_str())
                && let Some(initials) = initials_of(name)
            {
                masked = masked.replace(name.as_str(), &initials);
            }
        }
        for rule in &self.rules {
            masked = rule.regex.replace_all(&masked, rule.replacement).into_owned();
        }
        masked
    }

    /// Report which PII kinds appear in the text, without modifying it.
    pub fn detect(&self, text: &str) -> Vec<PiiKind> {
        let mut found: Vec<PiiKind> = self
            .rules
            .iter()
            .filter(|rule| rule.regex.is_match(text))
            .map(|rule| rule.kind)
            .collect();

        let lower = text.to_lowercase();
        if self
            .known_names
            .iter()
            .any(|name| lower.contains(&name.to_lowercase()))
        {
            found.push(PiiKind::PatientName);
        }
        found
    }
}

/// "Sarah Johnson" → "S. J.", first and last initials only.
fn initials_of(name: &str) -> Option<String> {
    let mut parts = name.split_whitespace();
    let first = parts.next()?.chars().next()?;
    let last = parts.next_back()?.chars().next()?;
    Some(format!("{first}. {last}."))
}
