//! Human-in-the-loop review gate.
//!
//! **Core invariant: no response reaches the patient without human approval.**
//! Every workflow path funnels through a `ReviewGate` before finalization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::ReviewError;

/// What the reviewer decided to do with a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Send the draft as-is.
    Approve,
    /// Send the reviewer's replacement text instead.
    Edit { text: String },
    /// Do not send; escalate for manual handling.
    Reject,
}

/// Label for a review decision, recorded in the run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Edit,
    Reject,
}

impl ReviewDecision {
    pub fn action(&self) -> ReviewAction {
        match self {
            Self::Approve => ReviewAction::Approve,
            Self::Edit { .. } => ReviewAction::Edit,
            Self::Reject => ReviewAction::Reject,
        }
    }
}

impl std::fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Edit => write!(f, "edit"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// The synchronous decision point all drafts pass through.
#[async_trait]
pub trait ReviewGate: Send + Sync {
    /// Present a draft for review and wait for a decision.
    async fn review(&self, draft: &str) -> Result<ReviewDecision, ReviewError>;
}

/// Terminal review gate: prompts on stderr, reads decisions from stdin.
pub struct CliReviewGate;

impl CliReviewGate {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliReviewGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewGate for CliReviewGate {
    async fn review(&self, draft: &str) -> Result<ReviewDecision, ReviewError> {
        let mut stderr = tokio::io::stderr();
        let banner = format!(
            "\n{sep}\n  HUMAN REVIEW\n{sep}\n\n  Draft response:\n\n  {draft}\n\n{sep}\n",
            sep = "─".repeat(60),
        );
        stderr.write_all(banner.as_bytes()).await?;

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        loop {
            stderr
                .write_all(b"  Action - [A]pprove / [E]dit / [R]eject: ")
                .await?;
            stderr.flush().await?;

            let line = lines.next_line().await?.ok_or(ReviewError::InputClosed)?;
            match line.trim().to_uppercase().as_str() {
                "A" | "APPROVE" => return Ok(ReviewDecision::Approve),
                "R" | "REJECT" => return Ok(ReviewDecision::Reject),
                "E" | "EDIT" => {
                    stderr
                        .write_all(b"  Enter the edited response (blank line to finish):\n")
                        .await?;
                    let mut edited = Vec::new();
                    loop {
                        let line = lines.next_line().await?.ok_or(ReviewError::InputClosed)?;
                        if line.is_empty() {
                            break;
                        }
                        edited.push(line);
                    }
                    return Ok(ReviewDecision::Edit {
                        text: edited.join("\n"),
                    });
                }
                _ => {
                    stderr.write_all(b"  Please enter A, E, or R.\n").await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_maps_to_action() {
        assert_eq!(ReviewDecision::Approve.action(), ReviewAction::Approve);
        assert_eq!(
            ReviewDecision::Edit { text: "x".into() }.action(),
            ReviewAction::Edit
        );
        assert_eq!(ReviewDecision::Reject.action(), ReviewAction::Reject);
    }

    #[test]
    fn action_labels() {
        assert_eq!(ReviewAction::Approve.to_string(), "approve");
        assert_eq!(ReviewAction::Edit.to_string(), "edit");
        assert_eq!(ReviewAction::Reject.to_string(), "reject");
    }

    #[test]
    fn action_serde_roundtrip() {
        let json = serde_json::to_string(&ReviewAction::Edit).unwrap();
        assert_eq!(json, "\"edit\"");
        let parsed: ReviewAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ReviewAction::Edit);
    }
}
