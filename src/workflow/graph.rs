//! The workflow graph: nodes and the pure transition function.
//!
//! ```text
//!     initialize
//!          │
//!     screen_input
//!          │
//!    ┌─────┴──────┐
//!    │ FLAGGED    │ CLEAR
//!    ▼            ▼
//! human_review  classify_intent
//!    │            │
//!    │       safety_check
//!    │            │
//!    │      ┌─────┴──────┐
//!    │      │ ESCALATE   │ NORMAL
//!    │      ▼            ▼
//!    │  human_review  validate_info
//!    │      │            │
//!    │      │       ┌────┴─────┐
//!    │      │       │NEED_INFO │ HAS_INFO
//!    │      │       ▼          ▼
//!    │      │  human_review  execute_action
//!    │      │       │          │
//!    │      │       │     ┌────┴─────┐
//!    │      │       │     │NOT_FOUND │ DONE
//!    │      │       │     ▼          ▼
//!    │      │       │ human_review  generate_draft
//!    │      │       │     │          │
//!    │      │       │     │     human_review
//!    ▼      ▼       ▼     ▼          ▼
//!              finalize
//! ```
//!
//! Every path funnels through `human_review` before `finalize`.

use serde::Serialize;

use crate::workflow::state::RunState;

/// A node in the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Initialize,
    ScreenInput,
    ClassifyIntent,
    SafetyCheck,
    ValidateInfo,
    ExecuteAction,
    GenerateDraft,
    HumanReview,
    Finalize,
}

impl Node {
    /// Label for trace output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ScreenInput => "screen_input",
            Self::ClassifyIntent => "classify_intent",
            Self::SafetyCheck => "safety_check",
            Self::ValidateInfo => "validate_info",
            Self::ExecuteAction => "execute_action",
            Self::GenerateDraft => "generate_draft",
            Self::HumanReview => "human_review",
            Self::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The transition function. Pure: the next node depends only on the
/// current node and the state the nodes have written so far.
///
/// Returns `None` after `Finalize`.
pub fn next_node(current: Node, state: &RunState) -> Option<Node> {
    match current {
        Node::Initialize => Some(Node::ScreenInput),
        Node::ScreenInput => {
            if state.escalated() {
                Some(Node::HumanReview)
            } else {
                Some(Node::ClassifyIntent)
            }
        }
        Node::ClassifyIntent => Some(Node::SafetyCheck),
        Node::SafetyCheck => {
            if state.escalated() {
                Some(Node::HumanReview)
            } else {
                Some(Node::ValidateInfo)
            }
        }
        Node::ValidateInfo => {
            if state.needs_info() {
                Some(Node::HumanReview)
            } else {
                Some(Node::ExecuteAction)
            }
        }
        Node::ExecuteAction => {
            if state.needs_info() {
                Some(Node::HumanReview)
            } else {
                Some(Node::GenerateDraft)
            }
        }
        Node::GenerateDraft => Some(Node::HumanReview),
        Node::HumanReview => Some(Node::Finalize),
        Node::Finalize => None,
    }
}
