//! Shared types for the appointment workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::review::ReviewAction;
use crate::store::AppointmentQuery;
use crate::workflow::graph::Node;

// ── Intent ──────────────────────────────────────────────────────────

/// What the patient is asking for.
///
/// Determined by one LLM classification call; anything the classifier
/// cannot place lands on `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Reschedule,
    Cancel,
    PrepInfo,
    Emergency,
    Unknown,
}

impl Intent {
    /// Short label for logging and routes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reschedule => "reschedule",
            Self::Cancel => "cancel",
            Self::PrepInfo => "prep_info",
            Self::Emergency => "emergency",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this intent reads or mutates the schedule store.
    pub fn touches_store(&self) -> bool {
        matches!(self, Self::Reschedule | Self::Cancel | Self::PrepInfo)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Intent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reschedule" => Ok(Self::Reschedule),
            "cancel" => Ok(Self::Cancel),
            "prep_info" => Ok(Self::PrepInfo),
            "emergency" => Ok(Self::Emergency),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown intent: {}", other)),
        }
    }
}

// ── Terminal status ─────────────────────────────────────────────────

/// Terminal status assigned at the end of every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    /// A response is ready for the patient.
    Ready,
    /// More information is needed before anything can be done.
    NeedInfo,
    /// Escalated for manual handling.
    Escalate,
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "READY"),
            Self::NeedInfo => write!(f, "NEED_INFO"),
            Self::Escalate => write!(f, "ESCALATE"),
        }
    }
}

// ── Route ───────────────────────────────────────────────────────────

/// Which branch a run took, recorded for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    ModerationFlagged,
    EmergencyEscalation,
    RescheduleNeedInfo,
    RescheduleNeedDatetime,
    CancelNeedInfo,
    PrepNeedInfo,
    AppointmentNotFound,
    RescheduleSuccess,
    CancelSuccess,
    PrepInfoSuccess,
    UnknownIntent,
}

impl Route {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ModerationFlagged => "moderation_flagged",
            Self::EmergencyEscalation => "emergency_escalation",
            Self::RescheduleNeedInfo => "reschedule_need_info",
            Self::RescheduleNeedDatetime => "reschedule_need_datetime",
            Self::CancelNeedInfo => "cancel_need_info",
            Self::PrepNeedInfo => "prep_need_info",
            Self::AppointmentNotFound => "appointment_not_found",
            Self::RescheduleSuccess => "reschedule_success",
            Self::CancelSuccess => "cancel_success",
            Self::PrepInfoSuccess => "prep_info_success",
            Self::UnknownIntent => "unknown_intent",
        }
    }
}

// ── Run state ───────────────────────────────────────────────────────

/// State that flows through the workflow graph. Nodes read and write
/// fields as the run progresses.
#[derive(Debug, Clone)]
pub struct RunState {
    /// Run ID for tracing (RUN-XXXXXXXX).
    pub run_id: String,
    /// The patient's raw request.
    pub user_input: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,

    // Intent classification
    pub intent: Option<Intent>,

    // Extracted details
    pub appointment_id: Option<String>,
    pub patient_id: Option<String>,
    pub new_date: Option<String>,
    pub new_time: Option<String>,

    // Processing
    pub action_result: Option<String>,
    pub draft_response: Option<String>,

    // Output
    pub status: Option<TerminalStatus>,
    pub route: Option<Route>,

    // Tracing
    pub trace: Vec<Node>,
    pub llm_calls: u32,
}

impl RunState {
    /// Fresh state for a new run.
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            run_id: new_run_id(),
            user_input: user_input.into(),
            started_at: Utc::now(),
            intent: None,
            appointment_id: None,
            patient_id: None,
            new_date: None,
            new_time: None,
            action_result: None,
            draft_response: None,
            status: None,
            route: None,
            trace: Vec::new(),
            llm_calls: 0,
        }
    }

    /// Store lookup key from the extracted identifiers.
    pub fn query(&self) -> AppointmentQuery {
        AppointmentQuery {
            appointment_id: self.appointment_id.clone(),
            patient_id: self.patient_id.clone(),
        }
    }

    /// Whether the run has already been escalated.
    pub fn escalated(&self) -> bool {
        self.status == Some(TerminalStatus::Escalate)
    }

    /// Whether the run is waiting on missing information.
    pub fn needs_info(&self) -> bool {
        self.status == Some(TerminalStatus::NeedInfo)
    }
}

/// Generate a run ID: "RUN-" + 8 uppercase hex chars.
pub fn new_run_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("RUN-{}", hex[..8].to_uppercase())
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Final result of a workflow run, after the review gate.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub run_id: String,
    pub status: TerminalStatus,
    pub route: Option<Route>,
    pub intent: Option<Intent>,
    pub draft_response: String,
    pub final_response: String,
    pub review_action: ReviewAction,
    pub llm_calls: u32,
    /// Node labels in visit order.
    pub trace: Vec<&'static str>,
}

impl WorkflowOutcome {
    /// Concise "a → b → c" trace string.
    pub fn trace_summary(&self) -> String {
        self.trace.join(" → ")
    }
}
