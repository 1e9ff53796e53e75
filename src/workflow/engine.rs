//! Workflow engine: drives a patient request through the graph.
//!
//! **Core invariant: no response reaches the patient without human review.**
//! Every branch in the graph funnels into the review gate; the engine never
//! emits a final response on its own.
//!
//! Flow per run:
//! 1. Screen input (regex, no LLM); may short-circuit to review
//! 2. Classify intent (LLM) → safety check; emergencies short-circuit
//! 3. Validate required info; gaps short-circuit with a NEED_INFO draft
//! 4. Execute the store action, draft a reply (LLM)
//! 5. Review gate → finalize

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::llm::{
    CallBudget, ChatMessage, CompletionRequest, LlmProvider, RetryPolicy, complete_with_retry,
};
use crate::review::{ReviewAction, ReviewDecision, ReviewGate};
use crate::safety::{Moderator, PiiMasker, ScreenOutcome};
use crate::store::{Appointment, ScheduleStore};
use crate::workflow::graph::{Node, next_node};
use crate::workflow::state::{Intent, Route, RunState, TerminalStatus, WorkflowOutcome};

/// Max tokens for the classification call (kept tight; fixed line format).
const CLASSIFY_MAX_TOKENS: u32 = 256;

/// Max tokens for the patient-facing draft.
const DRAFT_MAX_TOKENS: u32 = 512;

/// Temperature for both LLM calls (deterministic-ish).
const LLM_TEMPERATURE: f32 = 0.0;

/// Draft shown when moderation flags the input.
const MODERATION_NOTICE: &str = "Your message has been flagged for review. A staff member will \
     follow up with you directly. If you are in an emergency, please call 911 immediately.";

/// Draft shown when the safety check detects an emergency.
const EMERGENCY_ALERT: &str = "EMERGENCY ALERT: Based on your message, this appears to be an \
     urgent medical situation. Please call 911 or go to your nearest emergency room immediately. \
     Do not wait for an appointment. If you are in immediate danger, call emergency services \
     right away.";

/// Draft shown when no appointment matches the provided identifiers.
const NOT_FOUND_NOTICE: &str = "I couldn't find an appointment matching the information \
     provided. Please double-check your appointment ID or patient ID.";

/// Final response when the reviewer rejects a draft.
const REJECTION_NOTICE: &str = "This request has been escalated for manual handling.";

/// Fallback when a run somehow reaches review without a draft.
const EMPTY_DRAFT_NOTICE: &str = "No response generated.";

/// Workflow engine: owns the collaborators and drives runs end-to-end.
pub struct WorkflowEngine {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn ScheduleStore>,
    moderator: Moderator,
    masker: PiiMasker,
    retry: RetryPolicy,
    max_llm_calls: u32,
}

impl WorkflowEngine {
    /// Create an engine with default retry policy and call budget.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn ScheduleStore>,
        moderator: Moderator,
        masker: PiiMasker,
    ) -> Self {
        Self {
            llm,
            store,
            moderator,
            masker,
            retry: RetryPolicy::default(),
            max_llm_calls: 5,
        }
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-run LLM call budget.
    pub fn with_max_llm_calls(mut self, max: u32) -> Self {
        self.max_llm_calls = max;
        self
    }

    /// Run a request up to (but not including) the review gate.
    ///
    /// This is the front half the HTTP front end uses: it returns the state
    /// with a draft, status, and route; the review decision is applied
    /// separately via [`finalize_decision`].
    pub async fn process(&self, user_input: &str) -> Result<RunState, WorkflowError> {
        let mut state = RunState::new(user_input);
        let budget = CallBudget::new(self.max_llm_calls);

        let mut node = Node::Initialize;
        loop {
            state.trace.push(node);
            self.execute_node(node, &mut state, &budget).await?;

            match next_node(node, &state) {
                Some(Node::HumanReview) => break,
                Some(next) => node = next,
                // next_node only returns None after Finalize, which the
                // process loop never executes.
                None => break,
            }
        }

        state.llm_calls = budget.spent();
        Ok(state)
    }

    /// Run a request end-to-end: process, review, finalize.
    pub async fn run(
        &self,
        user_input: &str,
        gate: &dyn ReviewGate,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let mut state = self.process(user_input).await?;

        state.trace.push(Node::HumanReview);
        let draft = state
            .draft_response
            .clone()
            .unwrap_or_else(|| EMPTY_DRAFT_NOTICE.to_string());
        let decision = gate.review(&draft).await?;
        info!(
            run_id = %state.run_id,
            action = %decision.action(),
            "Review decision recorded"
        );

        state.trace.push(Node::Finalize);
        let status = state.status.unwrap_or(TerminalStatus::Ready);
        let (final_response, status, review_action) = finalize_decision(decision, &draft, status);

        let outcome = WorkflowOutcome {
            run_id: state.run_id.clone(),
            status,
            route: state.route,
            intent: state.intent,
            draft_response: draft,
            final_response,
            review_action,
            llm_calls: state.llm_calls,
            trace: state.trace.iter().map(Node::label).collect(),
        };

        info!(
            run_id = %outcome.run_id,
            status = %outcome.status,
            route = outcome.route.map(|r| r.label()).unwrap_or("none"),
            llm_calls = outcome.llm_calls,
            trace = %outcome.trace_summary(),
            "Run finalized"
        );

        Ok(outcome)
    }

    async fn execute_node(
        &self,
        node: Node,
        state: &mut RunState,
        budget: &CallBudget,
    ) -> Result<(), WorkflowError> {
        match node {
            Node::Initialize => {
                self.initialize(state);
                Ok(())
            }
            Node::ScreenInput => {
                self.screen_input(state);
                Ok(())
            }
            Node::ClassifyIntent => self.classify_intent(state, budget).await,
            Node::SafetyCheck => {
                self.safety_check(state);
                Ok(())
            }
            Node::ValidateInfo => self.validate_info(state).await,
            Node::ExecuteAction => self.execute_action(state).await,
            Node::GenerateDraft => self.generate_draft(state, budget).await,
            // Review and finalize are driven by run()/the front ends.
            Node::HumanReview | Node::Finalize => Ok(()),
        }
    }

    // ── Node 1: initialize ──────────────────────────────────────────

    fn initialize(&self, state: &RunState) {
        info!(
            run_id = %state.run_id,
            input = %self.masker.mask(&state.user_input),
            "Run started"
        );
    }

    // ── Node 2: screen input (PII + moderation) ─────────────────────

    fn screen_input(&self, state: &mut RunState) {
        let pii = self.masker.detect(&state.user_input);
        if pii.is_empty() {
            debug!(run_id = %state.run_id, "No PII detected in input");
        } else {
            let kinds: Vec<String> = pii.iter().map(|k| k.to_string()).collect();
            info!(
                run_id = %state.run_id,
                kinds = %kinds.join(", "),
                "PII detected in input, masked in logs"
            );
        }

        match self.moderator.screen(&state.user_input) {
            ScreenOutcome::Clear => {
                debug!(run_id = %state.run_id, "Content passes moderation");
            }
            ScreenOutcome::MildLanguage => {
                info!(run_id = %state.run_id, "Mild language detected, proceeding");
            }
            ScreenOutcome::Flagged { reason } => {
                warn!(run_id = %state.run_id, reason = %reason, "Input flagged, escalating");
                state.status = Some(TerminalStatus::Escalate);
                state.route = Some(Route::ModerationFlagged);
                state.draft_response = Some(MODERATION_NOTICE.to_string());
            }
        }
    }

    // ── Node 3: classify intent ─────────────────────────────────────

    async fn classify_intent(
        &self,
        state: &mut RunState,
        budget: &CallBudget,
    ) -> Result<(), WorkflowError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(build_classify_prompt(
            &state.user_input,
        ))])
        .with_temperature(LLM_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = complete_with_retry(self.llm.as_ref(), request, &self.retry, budget).await?;
        let classification = parse_classification(&response.content);

        info!(
            run_id = %state.run_id,
            intent = classification.intent.label(),
            appointment_id = classification.appointment_id.as_deref().unwrap_or("-"),
            patient_id = if classification.patient_id.is_some() { "present" } else { "-" },
            new_date = classification.new_date.as_deref().unwrap_or("-"),
            new_time = classification.new_time.as_deref().unwrap_or("-"),
            "Intent classified"
        );

        state.intent = Some(classification.intent);
        state.appointment_id = classification.appointment_id;
        state.patient_id = classification.patient_id;
        state.new_date = classification.new_date;
        state.new_time = classification.new_time;
        Ok(())
    }

    // ── Node 4: safety check ────────────────────────────────────────

    fn safety_check(&self, state: &mut RunState) {
        if state.intent == Some(Intent::Emergency) {
            warn!(run_id = %state.run_id, "Emergency detected, escalating");
            state.status = Some(TerminalStatus::Escalate);
            state.route = Some(Route::EmergencyEscalation);
            state.draft_response = Some(EMERGENCY_ALERT.to_string());
        } else {
            debug!(run_id = %state.run_id, "No emergency detected");
        }
    }

    // ── Node 5: validate info ───────────────────────────────────────

    async fn validate_info(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let Some(intent) = state.intent else {
            return Ok(());
        };

        if intent.touches_store() && state.query().is_empty() {
            debug!(run_id = %state.run_id, intent = intent.label(), "Missing identifiers");
            let (route, draft) = match intent {
                Intent::Reschedule => (
                    Route::RescheduleNeedInfo,
                    "I'd be happy to help reschedule your appointment. Could you please \
                     provide your appointment ID (e.g., APT-1001) or patient ID (e.g., P-201)?",
                ),
                Intent::Cancel => (
                    Route::CancelNeedInfo,
                    "I can help you cancel your appointment. Could you please provide \
                     your appointment ID (e.g., APT-1001) or patient ID (e.g., P-201)?",
                ),
                Intent::PrepInfo => (
                    Route::PrepNeedInfo,
                    "I can provide preparation instructions for your appointment. \
                     Could you please provide your appointment ID (e.g., APT-1001) \
                     or patient ID (e.g., P-201)?",
                ),
                _ => unreachable!("touches_store covers exactly these intents"),
            };
            state.status = Some(TerminalStatus::NeedInfo);
            state.route = Some(route);
            state.draft_response = Some(draft.to_string());
            return Ok(());
        }

        // Reschedule additionally needs the target date and time. Quote the
        // appointment back when we can find it, so the patient knows what
        // they're moving.
        if intent == Intent::Reschedule
            && (state.new_date.is_none() || state.new_time.is_none())
            && let Some(apt) = self.store.lookup(&state.query()).await?
        {
            debug!(run_id = %state.run_id, "Missing new date/time for reschedule");
            state.status = Some(TerminalStatus::NeedInfo);
            state.route = Some(Route::RescheduleNeedDatetime);
            state.draft_response = Some(format!(
                "I found your appointment ({}) for {} on {} at {} with {}. \
                 What new date and time would you like to reschedule to?",
                apt.id, apt.visit_type, apt.date, apt.time, apt.doctor,
            ));
            return Ok(());
        }

        debug!(run_id = %state.run_id, "Sufficient information available");
        Ok(())
    }

    // ── Node 6: execute action ──────────────────────────────────────

    async fn execute_action(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let intent = state.intent.unwrap_or(Intent::Unknown);

        if !intent.touches_store() {
            state.action_result = Some(
                "I can help with rescheduling, cancelling, or preparation instructions \
                 for appointments."
                    .to_string(),
            );
            state.route = Some(Route::UnknownIntent);
            return Ok(());
        }

        let Some(apt) = self.store.lookup(&state.query()).await? else {
            info!(run_id = %state.run_id, "Appointment not found");
            state.status = Some(TerminalStatus::NeedInfo);
            state.route = Some(Route::AppointmentNotFound);
            state.action_result = Some("Appointment not found".to_string());
            state.draft_response = Some(NOT_FOUND_NOTICE.to_string());
            return Ok(());
        };

        match intent {
            Intent::Reschedule => {
                let (Some(new_date), Some(new_time)) =
                    (state.new_date.clone(), state.new_time.clone())
                else {
                    // Validation quotes the appointment when it can; this
                    // covers a lookup that only resolved here.
                    state.status = Some(TerminalStatus::NeedInfo);
                    state.route = Some(Route::RescheduleNeedDatetime);
                    state.draft_response = Some(format!(
                        "I found your appointment ({}). What new date and time \
                         would you like to reschedule to?",
                        apt.id,
                    ));
                    return Ok(());
                };

                self.store.reschedule(&apt.id, &new_date, &new_time).await?;
                let result = format!(
                    "Appointment {} rescheduled from {} at {} to {} at {}.",
                    apt.id, apt.date, apt.time, new_date, new_time,
                );
                info!(run_id = %state.run_id, appointment_id = %apt.id, "Rescheduled");
                state.action_result = Some(result);
                state.route = Some(Route::RescheduleSuccess);
            }
            Intent::Cancel => {
                self.store.cancel(&apt.id).await?;
                info!(run_id = %state.run_id, appointment_id = %apt.id, "Cancelled");
                state.action_result =
                    Some(format!("Appointment {} has been cancelled.", apt.id));
                state.route = Some(Route::CancelSuccess);
            }
            Intent::PrepInfo => {
                let instructions = self
                    .store
                    .preparation_instructions(&apt.visit_type)
                    .await?
                    .unwrap_or_else(|| {
                        format!(
                            "No preparation instructions found for '{}'.",
                            apt.visit_type
                        )
                    });
                info!(
                    run_id = %state.run_id,
                    visit_type = %apt.visit_type,
                    "Retrieved preparation instructions"
                );
                state.action_result = Some(prep_result(&apt, &instructions));
                state.route = Some(Route::PrepInfoSuccess);
            }
            Intent::Emergency | Intent::Unknown => {
                unreachable!("touches_store filters these intents")
            }
        }

        Ok(())
    }

    // ── Node 7: generate draft ──────────────────────────────────────

    async fn generate_draft(
        &self,
        state: &mut RunState,
        budget: &CallBudget,
    ) -> Result<(), WorkflowError> {
        let intent = state.intent.unwrap_or(Intent::Unknown);
        let action_result = state.action_result.as_deref().unwrap_or("N/A");

        let request = CompletionRequest::new(vec![ChatMessage::user(build_draft_prompt(
            &state.user_input,
            intent,
            action_result,
        ))])
        .with_temperature(LLM_TEMPERATURE)
        .with_max_tokens(DRAFT_MAX_TOKENS);

        let response = complete_with_retry(self.llm.as_ref(), request, &self.retry, budget).await?;
        let draft = response.content.trim().to_string();

        debug!(
            run_id = %state.run_id,
            chars = draft.len(),
            "Draft response generated"
        );
        state.draft_response = Some(draft);
        state.status = Some(TerminalStatus::Ready);
        Ok(())
    }
}

/// Apply a review decision to a draft, producing the final response.
///
/// Approve keeps the draft and status; edit substitutes the reviewer's text;
/// reject replaces the response with an escalation notice.
pub fn finalize_decision(
    decision: ReviewDecision,
    draft: &str,
    status: TerminalStatus,
) -> (String, TerminalStatus, ReviewAction) {
    match decision {
        ReviewDecision::Approve => (draft.to_string(), status, ReviewAction::Approve),
        ReviewDecision::Edit { text } => (text, status, ReviewAction::Edit),
        ReviewDecision::Reject => (
            REJECTION_NOTICE.to_string(),
            TerminalStatus::Escalate,
            ReviewAction::Reject,
        ),
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Build the intent-classification prompt.
fn build_classify_prompt(user_input: &str) -> String {
    format!(
        "You are a medical appointment assistant. Classify the following patient message\n\
         into exactly ONE of these categories:\n\n\
         - \"reschedule\" — patient wants to change their appointment date/time\n\
         - \"cancel\" — patient wants to cancel their appointment\n\
         - \"prep_info\" — patient wants preparation instructions for their appointment\n\
         - \"emergency\" — patient describes an emergency, severe symptoms, or a \
         life-threatening situation\n\
         - \"unknown\" — message doesn't fit any of the above\n\n\
         Also extract any identifiers mentioned:\n\
         - appointment_id (format: APT-XXXX)\n\
         - patient_id (format: P-XXX)\n\
         - new_date (format: YYYY-MM-DD)\n\
         - new_time (format: HH:MM)\n\n\
         Patient message: \"{user_input}\"\n\n\
         Respond in EXACTLY this format (no extra text):\n\
         intent: <intent>\n\
         appointment_id: <id or NONE>\n\
         patient_id: <id or NONE>\n\
         new_date: <date or NONE>\n\
         new_time: <time or NONE>"
    )
}

/// Build the patient-facing draft prompt.
fn build_draft_prompt(user_input: &str, intent: Intent, action_result: &str) -> String {
    format!(
        "You are a friendly and professional medical appointment assistant.\n\
         Generate a clear, helpful response for the patient based on this information:\n\n\
         Patient's request: {user_input}\n\
         Intent: {intent}\n\
         Action result: {action_result}\n\n\
         Guidelines:\n\
         - Be warm and professional\n\
         - Include all relevant details (dates, times, instructions)\n\
         - Do NOT provide any medical or clinical advice\n\
         - If the action was successful, confirm what was done\n\
         - Keep the response concise but complete\n\
         - Do NOT include placeholder signatures like [Your Name]\n\n\
         Generate the response:"
    )
}

/// Action-result text for a prep-info request: which appointment, plus the
/// instructions themselves, so the draft can quote both.
fn prep_result(apt: &Appointment, instructions: &str) -> String {
    format!(
        "Preparation instructions for {} ({} on {} at {}): {}",
        apt.visit_type, apt.id, apt.date, apt.time, instructions,
    )
}

// ── Classification parsing ──────────────────────────────────────────

/// Parsed output of the classification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Classification {
    pub intent: Intent,
    pub appointment_id: Option<String>,
    pub patient_id: Option<String>,
    pub new_date: Option<String>,
    pub new_time: Option<String>,
}

/// Parse the fixed `key: value` line format the classifier is instructed
/// to produce. `NONE` (any case) means absent; an unrecognized or missing
/// intent falls back to `Unknown`.
pub(crate) fn parse_classification(raw: &str) -> Classification {
    let mut intent = Intent::Unknown;
    let mut appointment_id = None;
    let mut patient_id = None;
    let mut new_date = None;
    let mut new_time = None;

    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = clean_value(value);

        match key.trim() {
            "intent" => {
                if let Some(v) = &value {
                    intent = v.parse().unwrap_or(Intent::Unknown);
                }
            }
            "appointment_id" => appointment_id = value,
            "patient_id" => patient_id = value,
            "new_date" => new_date = value,
            "new_time" => new_time = value,
            _ => {}
        }
    }

    Classification {
        intent,
        appointment_id,
        patient_id,
        new_date,
        new_time,
    }
}

/// Trim whitespace and surrounding quotes; map `NONE` to absent.
fn clean_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(['"', '\'']).trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}
