//! End-to-end workflow tests against the public crate API.
//!
//! Each test drives a full run (scripted LLM, real JSON store on a temp
//! file, scripted review gate) and checks the terminal status, the route,
//! and the store side effects.

use std::collections::VecDeque;
use std::io::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use clinic_assist::error::{LlmError, ReviewError};
use clinic_assist::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use clinic_assist::review::{ReviewDecision, ReviewGate};
use clinic_assist::safety::{Moderator, PiiMasker};
use clinic_assist::store::{AppointmentQuery, AppointmentStatus, JsonScheduleStore, ScheduleStore};
use clinic_assist::workflow::{Intent, Route, TerminalStatus, WorkflowEngine};

/// LLM that pops scripted responses in order and records every prompt.
struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.messages[0].content.clone());
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted LLM ran out of responses");
        Ok(CompletionResponse {
            content,
            input_tokens: 100,
            output_tokens: 50,
            finish_reason: FinishReason::Stop,
        })
    }
}

/// LLM that always fails with a transient error.
struct DownLlm;

#[async_trait]
impl LlmProvider for DownLlm {
    fn model_name(&self) -> &str {
        "down"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::RequestFailed {
            provider: "down".into(),
            reason: "connection refused".into(),
        })
    }
}

/// Gate that returns a fixed decision and records what it saw.
struct RecordingGate {
    decision: ReviewDecision,
    seen: Mutex<Vec<String>>,
}

impl RecordingGate {
    fn new(decision: ReviewDecision) -> Self {
        Self {
            decision,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewGate for RecordingGate {
    async fn review(&self, draft: &str) -> Result<ReviewDecision, ReviewError> {
        self.seen.lock().unwrap().push(draft.to_string());
        Ok(self.decision.clone())
    }
}

const SEED: &str = r#"{
    "appointments": [
        {
            "id": "APT-1001",
            "patient_id": "P-201",
            "patient_name": "Sarah Johnson",
            "type": "MRI Scan",
            "date": "2026-03-10",
            "time": "09:30",
            "doctor": "Dr. Patel",
            "status": "confirmed"
        },
        {
            "id": "APT-1002",
            "patient_id": "P-202",
            "patient_name": "James Wilson",
            "type": "Blood Test",
            "date": "2026-03-12",
            "time": "11:00",
            "doctor": "Dr. Kim",
            "status": "confirmed"
        }
    ],
    "preparation_instructions": {
        "MRI Scan": "Remove all metal objects. Do not eat for 4 hours before the scan."
    }
}"#;

async fn seeded_store() -> (tempfile::NamedTempFile, Arc<JsonScheduleStore>) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SEED.as_bytes()).unwrap();
    let store = Arc::new(JsonScheduleStore::open(file.path()).await.unwrap());
    (file, store)
}

fn engine(llm: Arc<dyn LlmProvider>, store: Arc<JsonScheduleStore>) -> WorkflowEngine {
    WorkflowEngine::new(
        llm,
        store,
        Moderator::default_rules(),
        PiiMasker::new(vec!["Sarah Johnson".into(), "James Wilson".into()]),
    )
}

fn by_id(id: &str) -> AppointmentQuery {
    AppointmentQuery {
        appointment_id: Some(id.to_string()),
        patient_id: None,
    }
}

#[tokio::test]
async fn reschedule_run_mutates_store_and_reports_ready() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[
        "intent: reschedule\nappointment_id: APT-1001\npatient_id: NONE\n\
         new_date: 2026-04-02\nnew_time: 08:15",
        "You're all set — your MRI is now on April 2 at 8:15am.",
    ]);
    let gate = RecordingGate::new(ReviewDecision::Approve);

    let outcome = engine(llm.clone(), Arc::clone(&store))
        .run(
            "Please move appointment APT-1001 to 2026-04-02 at 08:15",
            &gate,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, TerminalStatus::Ready);
    assert_eq!(outcome.route, Some(Route::RescheduleSuccess));
    assert_eq!(outcome.intent, Some(Intent::Reschedule));
    assert_eq!(outcome.llm_calls, 2);
    assert!(outcome.final_response.contains("April 2"));

    // The reviewer saw exactly the draft that became the final response.
    assert_eq!(gate.seen(), vec![outcome.final_response.clone()]);

    // The draft prompt carried the action result (old → new schedule).
    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("rescheduled from 2026-03-10 at 09:30"));
    assert!(prompts[1].contains("2026-04-02 at 08:15"));

    let apt = store.lookup(&by_id("APT-1001")).await.unwrap().unwrap();
    assert_eq!(apt.date, "2026-04-02");
    assert_eq!(apt.status, AppointmentStatus::Rescheduled);
}

#[tokio::test]
async fn cancel_run_with_edit_keeps_store_change_but_sends_edited_text() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[
        "intent: cancel\nappointment_id: NONE\npatient_id: P-202\n\
         new_date: NONE\nnew_time: NONE",
        "Your blood test has been cancelled.",
    ]);
    let gate = RecordingGate::new(ReviewDecision::Edit {
        text: "Your blood test was cancelled. Call us to rebook.".into(),
    });

    let outcome = engine(llm, Arc::clone(&store))
        .run("cancel the appointment for P-202", &gate)
        .await
        .unwrap();

    assert_eq!(outcome.route, Some(Route::CancelSuccess));
    assert_eq!(
        outcome.final_response,
        "Your blood test was cancelled. Call us to rebook."
    );
    assert_eq!(outcome.draft_response, "Your blood test has been cancelled.");

    // Edit changes the message, not the action; the cancel stands.
    let apt = store.lookup(&by_id("APT-1002")).await.unwrap().unwrap();
    assert_eq!(apt.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn reject_escalates_and_replaces_response() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[
        "intent: prep_info\nappointment_id: APT-1001\npatient_id: NONE\n\
         new_date: NONE\nnew_time: NONE",
        "Here is how to prepare for your MRI...",
    ]);
    let gate = RecordingGate::new(ReviewDecision::Reject);

    let outcome = engine(llm, store)
        .run("what prep do I need for APT-1001?", &gate)
        .await
        .unwrap();

    assert_eq!(outcome.status, TerminalStatus::Escalate);
    assert!(outcome.final_response.contains("escalated"));
    assert!(!outcome.final_response.contains("MRI"));
}

#[tokio::test]
async fn emergency_bypasses_store_and_drafting() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[
        "intent: emergency\nappointment_id: NONE\npatient_id: NONE\n\
         new_date: NONE\nnew_time: NONE",
    ]);
    let gate = RecordingGate::new(ReviewDecision::Approve);

    let outcome = engine(llm, store)
        .run("I'm having severe chest pain and difficulty breathing", &gate)
        .await
        .unwrap();

    assert_eq!(outcome.status, TerminalStatus::Escalate);
    assert_eq!(outcome.route, Some(Route::EmergencyEscalation));
    assert_eq!(outcome.llm_calls, 1);
    assert!(outcome.final_response.contains("911"));
    // Even an emergency goes through the gate.
    assert_eq!(gate.seen().len(), 1);
}

#[tokio::test]
async fn flagged_input_short_circuits_with_zero_llm_calls() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[]);
    let gate = RecordingGate::new(ReviewDecision::Approve);

    let outcome = engine(llm, store)
        .run("I'm going to harm someone at the clinic", &gate)
        .await
        .unwrap();

    assert_eq!(outcome.status, TerminalStatus::Escalate);
    assert_eq!(outcome.route, Some(Route::ModerationFlagged));
    assert_eq!(outcome.llm_calls, 0);
    assert_eq!(gate.seen().len(), 1);
}

#[tokio::test]
async fn need_info_paths_end_at_review_with_one_call() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[
        "intent: reschedule\nappointment_id: NONE\npatient_id: NONE\n\
         new_date: NONE\nnew_time: NONE",
    ]);
    let gate = RecordingGate::new(ReviewDecision::Approve);

    let outcome = engine(llm, store)
        .run("I'd like to reschedule", &gate)
        .await
        .unwrap();

    assert_eq!(outcome.status, TerminalStatus::NeedInfo);
    assert_eq!(outcome.route, Some(Route::RescheduleNeedInfo));
    assert_eq!(outcome.llm_calls, 1);
    assert!(outcome.final_response.contains("APT-1001"));
}

#[tokio::test]
async fn not_found_appointment_asks_to_double_check() {
    let (_file, store) = seeded_store().await;
    let llm = ScriptedLlm::new(&[
        "intent: cancel\nappointment_id: APT-4242\npatient_id: NONE\n\
         new_date: NONE\nnew_time: NONE",
    ]);
    let gate = RecordingGate::new(ReviewDecision::Approve);

    let outcome = engine(llm, Arc::clone(&store))
        .run("cancel APT-4242", &gate)
        .await
        .unwrap();

    assert_eq!(outcome.status, TerminalStatus::NeedInfo);
    assert_eq!(outcome.route, Some(Route::AppointmentNotFound));
    assert!(outcome.final_response.contains("double-check"));

    // Nothing in the store was touched.
    let apt = store.lookup(&by_id("APT-1001")).await.unwrap().unwrap();
    assert_eq!(apt.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn provider_outage_surfaces_as_error_not_response() {
    let (_file, store) = seeded_store().await;
    let gate = RecordingGate::new(ReviewDecision::Approve);
    let engine = engine(Arc::new(DownLlm), store).with_retry_policy(
        clinic_assist::llm::RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
            max_jitter: std::time::Duration::ZERO,
        },
    );

    let result = engine.run("cancel APT-1001", &gate).await;
    assert!(result.is_err());
    // No draft ever reached the gate.
    assert!(gate.seen().is_empty());
}
