//! Appointment store: a backend-agnostic trait over schedule data.

mod json_backend;

pub use json_backend::JsonScheduleStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StoreError;

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Rescheduled,
    Cancelled,
}

/// A scheduled appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// Appointment ID (APT-XXXX).
    pub id: String,
    /// Patient ID (P-XXX).
    pub patient_id: String,
    /// Patient's full name.
    pub patient_name: String,
    /// Visit type (e.g. "MRI Scan"); keys the preparation instructions.
    #[serde(rename = "type")]
    pub visit_type: String,
    /// Scheduled date (YYYY-MM-DD).
    pub date: String,
    /// Scheduled time (HH:MM).
    pub time: String,
    /// Attending doctor.
    pub doctor: String,
    /// Current status.
    pub status: AppointmentStatus,
}

/// The on-disk schedule document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleData {
    pub appointments: Vec<Appointment>,
    /// Preparation instructions keyed by visit type.
    #[serde(default)]
    pub preparation_instructions: BTreeMap<String, String>,
}

/// Lookup key for an appointment. Either identifier works; the
/// appointment ID is checked first.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub appointment_id: Option<String>,
    pub patient_id: Option<String>,
}

impl AppointmentQuery {
    pub fn is_empty(&self) -> bool {
        self.appointment_id.is_none() && self.patient_id.is_none()
    }
}

/// Backend-agnostic schedule store.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Find an appointment by appointment ID or patient ID.
    async fn lookup(&self, query: &AppointmentQuery) -> Result<Option<Appointment>, StoreError>;

    /// Move an appointment to a new date/time. Returns the updated record.
    async fn reschedule(
        &self,
        appointment_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> Result<Appointment, StoreError>;

    /// Cancel an appointment. Returns the updated record.
    async fn cancel(&self, appointment_id: &str) -> Result<Appointment, StoreError>;

    /// Preparation instructions for a visit type, if any exist.
    async fn preparation_instructions(
        &self,
        visit_type: &str,
    ) -> Result<Option<String>, StoreError>;

    /// All patient names in the schedule; feeds the PII masker.
    async fn patient_names(&self) -> Result<Vec<String>, StoreError>;
}
