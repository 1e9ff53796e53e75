//! JSON-file schedule store.
//!
//! The whole schedule lives in one JSON document. It is read once at open,
//! held behind an async lock, and written back after every mutation. Good
//! enough for a single-process assistant; durability is the file system's
//! problem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::StoreError;
use crate::store::{
    Appointment, AppointmentQuery, AppointmentStatus, ScheduleData, ScheduleStore,
};

/// Schedule store backed by a single JSON file.
pub struct JsonScheduleStore {
    path: PathBuf,
    data: RwLock<ScheduleData>,
}

impl JsonScheduleStore {
    /// Open the store, reading the schedule document from `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let data: ScheduleData = serde_json::from_str(&raw)?;

        info!(
            path = %path.display(),
            appointments = data.appointments.len(),
            "Schedule data loaded"
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Write the current document back to disk.
    async fn persist(&self, data: &ScheduleData) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl ScheduleStore for JsonScheduleStore {
    async fn lookup(&self, query: &AppointmentQuery) -> Result<Option<Appointment>, StoreError> {
        let data = self.data.read().await;
        for apt in &data.appointments {
            if let Some(ref id) = query.appointment_id
                && apt.id == *id
            {
                return Ok(Some(apt.clone()));
            }
            if let Some(ref pid) = query.patient_id
                && apt.patient_id == *pid
            {
                return Ok(Some(apt.clone()));
            }
        }
        Ok(None)
    }

    async fn reschedule(
        &self,
        appointment_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;
        let apt = data
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| StoreError::NotFound {
                id: appointment_id.to_string(),
            })?;

        apt.date = new_date.to_string();
        apt.time = new_time.to_string();
        apt.status = AppointmentStatus::Rescheduled;
        let updated = apt.clone();

        self.persist(&data).await?;
        info!(appointment_id, new_date, new_time, "Appointment rescheduled");
        Ok(updated)
    }

    async fn cancel(&self, appointment_id: &str) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;
        let apt = data
            .appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or_else(|| StoreError::NotFound {
                id: appointment_id.to_string(),
            })?;

        apt.status = AppointmentStatus::Cancelled;
        let updated = apt.clone();

        self.persist(&data).await?;
        info!(appointment_id, "Appointment cancelled");
        Ok(updated)
    }

    async fn preparation_instructions(
        &self,
        visit_type: &str,
    ) -> Result<Option<String>, StoreError> {
        let data = self.data.read().await;
        Ok(data.preparation_instructions.get(visit_type).cloned())
    }

    async fn patient_names(&self) -> Result<Vec<String>, StoreError> {
        let data = self.data.read().await;
        let mut names: Vec<String> = data
            .appointments
            .iter()
            .map(|a| a.patient_name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
