//! In-memory job-application tracker with per-application status history.
//!
//! Applications are owned by a subject (the login email). Every lookup is
//! scoped by owner, so another user's id behaves exactly like a missing one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult, ValidationErrors};

const MAX_NAME_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 2000;

/// Where an application stands in the hiring process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl ApplicationStatus {
    /// Terminal statuses are never considered stale.
    pub fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Offer | ApplicationStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::Interview => "INTERVIEW",
            ApplicationStatus::Offer => "OFFER",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-supplied fields for creating or replacing an application.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationDraft {
    pub company_name: String,
    pub position: String,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub application_date: Option<NaiveDate>,
    #[serde(default)]
    pub salary_expectation: Option<f64>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ApplicationDraft {
    /// Checks every field and reports all failures at once. Returns the
    /// application date, which is only known to be present once this passes.
    pub fn validate(&self, today: NaiveDate) -> CoreResult<NaiveDate> {
        let mut errors = ValidationErrors::new();

        check_name(&mut errors, "company_name", "Company name", &self.company_name);
        check_name(&mut errors, "position", "Position", &self.position);

        match self.application_date {
            None => {
                errors.insert(
                    "application_date".to_string(),
                    "Application date is required".to_string(),
                );
            }
            Some(date) if date > today => {
                errors.insert(
                    "application_date".to_string(),
                    "Application date cannot be in the future".to_string(),
                );
            }
            Some(_) => {}
        }
        if let Some(salary) = self.salary_expectation {
            if !salary.is_finite() || salary < 0.0 {
                errors.insert(
                    "salary_expectation".to_string(),
                    "Salary expectation must be positive".to_string(),
                );
            }
        }
        if let Some(contact) = &self.contact_person {
            if contact.chars().count() > MAX_NAME_LEN {
                errors.insert(
                    "contact_person".to_string(),
                    format!("Contact person must not exceed {MAX_NAME_LEN} characters"),
                );
            }
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > MAX_NOTES_LEN {
                errors.insert(
                    "notes".to_string(),
                    format!("Notes must not exceed {MAX_NOTES_LEN} characters"),
                );
            }
        }

        match self.application_date {
            Some(date) if errors.is_empty() => Ok(date),
            _ => Err(CoreError::Validation(errors)),
        }
    }
}

fn check_name(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), format!("{label} is required"));
    } else if value.chars().count() > MAX_NAME_LEN {
        errors.insert(
            field.to_string(),
            format!("{label} must not exceed {MAX_NAME_LEN} characters"),
        );
    }
}

/// A tracked job application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobApplication {
    pub id: u64,
    #[serde(skip)]
    pub owner: String,
    pub company_name: String,
    pub position: String,
    pub status: ApplicationStatus,
    pub application_date: NaiveDate,
    pub salary_expectation: Option<f64>,
    pub contact_person: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recorded status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub id: u64,
    pub previous_status: ApplicationStatus,
    pub new_status: ApplicationStatus,
    pub changed_at: DateTime<Utc>,
}

/// Optional list filters; unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl ApplicationFilter {
    fn matches(&self, app: &JobApplication) -> bool {
        if self.status.is_some_and(|s| s != app.status) {
            return false;
        }
        if let Some(company) = self.company_name.as_deref().filter(|c| !c.is_empty()) {
            if !app
                .company_name
                .to_lowercase()
                .contains(&company.to_lowercase())
            {
                return false;
            }
        }
        if self.start_date.is_some_and(|d| app.application_date < d) {
            return false;
        }
        if self.end_date.is_some_and(|d| app.application_date > d) {
            return false;
        }
        true
    }
}

#[derive(Debug)]
struct Record {
    application: JobApplication,
    history: Vec<StatusChange>,
}

/// Thread-safe store of applications and their status history.
pub struct ApplicationTracker {
    records: DashMap<u64, Record>,
    next_id: AtomicU64,
    next_change_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl ApplicationTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
            next_change_id: AtomicU64::new(1),
            clock,
        }
    }

    pub fn create(&self, owner: &str, draft: ApplicationDraft) -> CoreResult<JobApplication> {
        let now = self.clock.now_utc();
        let application_date = draft.validate(now.date_naive())?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let application = JobApplication {
            id,
            owner: owner.to_string(),
            company_name: draft.company_name,
            position: draft.position,
            status: draft.status.unwrap_or_default(),
            application_date,
            salary_expectation: draft.salary_expectation,
            contact_person: draft.contact_person,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };

        self.records.insert(
            id,
            Record {
                application: application.clone(),
                history: Vec::new(),
            },
        );
        tracing::debug!(id, owner, "created job application");
        Ok(application)
    }

    /// Lists the owner's applications, newest application date first.
    pub fn list(&self, owner: &str, filter: &ApplicationFilter) -> Vec<JobApplication> {
        let mut apps: Vec<JobApplication> = self
            .records
            .iter()
            .filter(|r| r.application.owner == owner && filter.matches(&r.application))
            .map(|r| r.application.clone())
            .collect();
        apps.sort_by(|a, b| {
            b.application_date
                .cmp(&a.application_date)
                .then_with(|| b.id.cmp(&a.id))
        });
        apps
    }

    pub fn get(&self, owner: &str, id: u64) -> CoreResult<JobApplication> {
        self.records
            .get(&id)
            .filter(|r| r.application.owner == owner)
            .map(|r| r.application.clone())
            .ok_or(CoreError::ApplicationNotFound(id))
    }

    /// Replaces every editable field. A status change is appended to the
    /// history; an absent status leaves the current one untouched.
    pub fn update(&self, owner: &str, id: u64, draft: ApplicationDraft) -> CoreResult<JobApplication> {
        let now = self.clock.now_utc();
        let application_date = draft.validate(now.date_naive())?;

        let mut record = self
            .records
            .get_mut(&id)
            .filter(|r| r.application.owner == owner)
            .ok_or(CoreError::ApplicationNotFound(id))?;

        let previous = record.application.status;
        if let Some(next) = draft.status.filter(|s| *s != previous) {
            let change = StatusChange {
                id: self.next_change_id.fetch_add(1, Ordering::Relaxed),
                previous_status: previous,
                new_status: next,
                changed_at: now,
            };
            record.history.push(change);
            record.application.status = next;
            tracing::info!(
                id,
                owner,
                company = %draft.company_name,
                from = %previous,
                to = %next,
                "application status changed; notifying owner"
            );
        }

        let app = &mut record.application;
        app.company_name = draft.company_name;
        app.position = draft.position;
        app.application_date = application_date;
        app.salary_expectation = draft.salary_expectation;
        app.contact_person = draft.contact_person;
        app.notes = draft.notes;
        app.updated_at = now;

        Ok(app.clone())
    }

    pub fn delete(&self, owner: &str, id: u64) -> CoreResult<()> {
        self.records
            .remove_if(&id, |_, r| r.application.owner == owner)
            .map(|_| tracing::debug!(id, owner, "deleted job application"))
            .ok_or(CoreError::ApplicationNotFound(id))
    }

    /// Status transitions for one application, most recent first.
    pub fn history(&self, owner: &str, id: u64) -> CoreResult<Vec<StatusChange>> {
        let record = self
            .records
            .get(&id)
            .filter(|r| r.application.owner == owner)
            .ok_or(CoreError::ApplicationNotFound(id))?;
        let mut history = record.history.clone();
        history.sort_by(|a, b| b.changed_at.cmp(&a.changed_at).then_with(|| b.id.cmp(&a.id)));
        Ok(history)
    }

    /// Non-terminal applications untouched for more than `stale_days`.
    pub fn stale_applications(&self, stale_days: u32) -> Vec<JobApplication> {
        let cutoff = self.clock.now_utc() - ChronoDuration::days(i64::from(stale_days));
        let mut stale: Vec<JobApplication> = self
            .records
            .iter()
            .filter(|r| !r.application.status.is_terminal() && r.application.updated_at < cutoff)
            .map(|r| r.application.clone())
            .collect();
        stale.sort_by_key(|a| a.id);
        stale
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
