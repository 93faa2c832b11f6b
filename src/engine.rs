//! Alert lifecycle engine — the mutation boundary of the core.
//!
//! `CareEngine` owns the store and every write path: sample ingest (with
//! rule evaluation and alert dedup) and the role-gated alert transitions.
//! Collaborators never mutate samples or alerts directly; they call the
//! operations here and receive the updated entity back, plus an optional
//! event on the registered `AlertSink`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDateTime, Timelike, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db::repository;
use crate::db::{self, DatabaseError};
use crate::locks::{LockError, LockTable};
use crate::models::{
    Actor, Alert, AlertFilter, AlertState, Patient, PatientUpdate, Role, RiskScore, Severity,
    VitalKind, VitalSample,
};
use crate::risk::{self, TrendPoint};
use crate::rules::{self, AlertCandidate};

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Out-of-order timestamp for patient {patient_id}: {submitted} is not after {last}")]
    OutOfOrderTimestamp {
        patient_id: Uuid,
        last: NaiveDateTime,
        submitted: NaiveDateTime,
    },

    #[error("Invalid transition on alert {alert_id} (state {state:?}): {reason}")]
    InvalidTransition {
        alert_id: Uuid,
        state: AlertState,
        reason: String,
    },

    #[error("Busy: {resource} is contended, retry later")]
    Busy { resource: String },

    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: String, id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Lock poisoned")]
    LockPoisoned,
}

// ═══════════════════════════════════════════════════════════
// Change notifications
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertEventKind {
    Created,
    Refreshed,
    Escalated,
    Reviewed,
    Closed,
}

/// Emitted after every alert mutation so collaborators (notification
/// delivery, dashboards) need not re-query broadly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertEventKind,
    pub alert: Alert,
}

/// Seam for notification collaborators. Delivery (push/email/SMS) is out
/// of scope for the core; implementations must not block.
pub trait AlertSink: Send + Sync {
    fn alert_event(&self, event: &AlertEvent);
}

/// Result of a sample submission: the stored sample plus every alert the
/// sample created or refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleOutcome {
    pub sample: VitalSample,
    pub alerts: Vec<Alert>,
}

// ═══════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════

pub struct CareEngine {
    conn: Mutex<Connection>,
    config: EngineConfig,
    patient_locks: LockTable<Uuid>,
    alert_locks: LockTable<Uuid>,
    sink: Option<Arc<dyn AlertSink>>,
}

impl CareEngine {
    pub fn new(conn: Connection, config: EngineConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            config,
            patient_locks: LockTable::new(),
            alert_locks: LockTable::new(),
            sink: None,
        }
    }

    /// Open (or create) the on-disk store at `path`.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::new(db::open_database(path)?, config))
    }

    /// In-memory engine (tests, demos).
    pub fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::new(db::open_memory_database()?, config))
    }

    /// Attach a change-notification sink.
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn store(&self) -> Result<MutexGuard<'_, Connection>, EngineError> {
        self.conn.lock().map_err(|_| EngineError::LockPoisoned)
    }

    fn lock_err(e: LockError, resource: &str) -> EngineError {
        match e {
            LockError::Busy => EngineError::Busy {
                resource: resource.to_string(),
            },
            LockError::Poisoned => EngineError::LockPoisoned,
        }
    }

    fn emit(&self, kind: AlertEventKind, alert: &Alert) {
        if let Some(ref sink) = self.sink {
            sink.alert_event(&AlertEvent {
                kind,
                alert: alert.clone(),
            });
        }
    }

    // ── Patient registry ────────────────────────────────────

    pub fn register_patient(&self, name: &str) -> Result<Patient, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidValue {
                field: "name".into(),
                reason: "must not be empty".into(),
            });
        }
        let patient = Patient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            age: None,
            sex: None,
            room: None,
            weight_kg: None,
            notes: None,
            created_at: now_millis(),
        };
        let conn = self.store()?;
        repository::insert_patient(&conn, &patient)?;
        tracing::info!(patient_id = %patient.id, "patient registered");
        Ok(patient)
    }

    pub fn get_patient(&self, patient_id: &Uuid) -> Result<Option<Patient>, EngineError> {
        let conn = self.store()?;
        Ok(repository::get_patient(&conn, patient_id)?)
    }

    pub fn list_patients(&self) -> Result<Vec<Patient>, EngineError> {
        let conn = self.store()?;
        Ok(repository::list_patients(&conn)?)
    }

    pub fn update_patient(
        &self,
        patient_id: &Uuid,
        update: &PatientUpdate,
    ) -> Result<Patient, EngineError> {
        if update.is_empty() {
            return Err(EngineError::InvalidValue {
                field: "update".into(),
                reason: "no valid fields provided".into(),
            });
        }
        let conn = self.store()?;
        match repository::update_patient(&conn, patient_id, update) {
            Ok(p) => Ok(p),
            Err(DatabaseError::NotFound { .. }) => Err(EngineError::NotFound {
                entity: "patient".into(),
                id: *patient_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ── Actors (auth collaborator hook) ─────────────────────

    pub fn register_actor(&self, actor: &Actor) -> Result<(), EngineError> {
        let conn = self.store()?;
        Ok(repository::insert_actor(&conn, actor)?)
    }

    /// Resolve a credential (actor id) to an `Actor`.
    pub fn resolve_actor(&self, actor_id: &Uuid) -> Result<Option<Actor>, EngineError> {
        let conn = self.store()?;
        Ok(repository::get_actor(&conn, actor_id)?)
    }

    // ── Sample ingest ───────────────────────────────────────

    /// Append a sample, evaluate the rules over the patient's recent
    /// window, and create-or-refresh alerts for every candidate.
    ///
    /// Ingest is linearized per patient: timestamps must be strictly
    /// increasing within one patient's series.
    pub fn submit_sample(
        &self,
        patient_id: &Uuid,
        recorded_at: NaiveDateTime,
        heart_rate: Option<i64>,
        temperature: Option<f64>,
        spo2: Option<f64>,
    ) -> Result<SampleOutcome, EngineError> {
        validate_vitals(&self.config, heart_rate, temperature, spo2)?;
        let recorded_at = truncate_to_millis(recorded_at);

        let _patient_lock = self
            .patient_locks
            .acquire(*patient_id, self.config.lock_deadline)
            .map_err(|e| Self::lock_err(e, "patient"))?;

        let mut events = Vec::new();
        let outcome = {
            let conn = self.store()?;

            if repository::get_patient(&conn, patient_id)?.is_none() {
                return Err(EngineError::NotFound {
                    entity: "patient".into(),
                    id: *patient_id,
                });
            }

            if let Some(last) = repository::last_recorded_at(&conn, patient_id)? {
                if recorded_at <= last {
                    return Err(EngineError::OutOfOrderTimestamp {
                        patient_id: *patient_id,
                        last,
                        submitted: recorded_at,
                    });
                }
            }

            let sample = VitalSample {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                recorded_at,
                heart_rate,
                temperature,
                spo2,
            };
            repository::insert_sample(&conn, &sample)?;

            let cutoff = recorded_at - self.config.retention;
            let evicted = repository::evict_samples_before(&conn, patient_id, &cutoff)?;
            if evicted > 0 {
                tracing::debug!(patient_id = %patient_id, evicted, "evicted expired samples");
            }

            let since = recorded_at - self.config.lookback;
            let window = repository::samples_since(&conn, patient_id, &since)?;
            let candidates = rules::evaluate(&window, &self.config.thresholds);

            let mut alerts = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let (alert, kind) = self.ingest_candidate(&conn, &candidate)?;
                events.push((kind, alert.clone()));
                alerts.push(alert);
            }

            SampleOutcome { sample, alerts }
        };

        for (kind, alert) in &events {
            self.emit(*kind, alert);
        }
        Ok(outcome)
    }

    /// Create-or-refresh: a candidate for a (patient, rule) pair with an
    /// active alert is absorbed into it, refreshing the triggering-sample
    /// reference and message; otherwise a new open alert is created.
    ///
    /// Severity only ever moves up on absorb: a worsening patient turns a
    /// warning alert critical (and escalatable), while a momentary
    /// improvement never downgrades an alert a nurse may be acting on.
    fn ingest_candidate(
        &self,
        conn: &Connection,
        candidate: &AlertCandidate,
    ) -> Result<(Alert, AlertEventKind), EngineError> {
        if let Some(active) = repository::find_active_alert(conn, &candidate.patient_id, candidate.rule)? {
            let severity = if active.severity == Severity::Critical {
                Severity::Critical
            } else {
                candidate.severity
            };
            repository::refresh_alert_trigger(
                conn,
                &active.id,
                &candidate.sample_id,
                &candidate.message,
                severity,
            )?;
            let refreshed = repository::get_alert(conn, &active.id)?.ok_or(EngineError::NotFound {
                entity: "alert".into(),
                id: active.id,
            })?;
            tracing::debug!(alert_id = %active.id, rule = candidate.rule.as_str(), "alert refreshed");
            return Ok((refreshed, AlertEventKind::Refreshed));
        }

        let alert = Alert {
            id: Uuid::new_v4(),
            patient_id: candidate.patient_id,
            rule: candidate.rule,
            severity: candidate.severity,
            state: AlertState::Open,
            message: candidate.message.clone(),
            sample_id: candidate.sample_id,
            created_at: now_millis(),
            escalated_at: None,
            escalated_by: None,
            reviewed_at: None,
            reviewed_by: None,
            closed_at: None,
            closed_by: None,
        };
        repository::insert_alert(conn, &alert)?;
        tracing::info!(
            alert_id = %alert.id,
            patient_id = %alert.patient_id,
            rule = alert.rule.as_str(),
            severity = alert.severity.as_str(),
            "alert created"
        );
        Ok((alert, AlertEventKind::Created))
    }

    // ── Vital queries ───────────────────────────────────────

    pub fn latest_vital(&self, patient_id: &Uuid) -> Result<Option<VitalSample>, EngineError> {
        let conn = self.store()?;
        self.require_patient(&conn, patient_id)?;
        Ok(repository::latest_sample(&conn, patient_id)?)
    }

    /// Most-recent-first series, capped at `limit`.
    pub fn vital_series(
        &self,
        patient_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<VitalSample>, EngineError> {
        let conn = self.store()?;
        self.require_patient(&conn, patient_id)?;
        Ok(repository::samples_for_patient(&conn, patient_id, limit)?)
    }

    /// Interval-averaged trend for one vital over the `hours` before
    /// `end`, one point per `interval_minutes`.
    pub fn vital_trends(
        &self,
        patient_id: &Uuid,
        kind: VitalKind,
        end: NaiveDateTime,
        hours: i64,
        interval_minutes: i64,
    ) -> Result<Vec<TrendPoint>, EngineError> {
        if hours <= 0 || interval_minutes <= 0 {
            return Err(EngineError::InvalidValue {
                field: "trend window".into(),
                reason: "hours and interval_minutes must be positive".into(),
            });
        }
        let start = end - chrono::Duration::hours(hours);
        let samples = {
            let conn = self.store()?;
            self.require_patient(&conn, patient_id)?;
            repository::samples_between(&conn, patient_id, &start, &end)?
        };
        Ok(risk::trend_series(
            &samples,
            kind,
            start,
            end,
            chrono::Duration::minutes(interval_minutes),
        ))
    }

    // ── Risk ────────────────────────────────────────────────

    /// Risk score over the lookback window. `None` means no samples in
    /// the window — no opinion, which is not the same as no risk.
    pub fn risk_score(&self, patient_id: &Uuid) -> Result<Option<RiskScore>, EngineError> {
        self.risk_score_as_of(patient_id, now_millis())
    }

    /// As-of variant, deterministic for a fixed sample history.
    pub fn risk_score_as_of(
        &self,
        patient_id: &Uuid,
        as_of: NaiveDateTime,
    ) -> Result<Option<RiskScore>, EngineError> {
        let window = {
            let conn = self.store()?;
            self.require_patient(&conn, patient_id)?;
            let since = as_of - self.config.lookback;
            // bounded above as well: an as-of score must not see samples
            // recorded after the as-of instant
            repository::samples_between(&conn, patient_id, &since, &as_of)?
        };
        Ok(risk::score(
            *patient_id,
            &window,
            &self.config.risk,
            self.config.lookback_samples,
            as_of,
        ))
    }

    // ── Alert queries ───────────────────────────────────────

    /// The states a role may see. Doctors work the escalated queue and
    /// its aftermath; nurses see everything for their patients.
    pub fn visible_states(role: Role) -> Vec<AlertState> {
        match role {
            Role::Nurse => vec![
                AlertState::Open,
                AlertState::Escalated,
                AlertState::Reviewed,
                AlertState::Closed,
            ],
            Role::Doctor => vec![
                AlertState::Escalated,
                AlertState::Reviewed,
                AlertState::Closed,
            ],
        }
    }

    /// List alerts under the role visibility policy. A requested state
    /// outside the role's visible set yields an empty result, not an
    /// error.
    pub fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, EngineError> {
        let visible = Self::visible_states(filter.role);
        let states: Vec<AlertState> = match filter.state {
            Some(s) if visible.contains(&s) => vec![s],
            Some(_) => Vec::new(),
            None => visible,
        };
        let conn = self.store()?;
        Ok(repository::list_alerts(
            &conn,
            filter.patient_id.as_ref(),
            &states,
        )?)
    }

    pub fn get_alert(&self, alert_id: &Uuid) -> Result<Option<Alert>, EngineError> {
        let conn = self.store()?;
        Ok(repository::get_alert(&conn, alert_id)?)
    }

    // ── Alert transitions ───────────────────────────────────

    /// Nurse escalates a critical open alert to the doctors' queue.
    pub fn escalate_alert(&self, alert_id: &Uuid, actor: &Actor) -> Result<Alert, EngineError> {
        self.transition(alert_id, actor, AlertState::Escalated)
    }

    /// Nurse or doctor marks an open or escalated alert as reviewed.
    pub fn review_alert(&self, alert_id: &Uuid, actor: &Actor) -> Result<Alert, EngineError> {
        self.transition(alert_id, actor, AlertState::Reviewed)
    }

    /// Nurse or doctor closes a reviewed alert. Closed is terminal.
    pub fn close_alert(&self, alert_id: &Uuid, actor: &Actor) -> Result<Alert, EngineError> {
        self.transition(alert_id, actor, AlertState::Closed)
    }

    fn transition(
        &self,
        alert_id: &Uuid,
        actor: &Actor,
        to: AlertState,
    ) -> Result<Alert, EngineError> {
        let _alert_lock = self
            .alert_locks
            .acquire(*alert_id, self.config.lock_deadline)
            .map_err(|e| Self::lock_err(e, "alert"))?;

        let updated = {
            let conn = self.store()?;
            let alert = repository::get_alert(&conn, alert_id)?.ok_or(EngineError::NotFound {
                entity: "alert".into(),
                id: *alert_id,
            })?;

            check_guard(&alert, actor, to)?;

            let applied = repository::cas_transition(
                &conn,
                alert_id,
                alert.state,
                to,
                &actor.id,
                &now_millis(),
            )?;
            if !applied {
                // Lost a race despite the lock (external writer); surface
                // the fresh state rather than a stale success.
                let fresh = repository::get_alert(&conn, alert_id)?
                    .map(|a| a.state)
                    .unwrap_or(alert.state);
                return Err(EngineError::InvalidTransition {
                    alert_id: *alert_id,
                    state: fresh,
                    reason: "state changed concurrently".into(),
                });
            }

            repository::get_alert(&conn, alert_id)?.ok_or(EngineError::NotFound {
                entity: "alert".into(),
                id: *alert_id,
            })?
        };

        tracing::info!(
            alert_id = %alert_id,
            actor_id = %actor.id,
            role = actor.role.as_str(),
            to = to.as_str(),
            "alert transitioned"
        );
        let kind = match to {
            AlertState::Escalated => AlertEventKind::Escalated,
            AlertState::Reviewed => AlertEventKind::Reviewed,
            AlertState::Closed => AlertEventKind::Closed,
            AlertState::Open => unreachable!("open is not a transition target"),
        };
        self.emit(kind, &updated);
        Ok(updated)
    }

    fn require_patient(&self, conn: &Connection, patient_id: &Uuid) -> Result<(), EngineError> {
        if repository::get_patient(conn, patient_id)?.is_none() {
            return Err(EngineError::NotFound {
                entity: "patient".into(),
                id: *patient_id,
            });
        }
        Ok(())
    }
}

/// Guard predicates for the lifecycle state machine, checked once at the
/// transition boundary.
fn check_guard(alert: &Alert, actor: &Actor, to: AlertState) -> Result<(), EngineError> {
    let fail = |reason: String| {
        Err(EngineError::InvalidTransition {
            alert_id: alert.id,
            state: alert.state,
            reason,
        })
    };

    if alert.state.is_terminal() {
        return fail("alert is closed".into());
    }

    match to {
        AlertState::Escalated => {
            if actor.role != Role::Nurse {
                return fail(format!(
                    "only nurses can escalate, actor role is {}",
                    actor.role.as_str()
                ));
            }
            if alert.severity != Severity::Critical {
                return fail(format!(
                    "only critical alerts can be escalated, severity is {}",
                    alert.severity.as_str()
                ));
            }
            if alert.state != AlertState::Open {
                return fail(format!(
                    "escalation requires an open alert, state is {}",
                    alert.state.as_str()
                ));
            }
        }
        AlertState::Reviewed => {
            if !alert.state.is_active() {
                return fail(format!(
                    "review requires an open or escalated alert, state is {}",
                    alert.state.as_str()
                ));
            }
        }
        AlertState::Closed => {
            if alert.state != AlertState::Reviewed {
                return fail(format!(
                    "close requires a reviewed alert, state is {}",
                    alert.state.as_str()
                ));
            }
        }
        AlertState::Open => {
            return fail("open is the initial state, not a transition target".into());
        }
    }
    Ok(())
}

fn validate_vitals(
    config: &EngineConfig,
    heart_rate: Option<i64>,
    temperature: Option<f64>,
    spo2: Option<f64>,
) -> Result<(), EngineError> {
    if heart_rate.is_none() && temperature.is_none() && spo2.is_none() {
        return Err(EngineError::InvalidValue {
            field: "sample".into(),
            reason: "at least one vital is required".into(),
        });
    }
    if let Some(hr) = heart_rate {
        let (lo, hi) = config.ranges.heart_rate;
        if hr < lo || hr > hi {
            return Err(EngineError::InvalidValue {
                field: "heart_rate".into(),
                reason: format!("must be between {lo} and {hi}"),
            });
        }
    }
    if let Some(temp) = temperature {
        let (lo, hi) = config.ranges.temperature;
        if !temp.is_finite() || temp < lo || temp > hi {
            return Err(EngineError::InvalidValue {
                field: "temperature".into(),
                reason: format!("must be between {lo} and {hi}"),
            });
        }
    }
    if let Some(s) = spo2 {
        let (lo, hi) = config.ranges.spo2;
        if !s.is_finite() || s < lo || s > hi {
            return Err(EngineError::InvalidValue {
                field: "spo2".into(),
                reason: format!("must be between {lo} and {hi}"),
            });
        }
    }
    Ok(())
}

/// Current UTC time truncated to the storage precision.
fn now_millis() -> NaiveDateTime {
    truncate_to_millis(Utc::now().naive_utc())
}

fn truncate_to_millis(ts: NaiveDateTime) -> NaiveDateTime {
    let sub_ms_nanos = (ts.nanosecond() % 1_000_000) as i64;
    ts - chrono::Duration::nanoseconds(sub_ms_nanos)
}
