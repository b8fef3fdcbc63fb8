//! Appointment status workflow.
//!
//! Every mutation of an appointment is planned here first. A plan either
//! fails with a [`WorkflowError`] (nothing is written) or yields a
//! [`Transition`] that the store applies conditionally on the status and
//! version the plan was computed from.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::models::{Appointment, AppointmentStatus};
use crate::forms::{parse_date, parse_time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// Patient account id.
    Patient(i32),
    /// Doctor profile id.
    Doctor(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    /// Both fields are required and must be `YYYY-MM-DD` / `HH:MM`.
    pub fn parse(date: &str, time: &str) -> Result<Slot, WorkflowError> {
        if date.trim().is_empty() || time.trim().is_empty() {
            return Err(WorkflowError::Invalid("Both date and time are required."));
        }
        match (parse_date(date), parse_time(time)) {
            (Some(date), Some(time)) => Ok(Slot { date, time }),
            _ => Err(WorkflowError::Invalid("Invalid date or time.")),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// A slot strictly after `now`.
    pub fn future(date: &str, time: &str, now: NaiveDateTime) -> Result<Slot, WorkflowError> {
        let slot = Slot::parse(date, time)?;
        if slot.starts_at() <= now {
            return Err(WorkflowError::Invalid("Choose a future date/time."));
        }
        Ok(slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Cancel,
    Reschedule(Slot),
    Approve,
    Reject,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    /// The actor does not own the appointment or may not take the action.
    Forbidden,
    /// Malformed or out of range input.
    Invalid(&'static str),
    /// The current status does not admit the action.
    NotAllowed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub appointment_id: i32,
    pub expected: AppointmentStatus,
    pub expected_version: i32,
    pub next: AppointmentStatus,
    pub slot: Option<Slot>,
}

fn owns(appointment: &Appointment, actor: Actor) -> bool {
    match actor {
        Actor::Patient(user_id) => appointment.patient_id == user_id,
        Actor::Doctor(profile_id) => appointment.doctor_id == profile_id,
    }
}

/// Ownership check on its own, for handlers that must refuse non-owners
/// before looking at their input.
pub fn authorize(appointment: &Appointment, actor: Actor) -> Result<(), WorkflowError> {
    if owns(appointment, actor) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden)
    }
}

/// Plans `action` by `actor` on `appointment` at wall-clock time `now`.
pub fn plan(
    appointment: &Appointment,
    actor: Actor,
    action: Action,
    now: NaiveDateTime,
) -> Result<Transition, WorkflowError> {
    authorize(appointment, actor)?;
    let current = appointment.status;

    let (next, slot) = match (actor, action) {
        (Actor::Patient(_), Action::Cancel) => {
            if !current.can_become(AppointmentStatus::Cancelled) {
                return Err(WorkflowError::NotAllowed("This appointment cannot be cancelled."));
            }
            if appointment.starts_at() <= now {
                return Err(WorkflowError::NotAllowed("Past appointments cannot be cancelled."));
            }
            (AppointmentStatus::Cancelled, None)
        }
        (_, Action::Reschedule(slot)) => {
            if slot.starts_at() <= now {
                return Err(WorkflowError::Invalid("Choose a future date/time."));
            }
            if !current.can_become(AppointmentStatus::Rescheduled) {
                return Err(WorkflowError::NotAllowed("This appointment cannot be rescheduled."));
            }
            (AppointmentStatus::Rescheduled, Some(slot))
        }
        (Actor::Doctor(_), Action::Approve) => {
            if current != AppointmentStatus::Pending {
                return Err(WorkflowError::NotAllowed("Only pending appointments can be approved."));
            }
            (AppointmentStatus::Approved, None)
        }
        (Actor::Doctor(_), Action::Reject) => {
            if current != AppointmentStatus::Pending {
                return Err(WorkflowError::NotAllowed("Only pending appointments can be rejected."));
            }
            (AppointmentStatus::Rejected, None)
        }
        (Actor::Doctor(_), Action::Complete) => {
            if !current.can_become(AppointmentStatus::Completed) {
                return Err(WorkflowError::NotAllowed("This appointment cannot be completed."));
            }
            (AppointmentStatus::Completed, None)
        }
        (Actor::Doctor(_), Action::Cancel) => {
            if !current.can_become(AppointmentStatus::Cancelled) {
                return Err(WorkflowError::NotAllowed("This appointment cannot be cancelled."));
            }
            (AppointmentStatus::Cancelled, None)
        }
        (Actor::Patient(_), Action::Approve | Action::Reject | Action::Complete) => {
            return Err(WorkflowError::Forbidden)
        }
    };

    Ok(Transition {
        appointment_id: appointment.id,
        expected: current,
        expected_version: appointment.version,
        next,
        slot,
    })
}
