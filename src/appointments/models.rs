use chrono::prelude::*;
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use tokio_postgres::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, ToSql, FromSql)]
#[postgres(name = "appointment_status")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rescheduled,
    Cancelled,
    Completed,
    Rejected,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rescheduled,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
        AppointmentStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Approved => "Approved",
            AppointmentStatus::Rescheduled => "Rescheduled",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Rejected | AppointmentStatus::Cancelled
        )
    }

    pub fn can_become(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match self {
            Pending => matches!(next, Approved | Rejected | Rescheduled | Cancelled),
            Approved => matches!(next, Rescheduled | Cancelled | Completed),
            Rescheduled => matches!(next, Approved | Rescheduled | Cancelled | Completed),
            Completed | Rejected | Cancelled => false,
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or(())
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Appointment {
    pub id: i32,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub department: String,
    pub hospital: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub symptoms: String,
    pub status: AppointmentStatus,
    pub version: i32,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Appointment {
    pub fn code(&self) -> String {
        appointment_code(self.id)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

pub fn appointment_code(id: i32) -> String {
    format!("A-10{}", id)
}

impl From<&Row> for Appointment {
    fn from(row: &Row) -> Self {
        Appointment {
            id: row.get("id"),
            patient_id: row.get("patient_id"),
            doctor_id: row.get("doctor_id"),
            department: row.get("department"),
            hospital: row.get("hospital"),
            date: row.get("date"),
            time: row.get("time"),
            symptoms: row.get("symptoms"),
            status: row.get("status"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// An appointment joined with the names needed by listings, exports and
/// audit messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub code: String,
    pub patient_username: String,
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_name: String,
    pub doctor_specialization: String,
}

impl From<&Row> for AppointmentView {
    fn from(row: &Row) -> Self {
        let appointment = Appointment::from(row);
        let patient_username: String = row.get("patient_username");
        let patient_first: String = row.get("patient_first_name");
        let patient_last: String = row.get("patient_last_name");
        let doctor_username: String = row.get("doctor_username");
        let doctor_first: String = row.get("doctor_first_name");
        let doctor_last: String = row.get("doctor_last_name");
        AppointmentView {
            code: appointment.code(),
            patient_name: display_name(&patient_first, &patient_last, &patient_username),
            patient_username,
            patient_email: row.get("patient_email"),
            doctor_name: display_name(&doctor_first, &doctor_last, &doctor_username),
            doctor_specialization: row.get("doctor_specialization"),
            appointment,
        }
    }
}

/// Full name, or the username when both name parts are blank.
pub fn display_name(first: &str, last: &str, username: &str) -> String {
    let full = format!("{} {}", first.trim(), last.trim());
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_accept_nothing() {
        for from in AppointmentStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in AppointmentStatus::ALL.iter() {
                assert!(!from.can_become(*to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn transition_table() {
        use AppointmentStatus::*;
        assert!(Pending.can_become(Approved));
        assert!(Pending.can_become(Cancelled));
        assert!(!Pending.can_become(Completed));
        assert!(!Approved.can_become(Approved));
        assert!(!Approved.can_become(Rejected));
        assert!(Approved.can_become(Completed));
        assert!(Rescheduled.can_become(Rescheduled));
        assert!(Rescheduled.can_become(Approved));
        assert!(!Rescheduled.can_become(Pending));
    }

    #[test]
    fn code_prefixes_id() {
        assert_eq!(appointment_code(7), "A-107");
        assert_eq!(appointment_code(42), "A-1042");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        assert_eq!(display_name("Ada", "Lovelace", "ada@x.org"), "Ada Lovelace");
        assert_eq!(display_name("", "  ", "ada@x.org"), "ada@x.org");
        assert_eq!(display_name("Ada", "", "ada@x.org"), "Ada");
    }

    #[test]
    fn status_parses_from_label() {
        assert_eq!("approved".parse(), Ok(AppointmentStatus::Approved));
        assert_eq!(" Cancelled ".parse(), Ok(AppointmentStatus::Cancelled));
        assert_eq!("Active".parse::<AppointmentStatus>(), Err(()));
    }

    #[test]
    fn status_serializes_as_label() {
        let json = serde_json::to_string(&AppointmentStatus::Rescheduled).unwrap();
        assert_eq!(json, "\"Rescheduled\"");
    }
}
