use deadpool_postgres::Client;
use serde::{Deserialize, Serialize};
use tokio_postgres::row::Row;

use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::Role;

pub const DEFAULT_SITE_NAME: &str = "DABS";
pub const DEFAULT_SLOT_MINUTES: i32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct SystemSettings {
    pub site_name: String,
    pub hospital_name: String,
    pub support_email: String,
    pub support_phone: String,
    pub default_slot_minutes: i32,
    pub allow_patient_registration: bool,
    pub allow_doctor_registration: bool,
    pub maintenance_mode: bool,
    pub updated_by: Option<i32>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        SystemSettings {
            site_name: DEFAULT_SITE_NAME.to_string(),
            hospital_name: String::new(),
            support_email: String::new(),
            support_phone: String::new(),
            default_slot_minutes: DEFAULT_SLOT_MINUTES,
            allow_patient_registration: true,
            allow_doctor_registration: true,
            maintenance_mode: false,
            updated_by: None,
        }
    }
}

impl From<&Row> for SystemSettings {
    fn from(row: &Row) -> Self {
        SystemSettings {
            site_name: row.get("site_name"),
            hospital_name: row.get("hospital_name"),
            support_email: row.get("support_email"),
            support_phone: row.get("support_phone"),
            default_slot_minutes: row.get("default_slot_minutes"),
            allow_patient_registration: row.get("allow_patient_registration"),
            allow_doctor_registration: row.get("allow_doctor_registration"),
            maintenance_mode: row.get("maintenance_mode"),
            updated_by: row.get("updated_by"),
        }
    }
}

impl SystemSettings {
    /// Reads the singleton row, creating it with defaults on first use.
    pub async fn load(db_conn: &Client) -> Result<SystemSettings, AppError> {
        if let Some(row) = db_conn
            .query_opt("SELECT * FROM system_settings WHERE id = 1", &[])
            .await?
        {
            return Ok(SystemSettings::from(&row));
        }
        let row = db_conn
            .query_one(
                "INSERT INTO system_settings (id) VALUES (1)
                 ON CONFLICT (id) DO UPDATE SET id = system_settings.id
                 RETURNING *",
                &[],
            )
            .await?;
        Ok(SystemSettings::from(&row))
    }

    pub async fn save(&self, db_conn: &Client) -> Result<(), AppError> {
        db_conn
            .execute(
                "UPDATE system_settings SET site_name=$1, hospital_name=$2, support_email=$3,
                    support_phone=$4, default_slot_minutes=$5, allow_patient_registration=$6,
                    allow_doctor_registration=$7, maintenance_mode=$8, updated_by=$9,
                    updated_at=now()
                 WHERE id = 1",
                &[
                    &self.site_name,
                    &self.hospital_name,
                    &self.support_email,
                    &self.support_phone,
                    &self.default_slot_minutes,
                    &self.allow_patient_registration,
                    &self.allow_doctor_registration,
                    &self.maintenance_mode,
                    &self.updated_by,
                ],
            )
            .await?;
        Ok(())
    }

    /// Refuses self-registration for `role` when the matching switch is off.
    pub fn registration_gate(&self, role: Role) -> Result<(), AppError> {
        match role {
            Role::Patient if !self.allow_patient_registration => Err(AppError::redirect(
                "New patient registrations are currently disabled by the administrator.",
            )),
            Role::Doctor if !self.allow_doctor_registration => Err(AppError::redirect(
                "New doctor registrations are currently disabled by the administrator.",
            )),
            Role::Admin => Err(AppError::Forbidden),
            _ => Ok(()),
        }
    }

    /// The doctor's own slot length, else the site default.
    pub fn slot_minutes_for(&self, doctor_slot: Option<i32>) -> i32 {
        doctor_slot
            .filter(|minutes| *minutes > 0)
            .unwrap_or(self.default_slot_minutes)
    }

    pub fn apply(&mut self, form: SettingsForm, staff_id: i32) {
        self.site_name = non_blank(&form.site_name)
            .unwrap_or(DEFAULT_SITE_NAME)
            .to_string();
        self.hospital_name = non_blank(&form.hospital_name).unwrap_or_default().to_string();
        self.support_email = non_blank(&form.support_email).unwrap_or_default().to_string();
        self.support_phone = non_blank(&form.support_phone).unwrap_or_default().to_string();

        let previous = if self.default_slot_minutes > 0 {
            self.default_slot_minutes
        } else {
            DEFAULT_SLOT_MINUTES
        };
        self.default_slot_minutes = match non_blank(&form.default_slot_minutes) {
            None => previous,
            Some(raw) => match raw.parse::<i32>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => previous,
            },
        };

        self.allow_patient_registration = form.allow_patient_registration;
        self.allow_doctor_registration = form.allow_doctor_registration;
        self.maintenance_mode = form.maintenance_mode;
        self.updated_by = Some(staff_id);
    }
}

/// Checkboxes that are left out of the body count as unchecked.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub site_name: Option<String>,
    pub hospital_name: Option<String>,
    pub support_email: Option<String>,
    pub support_phone: Option<String>,
    pub default_slot_minutes: Option<String>,
    #[serde(default)]
    pub allow_patient_registration: bool,
    #[serde(default)]
    pub allow_doctor_registration: bool,
    #[serde(default)]
    pub maintenance_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn disabled_patient_registration_redirects() {
        let settings = SystemSettings {
            allow_patient_registration: false,
            ..SystemSettings::default()
        };
        let err = settings.registration_gate(Role::Patient).unwrap_err();
        assert!(matches!(err, AppError::Redirect(_)));
        assert_eq!(err.error_response().status(), actix_web::http::StatusCode::SEE_OTHER);
        assert!(settings.registration_gate(Role::Doctor).is_ok());
    }

    #[test]
    fn gates_are_independent() {
        let settings = SystemSettings {
            allow_doctor_registration: false,
            ..SystemSettings::default()
        };
        assert!(settings.registration_gate(Role::Patient).is_ok());
        assert!(settings.registration_gate(Role::Doctor).is_err());
    }

    #[test]
    fn form_defaults_blank_site_name_and_bad_slot() {
        let mut settings = SystemSettings {
            default_slot_minutes: 20,
            ..SystemSettings::default()
        };
        let form = SettingsForm {
            site_name: Some("   ".into()),
            default_slot_minutes: Some("-5".into()),
            allow_patient_registration: true,
            ..SettingsForm::default()
        };
        settings.apply(form, 1);
        assert_eq!(settings.site_name, "DABS");
        assert_eq!(settings.default_slot_minutes, 20);
        assert!(settings.allow_patient_registration);
        assert!(!settings.allow_doctor_registration);
        assert_eq!(settings.updated_by, Some(1));

        let form = SettingsForm {
            default_slot_minutes: Some("thirty".into()),
            ..SettingsForm::default()
        };
        settings.apply(form, 1);
        assert_eq!(settings.default_slot_minutes, 20);

        let form = SettingsForm {
            default_slot_minutes: Some("30".into()),
            ..SettingsForm::default()
        };
        settings.apply(form, 1);
        assert_eq!(settings.default_slot_minutes, 30);
    }

    #[test]
    fn doctor_slot_falls_back_to_default() {
        let settings = SystemSettings::default();
        assert_eq!(settings.slot_minutes_for(None), 15);
        assert_eq!(settings.slot_minutes_for(Some(0)), 15);
        assert_eq!(settings.slot_minutes_for(Some(25)), 25);
    }
}
