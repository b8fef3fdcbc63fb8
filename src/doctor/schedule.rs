use actix_web::{
    get, post,
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use deadpool_postgres::Pool;
use serde::Deserialize;
use serde_json::json;

use super::{get_doctor, Schedule};
use crate::appointments::store::{self, OLDEST_FIRST};
use crate::db::Filter;
use crate::error::AppError;
use crate::forms::{non_blank, parse_time};
use crate::identity::DoctorUser;
use crate::settings::SystemSettings;

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(get_schedule);
    cfg.service(update_schedule);
}

#[get("/dashboard/doctor/schedule")]
async fn get_schedule(
    doctor: DoctorUser,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let settings = SystemSettings::load(&db_conn).await?;
    let mut profile = get_doctor(&db_conn, doctor.profile_id).await?;
    profile.schedule.slot_minutes = Some(settings.slot_minutes_for(profile.schedule.slot_minutes));

    let mut filter = Filter::new();
    filter.push("a.doctor_id = ?", doctor.profile_id);
    filter.require("a.status IN ('Approved', 'Rescheduled')");
    let upcoming = store::list(&db_conn, &filter, OLDEST_FIRST, None).await?;

    Ok(HttpResponse::Ok().json(json!({
        "profile": profile,
        "upcomingAppointments": upcoming,
    })))
}

/// Raw schedule fields; `schedule_published` is a checkbox.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleForm {
    working_days: Option<String>,
    clinic_start_time: Option<String>,
    clinic_end_time: Option<String>,
    break_start_time: Option<String>,
    break_end_time: Option<String>,
    slot_minutes: Option<String>,
    schedule_notes: Option<String>,
    #[serde(default)]
    schedule_published: bool,
}

impl ScheduleForm {
    /// Unparseable times are cleared. A slot length that is not all
    /// digits takes the site default.
    fn into_schedule(self, settings: &SystemSettings, current_slot: Option<i32>) -> Schedule {
        let time = |value: &Option<String>| non_blank(value).and_then(parse_time);
        let slot_minutes = match non_blank(&self.slot_minutes) {
            Some(raw) if raw.chars().all(|c| c.is_ascii_digit()) => raw.parse::<i32>().ok(),
            _ => None,
        }
        .or_else(|| Some(settings.default_slot_minutes).filter(|m| *m > 0))
        .or(current_slot);

        Schedule {
            working_days: non_blank(&self.working_days).unwrap_or_default().to_string(),
            clinic_start_time: time(&self.clinic_start_time),
            clinic_end_time: time(&self.clinic_end_time),
            break_start_time: time(&self.break_start_time),
            break_end_time: time(&self.break_end_time),
            slot_minutes,
            schedule_notes: non_blank(&self.schedule_notes).unwrap_or_default().to_string(),
            schedule_published: self.schedule_published,
        }
    }
}

#[post("/dashboard/doctor/schedule")]
async fn update_schedule(
    doctor: DoctorUser,
    schedule_form: web::Json<ScheduleForm>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let settings = SystemSettings::load(&db_conn).await?;
    let profile = get_doctor(&db_conn, doctor.profile_id).await?;
    let schedule = schedule_form
        .into_inner()
        .into_schedule(&settings, profile.schedule.slot_minutes);

    db_conn
        .execute(
            "UPDATE doctor_profiles SET working_days=$1, clinic_start_time=$2, clinic_end_time=$3,
                break_start_time=$4, break_end_time=$5, slot_minutes=$6, schedule_notes=$7,
                schedule_published=$8
             WHERE id = $9",
            &[
                &schedule.working_days,
                &schedule.clinic_start_time,
                &schedule.clinic_end_time,
                &schedule.break_start_time,
                &schedule.break_end_time,
                &schedule.slot_minutes,
                &schedule.schedule_notes,
                &schedule.schedule_published,
                &doctor.profile_id,
            ],
        )
        .await?;
    log::info!(
        "user {} updated the schedule of doctor profile {}",
        doctor.user.id,
        doctor.profile_id
    );

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Schedule updated.",
        "schedule": schedule,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn bad_times_are_cleared() {
        let form = ScheduleForm {
            working_days: Some(" Mon-Fri ".into()),
            clinic_start_time: Some("09:00".into()),
            clinic_end_time: Some("5pm".into()),
            break_start_time: Some("".into()),
            break_end_time: Some("13:30".into()),
            slot_minutes: Some("20".into()),
            schedule_published: true,
            ..ScheduleForm::default()
        };
        let schedule = form.into_schedule(&SystemSettings::default(), None);
        assert_eq!(schedule.working_days, "Mon-Fri");
        assert_eq!(schedule.clinic_start_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(schedule.clinic_end_time, None);
        assert_eq!(schedule.break_start_time, None);
        assert_eq!(schedule.break_end_time, NaiveTime::from_hms_opt(13, 30, 0));
        assert_eq!(schedule.slot_minutes, Some(20));
        assert!(schedule.schedule_published);
    }

    #[test]
    fn non_digit_slot_takes_site_default() {
        let settings = SystemSettings {
            default_slot_minutes: 25,
            ..SystemSettings::default()
        };
        let form = ScheduleForm {
            slot_minutes: Some("-10".into()),
            ..ScheduleForm::default()
        };
        assert_eq!(form.into_schedule(&settings, Some(40)).slot_minutes, Some(25));

        let form = ScheduleForm::default();
        let schedule = form.into_schedule(&settings, Some(40));
        assert_eq!(schedule.slot_minutes, Some(25));
        assert!(!schedule.schedule_published);
    }
}
