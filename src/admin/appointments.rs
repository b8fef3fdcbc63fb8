use actix_web::{
    get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use deadpool_postgres::Pool;

use super::AppointmentQuery;
use crate::appointments::store::{self, NEWEST_FIRST};
use crate::appointments::AppointmentView;
use crate::error::AppError;
use crate::identity::Staff;

const EXPORT_FILENAME: &str = "dabs_appointments.csv";

const EXPORT_HEADER: [&str; 11] = [
    "ID",
    "Appt Code",
    "Patient",
    "Patient Email",
    "Doctor",
    "Specialization",
    "Department",
    "Hospital",
    "Date",
    "Time",
    "Status",
];

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(list_appointments);
    cfg.service(export_appointments);
}

#[get("/dabs-admin/appointments")]
async fn list_appointments(
    _staff: Staff,
    query: web::Query<AppointmentQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let filter = query.to_filter()?;
    let db_conn = db_pool.get().await?;
    let appointments = store::list(&db_conn, &filter, NEWEST_FIRST, None).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

/// One header line, then one line per appointment in the given order.
pub fn render_csv(appointments: &[AppointmentView]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;
    for view in appointments {
        let a = &view.appointment;
        writer.write_record(&[
            a.id.to_string(),
            view.code.clone(),
            view.patient_name.clone(),
            view.patient_email.clone(),
            format!("Dr. {}", view.doctor_name),
            view.doctor_specialization.clone(),
            a.department.clone(),
            a.hospital.clone(),
            a.date.format("%Y-%m-%d").to_string(),
            a.time.format("%H:%M").to_string(),
            a.status.to_string(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

#[get("/dabs-admin/appointments/export/csv")]
async fn export_appointments(
    staff: Staff,
    query: web::Query<AppointmentQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let filter = query.to_filter()?;
    let db_conn = db_pool.get().await?;
    let appointments = store::list(&db_conn, &filter, NEWEST_FIRST, None).await?;
    let body = render_csv(&appointments)?;
    log::info!("staff {} exported {} appointments", staff.0.id, appointments.len());

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(EXPORT_FILENAME.to_string())],
        })
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::{appointment_code, Appointment, AppointmentStatus};
    use chrono::{Local, NaiveDate, NaiveTime};

    fn view(id: i32, date: &str, time: &str, status: AppointmentStatus) -> AppointmentView {
        AppointmentView {
            appointment: Appointment {
                id,
                patient_id: 10,
                doctor_id: 3,
                department: "Heart Unit".into(),
                hospital: "City General, East Wing".into(),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
                symptoms: String::new(),
                status,
                version: 0,
                created_at: Local::now(),
                updated_at: Local::now(),
            },
            code: appointment_code(id),
            patient_username: "ada@example.org".into(),
            patient_name: "Ada Lovelace".into(),
            patient_email: "ada@example.org".into(),
            doctor_name: "Grace Hopper".into(),
            doctor_specialization: "Cardiology".into(),
        }
    }

    #[test]
    fn export_has_header_and_one_line_per_appointment() {
        let rows = vec![
            view(12, "2025-04-02", "09:30", AppointmentStatus::Approved),
            view(5, "2025-03-28", "14:00", AppointmentStatus::Cancelled),
        ];
        let csv = String::from_utf8(render_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "ID,Appt Code,Patient,Patient Email,Doctor,Specialization,Department,Hospital,Date,Time,Status"
        );
        assert_eq!(
            lines[1],
            "12,A-1012,Ada Lovelace,ada@example.org,Dr. Grace Hopper,Cardiology,Heart Unit,\"City General, East Wing\",2025-04-02,09:30,Approved"
        );
        assert!(lines[2].starts_with("5,A-105,"));
        assert!(lines[2].ends_with(",2025-03-28,14:00,Cancelled"));
    }

    #[test]
    fn empty_export_is_just_the_header() {
        let csv = String::from_utf8(render_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
