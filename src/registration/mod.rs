use actix_web::{
    post,
    web::{self, ServiceConfig},
    HttpRequest, HttpResponse, Result,
};
use deadpool_postgres::Pool;
use serde::Deserialize;
use serde_json::json;

use crate::accounts::{create_user, email_taken, Account, NewAccount};
use crate::audit::{AuditEvent, AuditSink};
use crate::doctor::{create_profile, NewProfile};
use crate::error::AppError;
use crate::forms::{non_blank, normalize_email};
use crate::identity::Role;
use crate::settings::SystemSettings;

const DUPLICATE_EMAIL: &str = "An account with this email already exists.";

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(register_patient);
    cfg.service(register_doctor);
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountForm {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    #[serde(default)]
    password: String,
    #[serde(default, alias = "password2")]
    confirm_password: String,
}

impl AccountForm {
    /// Checks run in order: matching passwords, then a present email.
    fn validate(&self, is_staff: bool) -> Result<NewAccount, AppError> {
        if self.password != self.confirm_password {
            return Err(AppError::validation("Passwords do not match."));
        }
        let email = non_blank(&self.email)
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::validation("Email is required."))?;
        Ok(NewAccount {
            email,
            first_name: non_blank(&self.first_name).unwrap_or_default().to_string(),
            last_name: non_blank(&self.last_name).unwrap_or_default().to_string(),
            phone: non_blank(&self.phone).unwrap_or_default().to_string(),
            password: self.password.clone(),
            is_staff,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorRegistrationForm {
    #[serde(flatten)]
    account: AccountForm,
    registration_no: Option<String>,
    specialization: Option<String>,
    #[serde(alias = "experience_years")]
    experience: Option<String>,
    hospital: Option<String>,
    city: Option<String>,
    #[serde(alias = "slot_preference")]
    slot_pref: Option<String>,
    fee: Option<String>,
    bio: Option<String>,
}

impl DoctorRegistrationForm {
    fn profile(&self) -> NewProfile {
        let text = |value: &Option<String>| non_blank(value).unwrap_or_default().to_string();
        NewProfile {
            registration_no: text(&self.registration_no),
            specialization: text(&self.specialization),
            experience_years: NewProfile::experience(non_blank(&self.experience)),
            hospital: text(&self.hospital),
            city: text(&self.city),
            slot_preference: text(&self.slot_pref),
            fee: NewProfile::fee(non_blank(&self.fee)),
            bio: text(&self.bio),
        }
    }
}

fn duplicate_email(err: AppError) -> AppError {
    if err.is_unique_violation() {
        AppError::validation(DUPLICATE_EMAIL)
    } else {
        err
    }
}

async fn record_signup(audit: &dyn AuditSink, req: &HttpRequest, account: &Account) {
    audit
        .record(AuditEvent::user_created(account.id, &account.username).from_request(req))
        .await;
}

#[post("/register/patient")]
async fn register_patient(
    form: web::Json<AccountForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    SystemSettings::load(&db_conn)
        .await?
        .registration_gate(Role::Patient)?;

    let new = form.validate(false)?;
    if email_taken(&**db_conn, &new.email).await? {
        return Err(AppError::validation(DUPLICATE_EMAIL));
    }
    let account = create_user(&**db_conn, &new).await.map_err(duplicate_email)?;
    log::info!("patient account {} registered", account.id);
    record_signup(audit.get_ref(), &req, &account).await;

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Registration successful. Please login.",
        "id": account.id,
    })))
}

#[post("/register/doctor")]
async fn register_doctor(
    form: web::Json<DoctorRegistrationForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let mut db_conn = db_pool.get().await?;
    SystemSettings::load(&db_conn)
        .await?
        .registration_gate(Role::Doctor)?;

    let new = form.account.validate(false)?;
    if email_taken(&**db_conn, &new.email).await? {
        return Err(AppError::validation(DUPLICATE_EMAIL));
    }

    let txn = db_conn.transaction().await?;
    let account = create_user(&*txn, &new).await.map_err(duplicate_email)?;
    let profile_id = create_profile(&txn, account.id, &form.profile()).await?;
    txn.commit().await?;
    log::info!("doctor profile {} registered for account {}", profile_id, account.id);
    record_signup(audit.get_ref(), &req, &account).await;

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Doctor registered. Status: Pending approval. You can login after admin approval.",
        "id": account.id,
        "doctorId": profile_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::MemorySink;
    use crate::db::testing::{count, live_pool, unique_email};
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;

    fn form(password: &str, confirm: &str, email: Option<&str>) -> AccountForm {
        AccountForm {
            first_name: Some(" Ada ".into()),
            last_name: Some("Lovelace".into()),
            email: email.map(String::from),
            phone: None,
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    fn message(err: AppError) -> String {
        match err {
            AppError::Validation(msg) => msg,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[::core::prelude::v1::test]
    fn password_mismatch_is_checked_before_email() {
        let err = form("one", "two", None).validate(false).unwrap_err();
        assert_eq!(message(err), "Passwords do not match.");
    }

    #[::core::prelude::v1::test]
    fn email_is_required() {
        let err = form("pw", "pw", Some("   ")).validate(false).unwrap_err();
        assert_eq!(message(err), "Email is required.");
    }

    #[::core::prelude::v1::test]
    fn email_becomes_lowercase_username() {
        let new = form("pw", "pw", Some(" Ada@Example.COM ")).validate(false).unwrap();
        assert_eq!(new.email, "ada@example.com");
        assert_eq!(new.username(), "ada@example.com");
        assert_eq!(new.first_name, "Ada");
        assert!(!new.is_staff);
    }

    #[::core::prelude::v1::test]
    fn doctor_form_reads_loose_numbers() {
        let doctor: DoctorRegistrationForm = serde_json::from_value(json!({
            "email": "doc@example.com",
            "password": "pw",
            "confirm_password": "pw",
            "specialization": "Cardiology",
            "experience": "seven",
            "fee": "",
            "slot_pref": "Mornings",
        }))
        .unwrap();
        let profile = doctor.profile();
        assert_eq!(profile.specialization, "Cardiology");
        assert_eq!(profile.experience_years, 0);
        assert_eq!(profile.fee, None);
        assert_eq!(profile.slot_preference, "Mornings");
        assert!(doctor.account.validate(false).is_ok());
    }

    #[::core::prelude::v1::test]
    fn only_unique_violations_become_duplicates() {
        assert!(matches!(duplicate_email(AppError::NotFound), AppError::NotFound));
    }

    async fn switch(db_pool: &Pool, column: &str, open: bool) {
        let db_conn = db_pool.get().await.unwrap();
        SystemSettings::load(&db_conn).await.unwrap();
        let sql = format!("UPDATE system_settings SET {} = $1 WHERE id = 1", column);
        db_conn.execute(sql.as_str(), &[&open]).await.unwrap();
    }

    fn signup(email: &str) -> serde_json::Value {
        json!({
            "first_name": "Pat",
            "email": email,
            "password": "pw",
            "confirm_password": "pw",
        })
    }

    #[actix_rt::test]
    async fn duplicate_email_leaves_one_account() {
        let db_pool = match live_pool(2).await {
            Some(db_pool) => db_pool,
            None => return,
        };
        let email = unique_email("dup");
        switch(&db_pool, "allow_patient_registration", true).await;
        let sink: Arc<dyn AuditSink> = Arc::new(MemorySink::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db_pool.clone()))
                .app_data(web::Data::from(sink))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register/patient")
            .set_json(signup(&email))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let shouted = format!("  {} ", email.to_uppercase());
        let req = test::TestRequest::post()
            .uri("/register/patient")
            .set_json(signup(&shouted))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], DUPLICATE_EMAIL);

        let accounts = "SELECT COUNT(*) FROM users WHERE username = $1";
        assert_eq!(count(&db_pool, accounts, &[&email]).await, 1);
    }

    #[actix_rt::test]
    async fn closed_doctor_registration_creates_nothing() {
        let db_pool = match live_pool(2).await {
            Some(db_pool) => db_pool,
            None => return,
        };
        let email = unique_email("closed");
        switch(&db_pool, "allow_doctor_registration", false).await;
        let sink: Arc<dyn AuditSink> = Arc::new(MemorySink::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db_pool.clone()))
                .app_data(web::Data::from(sink))
                .configure(config),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/register/doctor")
            .set_json(signup(&email))
            .to_request();
        let status = test::call_service(&app, req).await.status();

        switch(&db_pool, "allow_doctor_registration", true).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        let accounts = "SELECT COUNT(*) FROM users WHERE username = $1";
        assert_eq!(count(&db_pool, accounts, &[&email]).await, 0);
    }
}
