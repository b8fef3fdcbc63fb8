use actix_session::{Session, SessionExt};
use actix_web::dev::Payload;
use actix_web::{error, web, FromRequest, HttpRequest};
use deadpool_postgres::Pool;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

const SESSION_KEY: &str = "dabs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn resolve(is_staff: bool, doctor_id: Option<i32>) -> Role {
        if is_staff {
            Role::Admin
        } else if doctor_id.is_some() {
            Role::Doctor
        } else {
            Role::Patient
        }
    }

    /// Where a freshly signed in user of this role lands.
    pub fn dashboard(&self) -> &'static str {
        match self {
            Role::Admin => "/dabs-admin/dashboard",
            Role::Doctor => "/dashboard/doctor",
            Role::Patient => "/dashboard/patient",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub doctor_id: Option<i32>,
}

impl SessionUser {
    pub fn load(session: &Session) -> Result<Option<SessionUser>, AppError> {
        Ok(session.get::<SessionUser>(SESSION_KEY)?)
    }

    pub fn store(&self, session: &Session) -> Result<(), AppError> {
        session.insert(SESSION_KEY, self)?;
        session.renew();
        Ok(())
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Admin
    }

    /// Re-reads the account behind the cookie. `None` when it was deleted or
    /// deactivated. Role and doctor profile come from the database.
    pub async fn refresh(&self, db_pool: &Pool) -> Result<Option<SessionUser>, AppError> {
        let db_conn = db_pool.get().await?;
        let row = db_conn
            .query_opt(
                "SELECT u.username, u.is_active, u.is_staff, d.id AS doctor_id
                 FROM users u LEFT JOIN doctor_profiles d ON d.user_id = u.id
                 WHERE u.id = $1",
                &[&self.id],
            )
            .await?;
        match row {
            Some(row) if row.get::<_, bool>("is_active") => {
                let doctor_id: Option<i32> = row.get("doctor_id");
                Ok(Some(SessionUser {
                    id: self.id,
                    username: row.get("username"),
                    role: Role::resolve(row.get("is_staff"), doctor_id),
                    doctor_id,
                }))
            }
            _ => {
                log::info!("dropping the session of account {}", self.id);
                Ok(None)
            }
        }
    }
}

type Guard<T> = fn(Option<SessionUser>) -> Result<T, AppError>;

/// Runs `guard` on the cookie, then again on the account as the database
/// has it now. Callers the cookie already rules out never reach the pool.
async fn resolve<T>(req: HttpRequest, guard: Guard<T>) -> Result<T, AppError> {
    let session = req.get_session();
    let user = match SessionUser::load(&session)? {
        Some(user) => user,
        None => return guard(None),
    };
    guard(Some(user.clone()))?;

    let db_pool = req
        .app_data::<web::Data<Pool>>()
        .ok_or_else(|| error::ErrorInternalServerError("no database pool"))?;
    match user.refresh(db_pool).await? {
        Some(fresh) => guard(Some(fresh)),
        None => {
            session.purge();
            guard(None)
        }
    }
}

fn signed_in(user: Option<SessionUser>) -> Result<SessionUser, AppError> {
    user.ok_or(AppError::Unauthorized)
}

impl FromRequest for SessionUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<SessionUser, AppError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        Box::pin(resolve(req.clone(), signed_in))
    }
}

/// A signed in staff account. Everyone else is sent home.
#[derive(Debug, Clone)]
pub struct Staff(pub SessionUser);

fn staff(user: Option<SessionUser>) -> Result<Staff, AppError> {
    match user {
        Some(user) if user.is_staff() => Ok(Staff(user)),
        _ => Err(AppError::redirect("Administrator access required.")),
    }
}

impl FromRequest for Staff {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Staff, AppError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        Box::pin(resolve(req.clone(), staff))
    }
}

/// A signed in account that owns a doctor profile.
#[derive(Debug, Clone)]
pub struct DoctorUser {
    pub user: SessionUser,
    pub profile_id: i32,
}

fn doctor(user: Option<SessionUser>) -> Result<DoctorUser, AppError> {
    let user = signed_in(user)?;
    match user.doctor_id {
        Some(profile_id) => Ok(DoctorUser { user, profile_id }),
        None => Err(AppError::Forbidden),
    }
}

impl FromRequest for DoctorUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<DoctorUser, AppError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        Box::pin(resolve(req.clone(), doctor))
    }
}
