use chrono::prelude::*;
use deadpool_postgres::{Client, Pool};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use scrypt::{Params, Scrypt};
use serde::Serialize;
use tokio_postgres::{row::Row, GenericClient};

use crate::appointments::display_name;
use crate::error::AppError;
use crate::forms::normalize_email;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(skip)]
    pub hsecret: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Local>,
}

impl From<&Row> for Account {
    fn from(row: &Row) -> Self {
        Account {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            phone: row.get("phone"),
            hsecret: row.get("hsecret"),
            is_active: row.get("is_active"),
            is_staff: row.get("is_staff"),
            created_at: row.get("created_at"),
        }
    }
}

impl Account {
    pub fn full_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let params = Params::new(15, 8, 1, Params::RECOMMENDED_LEN)
        .map_err(|_| password_hash::Error::ParamsMaxExceeded)?;
    let salt = SaltString::generate(&mut OsRng);
    let hashed = Scrypt.hash_password_customized(password.as_bytes(), None, None, params, &salt)?;
    Ok(hashed.to_string())
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, hsecret: &str) -> bool {
    match PasswordHash::new(hsecret) {
        Ok(parsed) => Scrypt.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(err) => {
            log::warn!("stored password hash is unreadable: {}", err);
            false
        }
    }
}

/// An account about to be inserted. The username is the normalized email.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub password: String,
    pub is_staff: bool,
}

impl NewAccount {
    pub fn username(&self) -> String {
        normalize_email(&self.email)
    }
}

pub async fn email_taken<C: GenericClient>(db_conn: &C, email: &str) -> Result<bool, AppError> {
    let email = normalize_email(email);
    let row = db_conn
        .query_opt(
            "SELECT id FROM users WHERE username = $1 OR lower(email) = $1",
            &[&email],
        )
        .await?;
    Ok(row.is_some())
}

pub async fn create_user<C: GenericClient>(
    db_conn: &C,
    new: &NewAccount,
) -> Result<Account, AppError> {
    let hashed_password = hash_password(&new.password)?;
    let username = new.username();
    let row = db_conn
        .query_one(
            "INSERT INTO users (username, email, first_name, last_name, phone, hsecret, is_staff)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
            &[
                &username,
                &username,
                &new.first_name.trim(),
                &new.last_name.trim(),
                &new.phone.trim(),
                &hashed_password,
                &new.is_staff,
            ],
        )
        .await?;
    Ok(Account::from(&row))
}

pub async fn find_by_username(
    db_conn: &Client,
    username: &str,
) -> Result<Option<Account>, AppError> {
    let row = db_conn
        .query_opt(
            "SELECT * FROM users WHERE username = $1",
            &[&normalize_email(username)],
        )
        .await?;
    Ok(row.map(|row| Account::from(&row)))
}

/// Creates the configured staff account unless its username is taken.
pub async fn bootstrap_admin(db_pool: &Pool, email: &str, password: &str) -> Result<(), AppError> {
    let db_conn = db_pool.get().await?;
    if email_taken(&**db_conn, email).await? {
        log::info!("admin account {} already exists", normalize_email(email));
        return Ok(());
    }
    let new = NewAccount {
        email: email.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        phone: String::new(),
        password: password.to_string(),
        is_staff: true,
    };
    let account = create_user(&**db_conn, &new).await?;
    log::info!("created admin account {}", account.username);
    Ok(())
}
