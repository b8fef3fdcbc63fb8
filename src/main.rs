use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{cookie::Key, middleware, web, App, HttpServer};
use deadpool_postgres::Runtime;
use dotenv::dotenv;
use listenfd::ListenFd;
use std::io;
use std::sync::Arc;
use tokio_postgres::NoTls;

mod accounts;
mod admin;
mod app_config;
mod appointments;
mod audit;
mod db;
mod doctor;
mod error;
mod forms;
mod identity;
mod login;
mod registration;
mod settings;

use app_config::AppConfig;
use audit::{AuditSink, PgAuditSink};

/// Credentialed cross-origin requests are accepted from `origins` only.
pub fn cors(origins: &[String]) -> Cors {
    origins.iter().fold(
        Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials(),
        |cors, origin| cors.allowed_origin(origin),
    )
}

/// Signed cookie sessions. `key` must be at least 64 bytes.
pub fn session_middleware(key: &[u8]) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::from(key))
        .cookie_name("dabs".to_string())
        .cookie_secure(false)
        .build()
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    let mut listenfd = ListenFd::from_env();
    dotenv().ok();
    env_logger::init();

    let cfg = AppConfig::from_env()
        .and_then(|cfg| cfg.validate().map(|_| cfg))
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    let db_pool = cfg
        .pg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

    if let Err(err) = db::migrate(&db_pool).await {
        log::error!("could not apply the schema: {}", err);
        return Err(io::Error::new(io::ErrorKind::Other, err.to_string()));
    }
    if let Some((email, password)) = cfg.bootstrap_admin() {
        if let Err(err) = accounts::bootstrap_admin(&db_pool, email, password).await {
            log::error!("could not create the admin account: {}", err);
        }
    }

    let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(db_pool.clone()));
    let session_secret = cfg.session_secret.clone();
    let cors_origins = cfg.cors_origins();
    if cors_origins.is_empty() {
        log::warn!("CORS_ORIGINS is unset, cross-origin requests are refused");
    }

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::from(audit.clone()))
            .wrap(cors(&cors_origins))
            .wrap(session_middleware(session_secret.as_bytes()))
            // enable logger always register actix-web Logger middleware last
            .wrap(middleware::Logger::default())
            .configure(login::config)
            .configure(registration::config)
            .configure(doctor::config)
            .configure(appointments::config)
            .configure(admin::config)
    });

    // allow auto reload
    server = if let Some(l) = listenfd.take_tcp_listener(0)? {
        server.listen(l)?
    } else {
        server.bind(("0.0.0.0", cfg.port))?
    };

    log::info!("listening on port {}", cfg.port);
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::header, test, HttpResponse};

    #[actix_rt::test]
    async fn only_listed_origins_get_cors_headers() {
        let origins = vec!["https://dabs.example.org".to_string()];
        let app = test::init_service(
            App::new()
                .wrap(cors(&origins))
                .route("/ping", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ping")
            .insert_header((header::ORIGIN, "https://dabs.example.org"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://dabs.example.org"
        );

        let req = test::TestRequest::get()
            .uri("/ping")
            .insert_header((header::ORIGIN, "https://evil.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
