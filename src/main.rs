use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::io;
use tracing_subscriber::EnvFilter;

mod cascade;
mod database;
mod error;
mod lifecycle;
mod models;
mod routes;
mod sweep;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_uri: String =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| String::from("mongodb://localhost:27017"));

    models::user::load_keys();
    database::connect(db_uri).await;

    // Finish any cascade a previous process left mid-flight before taking
    // traffic.
    match cascade::resume_pending_cascades().await {
        Ok(0) => (),
        Ok(resumed) => tracing::info!(resumed, "resumed interrupted cascades"),
        Err(error) => tracing::error!(error = %error, "could not resume pending cascades"),
    }

    let _sweep = sweep::StalenessSweep::default().spawn();

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(models::user::UserAuthenticationMiddlewareFactory)
            .service(routes::get_file)
            .service(routes::user::get_users)
            .service(routes::user::get_user)
            .service(routes::user::create_user)
            .service(routes::user::update_user)
            .service(routes::user::update_user_image)
            .service(routes::user::login)
            .service(routes::user::refresh)
            .service(routes::report::get_reports)
            .service(routes::report::get_report)
            .service(routes::report::create_report)
            .service(routes::report::update_report_status)
            .service(routes::report::delete_report)
            .service(routes::task::get_tasks)
            .service(routes::task::get_task)
            .service(routes::task::create_task)
            .service(routes::task::accept_task)
            .service(routes::task::delete_task)
            .service(routes::progress_report::get_progress_reports)
            .service(routes::progress_report::create_progress_report)
            .service(routes::progress_report::update_progress_report)
            .service(routes::progress_report::delete_progress_report)
            .service(routes::crew::get_crews)
            .service(routes::crew::get_crew)
            .service(routes::crew::create_crew)
            .service(routes::crew::update_crew)
            .service(routes::crew::delete_crew)
            .service(routes::dashboard::get_dashboard)
    })
    .bind(("127.0.0.1", 8000))?
    .run()
    .await
}
