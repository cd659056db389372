//! Route configuration.
//!
//! Session-gated feature areas are wrapped in the auth middleware; the
//! login, registration, OAuth, and operational endpoints stay public.
use actix_web::web;

use crate::handlers;
use crate::middleware::SessionAuthMiddleware;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Operational endpoints
        .route("/health", web::get().to(handlers::health_check))
        .route("/metrics", web::get().to(handlers::metrics_handler))
        // Account area
        .service(
            web::scope("/account")
                .route("/login/", web::get().to(handlers::auth::login_page))
                .route("/login/", web::post().to(handlers::auth::login))
                .route("/register/", web::get().to(handlers::account::register_page))
                .route("/register/", web::post().to(handlers::account::register))
                .route("/oauth/google/", web::get().to(handlers::auth::google_start))
                .route(
                    "/oauth/google/callback/",
                    web::get().to(handlers::auth::google_callback),
                )
                .service(
                    web::scope("")
                        .wrap(SessionAuthMiddleware)
                        .route("/logout/", web::post().to(handlers::auth::logout))
                        .route("/edit/", web::get().to(handlers::account::edit_page))
                        .route("/edit/", web::post().to(handlers::account::edit))
                        .route(
                            "/password-change/",
                            web::get().to(handlers::account::password_change_page),
                        )
                        .route(
                            "/password-change/",
                            web::post().to(handlers::account::password_change),
                        ),
                ),
        )
        // Images area
        .service(
            web::scope("/images")
                .route(
                    "/detail/{id}/{slug}/",
                    web::get().to(handlers::images::detail),
                )
                .service(
                    web::scope("")
                        .wrap(SessionAuthMiddleware)
                        .route("/", web::get().to(handlers::images::image_list))
                        .route("/create/", web::get().to(handlers::images::create_page))
                        .route("/create/", web::post().to(handlers::images::create))
                        .route("/like/", web::post().to(handlers::images::like)),
                ),
        )
        // Homepage / dashboard and the follow toggle
        .service(
            web::scope("")
                .wrap(SessionAuthMiddleware)
                .route("/", web::get().to(handlers::auth::dashboard))
                .route("/user_follow/", web::post().to(handlers::social::user_follow)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn health_endpoint_is_public() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(body, "OK");
    }

    #[actix_web::test]
    async fn metrics_endpoint_renders_text_format() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let content_type = resp.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }
}
