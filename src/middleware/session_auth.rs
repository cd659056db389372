/// Session-cookie authentication middleware.
///
/// Resolves the session cookie against the Redis store and places the
/// caller's id in the request extensions. Anonymous requests to gated
/// routes are answered with a 302 to the login page carrying a `next`
/// parameter pointing back at the original request.
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorInternalServerError,
    http::{header, StatusCode},
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::services::sessions::SESSION_COOKIE;

/// Authenticated caller id, extracted by the middleware.
#[derive(Debug, Clone)]
pub struct UserId(pub Uuid);

/// The raw session token of the caller (needed for flash messages and
/// logout).
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

pub const LOGIN_URL: &str = "/account/login/";

/// Location a gated route bounces an anonymous caller to.
pub fn login_redirect_target(next: &str) -> String {
    format!("{LOGIN_URL}?next={}", urlencoding::encode(next))
}

#[derive(Debug)]
pub struct LoginRedirect {
    next: String,
}

impl LoginRedirect {
    pub fn new(next: impl Into<String>) -> Self {
        Self { next: next.into() }
    }
}

impl fmt::Display for LoginRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "login required (next: {})", self.next)
    }
}

impl ResponseError for LoginRedirect {
    fn status_code(&self) -> StatusCode {
        StatusCode::FOUND
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Found()
            .insert_header((header::LOCATION, login_redirect_target(&self.next)))
            .finish()
    }
}

pub struct SessionAuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionAuthMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionAuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct SessionAuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let next = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| req.uri().path().to_string());

            let token = match req.cookie(SESSION_COOKIE) {
                Some(cookie) => cookie.value().to_string(),
                None => return Err(LoginRedirect::new(next).into()),
            };

            let state = req
                .app_data::<actix_web::web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| ErrorInternalServerError("application state missing"))?;

            let user_id = match state.sessions.user_id(&token).await? {
                Some(id) => id,
                None => return Err(LoginRedirect::new(next).into()),
            };

            req.extensions_mut().insert(UserId(user_id));
            req.extensions_mut().insert(SessionToken(token));

            service.call(req).await
        })
    }
}

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<UserId>().cloned() {
            Some(user_id) => ready(Ok(user_id)),
            None => {
                let next = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| req.uri().path().to_string());
                ready(Err(LoginRedirect::new(next).into()))
            }
        }
    }
}

impl FromRequest for SessionToken {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<SessionToken>().cloned() {
            Some(token) => ready(Ok(token)),
            None => ready(Err(ErrorInternalServerError(
                "session token missing in request extensions",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_target_carries_encoded_next() {
        assert_eq!(
            login_redirect_target("/images/?page=2"),
            "/account/login/?next=%2Fimages%2F%3Fpage%3D2"
        );
    }

    #[test]
    fn redirect_response_is_found_with_location() {
        let resp = LoginRedirect::new("/").error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/account/login/?next=%2F"
        );
    }
}
