//! Maps [`SvcError`] onto `actix-web`'s [`ResponseError`] (spec §4.1): every
//! error response carries the `{ kind, id, href, code, reason, operation_id }`
//! body shape from [`common_lib::error::ErrorPresenter`], status taken from
//! `kind_to_http_status`.
//!
//! A thin newtype rather than an `impl ResponseError for SvcError` directly:
//! `common-lib` stays free of an `actix-web` dependency, the same split the
//! teacher draws between its bus-level `ReplyError` and REST-level
//! `RestError<RestJsonError>`.

use actix_web::{HttpResponse, ResponseError};
use common_lib::error::ErrorPresenter;
use common_lib::SvcError;

#[derive(Debug)]
pub struct RestError(SvcError);

impl From<SvcError> for RestError {
    fn from(err: SvcError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.reason())
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.0.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorPresenter::new(&self.0, None))
    }
}
