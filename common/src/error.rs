//! The error taxonomy shared by the REST and gRPC frontends.
//!
//! A single closed set of kinds crosses both protocol surfaces (spec §4.1).
//! Low-level collaborators (the store, the lock service) raise their own
//! native errors; service-layer code classifies them into a [`SvcError`] by
//! picking the matching context selector below.

use std::fmt;

use snafu::Snafu;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The closed set of failure kinds that can cross either protocol surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ValidationError,
    BadRequest,
    Unauthorized,
    Forbidden,
    AlreadyExists,
    FailedPrecondition,
    ResourceExhausted,
    Unavailable,
    DeadlineExceeded,
    NotImplemented,
    GeneralError,
    DatabaseAdvisoryLock,
}

/// A taxonomy error: kind, operation-reason, optional cause, optional resource ref.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SvcError {
    #[snafu(display("{reason}"))]
    NotFound {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    Conflict {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    ValidationError {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    BadRequest {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    Unauthorized {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    Forbidden {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    AlreadyExists {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    FailedPrecondition {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    ResourceExhausted {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    Unavailable {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
        source: Option<BoxError>,
    },
    #[snafu(display("{reason}"))]
    DeadlineExceeded {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    NotImplemented {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
    },
    #[snafu(display("{reason}"))]
    GeneralError {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
        source: Option<BoxError>,
    },
    #[snafu(display("{reason}"))]
    DatabaseAdvisoryLock {
        reason: String,
        resource_kind: Option<String>,
        resource_id: Option<String>,
        source: Option<BoxError>,
    },
}

impl SvcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ValidationError { .. } => ErrorKind::ValidationError,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::FailedPrecondition { .. } => ErrorKind::FailedPrecondition,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::GeneralError { .. } => ErrorKind::GeneralError,
            Self::DatabaseAdvisoryLock { .. } => ErrorKind::DatabaseAdvisoryLock,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::NotFound { reason, .. }
            | Self::Conflict { reason, .. }
            | Self::ValidationError { reason, .. }
            | Self::BadRequest { reason, .. }
            | Self::Unauthorized { reason, .. }
            | Self::Forbidden { reason, .. }
            | Self::AlreadyExists { reason, .. }
            | Self::FailedPrecondition { reason, .. }
            | Self::ResourceExhausted { reason, .. }
            | Self::Unavailable { reason, .. }
            | Self::DeadlineExceeded { reason, .. }
            | Self::NotImplemented { reason, .. }
            | Self::GeneralError { reason, .. }
            | Self::DatabaseAdvisoryLock { reason, .. } => reason,
        }
    }

    pub fn resource(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Self::NotFound {
                resource_kind,
                resource_id,
                ..
            }
            | Self::Conflict {
                resource_kind,
                resource_id,
                ..
            }
            | Self::ValidationError {
                resource_kind,
                resource_id,
                ..
            }
            | Self::BadRequest {
                resource_kind,
                resource_id,
                ..
            }
            | Self::Unauthorized {
                resource_kind,
                resource_id,
                ..
            }
            | Self::Forbidden {
                resource_kind,
                resource_id,
                ..
            }
            | Self::AlreadyExists {
                resource_kind,
                resource_id,
                ..
            }
            | Self::FailedPrecondition {
                resource_kind,
                resource_id,
                ..
            }
            | Self::ResourceExhausted {
                resource_kind,
                resource_id,
                ..
            }
            | Self::Unavailable {
                resource_kind,
                resource_id,
                ..
            }
            | Self::DeadlineExceeded {
                resource_kind,
                resource_id,
                ..
            }
            | Self::NotImplemented {
                resource_kind,
                resource_id,
                ..
            }
            | Self::GeneralError {
                resource_kind,
                resource_id,
                ..
            }
            | Self::DatabaseAdvisoryLock {
                resource_kind,
                resource_id,
                ..
            } => (resource_kind.as_deref(), resource_id.as_deref()),
        }
    }

    /// Shorthand for the common case: a plain reason with no resource ref and no cause.
    pub fn not_found(resource_kind: impl Into<String>, resource_id: impl Into<String>) -> Self {
        let resource_kind = resource_kind.into();
        let resource_id = resource_id.into();
        Self::NotFound {
            reason: format!("{} '{}' not found", resource_kind, resource_id),
            resource_kind: Some(resource_kind),
            resource_id: Some(resource_id),
        }
    }

    pub fn general_error(reason: impl Into<String>) -> Self {
        Self::GeneralError {
            reason: reason.into(),
            resource_kind: None,
            resource_id: None,
            source: None,
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::ValidationError {
            reason: reason.into(),
            resource_kind: None,
            resource_id: None,
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
            resource_kind: None,
            resource_id: None,
        }
    }

    pub fn database_advisory_lock(reason: impl Into<String>) -> Self {
        Self::DatabaseAdvisoryLock {
            reason: reason.into(),
            resource_kind: None,
            resource_id: None,
            source: None,
        }
    }
}

/// Maps an [`ErrorKind`] onto a fixed HTTP status code. Total and pure (spec §4.1).
pub fn kind_to_http_status(kind: ErrorKind) -> http::StatusCode {
    use http::StatusCode as S;
    match kind {
        ErrorKind::NotFound => S::NOT_FOUND,
        ErrorKind::Conflict => S::CONFLICT,
        ErrorKind::AlreadyExists => S::CONFLICT,
        ErrorKind::ValidationError => S::BAD_REQUEST,
        ErrorKind::BadRequest => S::BAD_REQUEST,
        ErrorKind::Unauthorized => S::UNAUTHORIZED,
        ErrorKind::Forbidden => S::FORBIDDEN,
        ErrorKind::FailedPrecondition => S::UNPROCESSABLE_ENTITY,
        ErrorKind::ResourceExhausted => S::TOO_MANY_REQUESTS,
        ErrorKind::Unavailable => S::SERVICE_UNAVAILABLE,
        ErrorKind::DeadlineExceeded => S::GATEWAY_TIMEOUT,
        ErrorKind::NotImplemented => S::NOT_IMPLEMENTED,
        ErrorKind::GeneralError => S::INTERNAL_SERVER_ERROR,
        ErrorKind::DatabaseAdvisoryLock => S::INTERNAL_SERVER_ERROR,
    }
}

/// Deterministically remaps an HTTP status onto a gRPC status code (spec §4.1).
/// Total and pure: every status, even ones `kind_to_http_status` never produces,
/// lands on a defined code.
pub fn http_status_to_grpc_code(status: http::StatusCode) -> tonic::Code {
    use tonic::Code;
    match status {
        http::StatusCode::BAD_REQUEST => Code::InvalidArgument,
        http::StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        http::StatusCode::FORBIDDEN => Code::PermissionDenied,
        http::StatusCode::NOT_FOUND => Code::NotFound,
        http::StatusCode::CONFLICT => Code::AlreadyExists,
        http::StatusCode::UNPROCESSABLE_ENTITY => Code::InvalidArgument,
        http::StatusCode::TOO_MANY_REQUESTS => Code::ResourceExhausted,
        http::StatusCode::SERVICE_UNAVAILABLE => Code::Unavailable,
        http::StatusCode::GATEWAY_TIMEOUT => Code::DeadlineExceeded,
        s if s.is_client_error() => Code::InvalidArgument,
        s if s.is_server_error() => Code::Internal,
        _ => Code::Internal,
    }
}

impl SvcError {
    pub fn http_status(&self) -> http::StatusCode {
        kind_to_http_status(self.kind())
    }

    pub fn grpc_status(&self) -> tonic::Status {
        let code = http_status_to_grpc_code(self.http_status());
        tonic::Status::new(code, self.reason().to_string())
    }
}

/// Body shape for every REST error response (spec §4.1).
#[derive(serde::Serialize, Debug)]
pub struct ErrorPresenter {
    pub kind: &'static str,
    pub id: String,
    pub href: String,
    pub code: u16,
    pub reason: String,
    pub operation_id: Option<String>,
}

impl ErrorPresenter {
    pub fn new(err: &SvcError, operation_id: Option<String>) -> Self {
        let status = err.http_status();
        Self {
            kind: "Error",
            id: status.as_u16().to_string(),
            href: format!("/errors/{}", status.as_u16()),
            code: status.as_u16(),
            reason: err.reason().to_string(),
            operation_id,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
