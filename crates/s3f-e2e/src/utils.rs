use std::error::Error as StdError;
use std::fmt;

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::types::ObjectLockMode;
use md5::{Digest, Md5};
use time::{Duration, OffsetDateTime};
use tracing::debug;

#[macro_export]
macro_rules! case {
    ($tcx: expr, $s:ident, $x:ident, $c:ident) => {{
        let mut suite = $tcx.suite::<$s>(stringify!($s));
        let mut fixture = suite.fixture::<$x>(stringify!($x));
        fixture.case(stringify!($c), $x::$c);
    }};
}

#[derive(Debug, thiserror::Error)]
pub enum CheckFailed {
    #[error("{what}: expected a client error, got {output}")]
    Succeeded { what: String, output: String },

    #[error("{what}: expected a client error")]
    NotServiceError {
        what: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("expected lock mode GOVERNANCE, got {0:?}")]
    LockMode(Option<ObjectLockMode>),

    #[error("object has no retain-until date")]
    NoRetainUntil,

    #[error("retained until {retain_until}, expected at least {min}")]
    RetentionTooShort {
        retain_until: OffsetDateTime,
        min: OffsetDateTime,
    },

    #[error("object has no version id")]
    NoVersionId,

    #[error(transparent)]
    Timestamp(#[from] time::error::ComponentRange),
}

/// Expects a request to be refused by the service.
///
/// Passes only for a service error response. A success, or a failure that
/// never reached the service (timeout, dispatch, construction), is reported
/// as an error.
pub fn expect_client_error<T, E, R>(what: &str, result: Result<T, SdkError<E, R>>) -> Result<(), CheckFailed>
where
    T: fmt::Debug,
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    match result {
        Ok(output) => Err(CheckFailed::Succeeded {
            what: what.to_owned(),
            output: format!("{output:?}"),
        }),
        Err(err) => match err.as_service_error() {
            Some(service_err) => {
                debug!(what, code = ?service_err.code(), message = ?service_err.message(), "got expected client error");
                Ok(())
            }
            None => Err(CheckFailed::NotServiceError {
                what: what.to_owned(),
                source: Box::new(err),
            }),
        },
    }
}

/// Checks that an object is under governance retention for at least
/// `years` years of 360 days, counted from `now`.
pub fn check_retention(head: &HeadObjectOutput, years: i32, now: OffsetDateTime) -> Result<OffsetDateTime, CheckFailed> {
    if head.object_lock_mode() != Some(&ObjectLockMode::Governance) {
        return Err(CheckFailed::LockMode(head.object_lock_mode().cloned()));
    }

    let retain_until = head.object_lock_retain_until_date().ok_or(CheckFailed::NoRetainUntil)?;
    let retain_until = OffsetDateTime::from_unix_timestamp(retain_until.secs())?;

    let min = now + Duration::days(360 * i64::from(years));
    if retain_until < min {
        return Err(CheckFailed::RetentionTooShort { retain_until, min });
    }
    Ok(retain_until)
}

/// Base64 encoded MD5 digest, as sent in `Content-MD5`.
#[must_use]
pub fn content_md5(data: &[u8]) -> String {
    base64_simd::STANDARD.encode_to_string(Md5::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_s3::operation::delete_object::{DeleteObjectError, DeleteObjectOutput};
    use aws_sdk_s3::primitives::DateTime;
    use aws_smithy_runtime_api::http::{Response, StatusCode};
    use aws_smithy_types::body::SdkBody;
    use aws_smithy_types::error::ErrorMetadata;

    type DeleteResult = Result<DeleteObjectOutput, SdkError<DeleteObjectError, Response>>;

    fn access_denied() -> DeleteResult {
        let err = DeleteObjectError::generic(ErrorMetadata::builder().code("AccessDenied").message("denied").build());
        let status = StatusCode::try_from(403).unwrap();
        Err(SdkError::service_error(err, Response::new(status, SdkBody::empty())))
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn locked_until(mode: ObjectLockMode, until: OffsetDateTime) -> HeadObjectOutput {
        HeadObjectOutput::builder()
            .object_lock_mode(mode)
            .object_lock_retain_until_date(DateTime::from_secs(until.unix_timestamp()))
            .build()
    }

    #[test]
    fn accepts_service_error() {
        expect_client_error("delete version", access_denied()).unwrap();
    }

    #[test]
    fn rejects_success() {
        let result: DeleteResult = Ok(DeleteObjectOutput::builder().build());
        let err = expect_client_error("delete version", result).unwrap_err();
        assert!(matches!(err, CheckFailed::Succeeded { .. }), "{err:?}");
        assert!(err.to_string().contains("expected a client error"));
    }

    #[test]
    fn rejects_transport_error() {
        let result: DeleteResult = Err(SdkError::construction_failure("no endpoint"));
        let err = expect_client_error("delete version", result).unwrap_err();
        assert!(matches!(err, CheckFailed::NotServiceError { .. }), "{err:?}");
    }

    #[test]
    fn retention_past_the_boundary() {
        let until = now() + Duration::days(3600) + Duration::hours(1);
        let head = locked_until(ObjectLockMode::Governance, until);
        assert_eq!(check_retention(&head, 10, now()).unwrap(), until);
    }

    #[test]
    fn retention_short_of_the_boundary() {
        let until = now() + Duration::days(3600) - Duration::hours(1);
        let head = locked_until(ObjectLockMode::Governance, until);
        let err = check_retention(&head, 10, now()).unwrap_err();
        assert!(matches!(err, CheckFailed::RetentionTooShort { .. }), "{err:?}");
    }

    #[test]
    fn retention_without_date() {
        let head = HeadObjectOutput::builder()
            .object_lock_mode(ObjectLockMode::Governance)
            .build();
        let err = check_retention(&head, 10, now()).unwrap_err();
        assert!(matches!(err, CheckFailed::NoRetainUntil), "{err:?}");
    }

    #[test]
    fn retention_in_compliance_mode() {
        let head = locked_until(ObjectLockMode::Compliance, now() + Duration::days(4000));
        let err = check_retention(&head, 10, now()).unwrap_err();
        assert!(matches!(err, CheckFailed::LockMode(Some(ObjectLockMode::Compliance))), "{err:?}");
    }

    #[test]
    fn md5_of_test_body() {
        // md5("0xdeadbeef") = 352aaeb7fcf46d4494d0c9e4730aedea
        assert_eq!(content_md5(b"0xdeadbeef"), "NSqut/z0bUSU0Mnkcwrt6g==");
    }
}
