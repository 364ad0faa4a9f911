//! Panic recovery (spec §4.10 step 1, §7): handlers must never panic to
//! signal errors, but a bug that does panic must not take the process down
//! or leave a response half-written. Recovered panics are reported to the
//! external sink (tracing) and surfaced to the client as `GeneralError`.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use common_lib::SvcError;
use futures::FutureExt;

/// Runs `fut` and converts an unwinding panic into a `GeneralError`, logging
/// it first so the failure isn't silently swallowed.
pub async fn recover<F, T>(op_id: &str, fut: F) -> Result<T, SvcError>
where
    F: Future<Output = Result<T, SvcError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(&panic);
            tracing::error!(op_id = %op_id, panic = %message, "recovered panic in request handler");
            Err(SvcError::general_error(format!(
                "internal error (op_id={})",
                op_id
            )))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_ok_result() {
        let result = recover("op-1", async { Ok::<_, SvcError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn passes_through_err_result() {
        let result: Result<u32, SvcError> =
            recover("op-2", async { Err(SvcError::not_found("Dinosaurs", "x")) }).await;
        assert_eq!(result.unwrap_err().kind(), common_lib::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn converts_panic_to_general_error() {
        let result: Result<u32, SvcError> = recover("op-3", async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok(0)
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), common_lib::ErrorKind::GeneralError);
    }
}
