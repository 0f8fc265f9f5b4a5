use std::time::Duration;

use crate::error::{Result, VteError};

/// Run CPU-bound or blocking work on the blocking pool under a deadline.
///
/// On expiry the future resolves to `Timeout`. The blocking thread itself
/// cannot be interrupted; it runs to completion and its result is dropped.
pub async fn run_blocking<T, F>(operation: &'static str, deadline: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(VteError::Task {
            operation,
            reason: join.to_string(),
        }),
        Err(_) => {
            tracing::warn!(operation, deadline_secs = deadline.as_secs(), "deadline exceeded");
            Err(VteError::Timeout {
                operation,
                deadline,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vte_prover::ErrorKind;

    #[tokio::test]
    async fn returns_result() {
        let value = run_blocking("add", Duration::from_secs(5), || Ok(2 + 2))
            .await
            .unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn expired_deadline_is_timeout() {
        let err = run_blocking("sleep", Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn panics_surface_as_task_errors() {
        let err = run_blocking::<(), _>("panic", Duration::from_secs(5), || panic!("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, VteError::Task { operation: "panic", .. }));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.kind().to_string(), "internal");
    }
}
