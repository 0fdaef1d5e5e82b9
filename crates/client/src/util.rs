use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless `token` fires first.
///
/// Returns true when the full wait elapsed, false on cancellation. Every
/// wait in the transport goes through here so shutdown takes effect at the
/// next checkpoint instead of after a full sleep.
pub(crate) async fn wait(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_completes_when_not_cancelled() {
        let token = CancellationToken::new();
        assert!(wait(Duration::from_millis(5), &token).await);
    }

    #[tokio::test]
    async fn wait_returns_false_once_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait(Duration::from_secs(3600), &token).await);
    }
}
