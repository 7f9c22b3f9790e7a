//! Balance wait - blocks until the signing identity is funded on L1
//!
//! This is a one-shot precondition: an RPC failure or cancellation ends the
//! wait with an error instead of being retried.

use crate::client::L1Client;
use crate::error::L1Error;
use solana_pubkey::Pubkey;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Interval between balance checks
pub const BALANCE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wait until `account` holds a non-zero balance, returning it
pub async fn wait_for_balance(
    cancel: &CancellationToken,
    l1: &dyn L1Client,
    account: &Pubkey,
    poll: Duration,
) -> Result<u64, L1Error> {
    loop {
        let balance = l1.balance(account).await?;
        if balance > 0 {
            tracing::info!(account = %account, balance, "signing account funded");
            return Ok(balance);
        }

        tracing::info!(account = %account, "waiting for signing account to be funded on L1");
        tokio::select! {
            _ = cancel.cancelled() => return Err(L1Error::Cancelled("waiting for balance")),
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedL1 {
        balances: Mutex<Vec<Result<u64, L1Error>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl L1Client for ScriptedL1 {
        fn url(&self) -> &str {
            "scripted"
        }

        async fn latest_block(&self) -> Result<u64, L1Error> {
            Ok(0)
        }

        async fn balance(&self, _account: &Pubkey) -> Result<u64, L1Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.balances.lock().unwrap().remove(0)
        }
    }

    fn scripted(balances: Vec<Result<u64, L1Error>>) -> ScriptedL1 {
        ScriptedL1 {
            balances: Mutex::new(balances),
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_funded() {
        let l1 = scripted(vec![Ok(0), Ok(0), Ok(42)]);
        let cancel = CancellationToken::new();
        let account = Pubkey::new_from_array([1u8; 32]);

        let balance = wait_for_balance(&cancel, &l1, &account, BALANCE_POLL_INTERVAL)
            .await
            .unwrap();
        assert_eq!(balance, 42);
        assert_eq!(l1.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rpc_error_is_fatal() {
        let l1 = scripted(vec![
            Ok(0),
            Err(L1Error::Rpc {
                method: "getBalance",
                message: "boom".to_string(),
            }),
            Ok(5),
        ]);
        let cancel = CancellationToken::new();
        let account = Pubkey::new_from_array([1u8; 32]);

        let result = wait_for_balance(&cancel, &l1, &account, BALANCE_POLL_INTERVAL).await;
        assert!(matches!(result, Err(L1Error::Rpc { .. })));
        assert_eq!(l1.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_while_unfunded() {
        let l1 = scripted(vec![Ok(0)]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let account = Pubkey::new_from_array([1u8; 32]);

        let result = wait_for_balance(&cancel, &l1, &account, BALANCE_POLL_INTERVAL).await;
        assert!(matches!(result, Err(L1Error::Cancelled(_))));
    }
}
