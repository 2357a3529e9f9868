// Deadline-bounded polling used for header synchronization

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::chains::{ChainBackend, ContractState};
use crate::error::HarnessError;
use crate::types::Address;

/// Poll `check` every `interval` until it yields a value.
///
/// Returns `NoProgress` once `timeout` elapses. An error from `check` ends the
/// wait immediately. Dropping the returned future cancels the wait.
pub async fn poll_until<T, F, Fut>(
    chain_id: u64,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, HarnessError>>,
{
    let polling = async {
        loop {
            if let Some(value) = check().await? {
                return Ok(value);
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, polling).await {
        Ok(result) => result,
        Err(_) => Err(HarnessError::NoProgress {
            chain_id,
            waited: timeout,
        }),
    }
}

/// Wait for a header strictly newer than `current_height` (any header when `None`)
pub async fn fetch_newer_state(
    backend: &dyn ChainBackend,
    store_address: &Address,
    current_height: Option<u64>,
    timeout: Duration,
    interval: Duration,
) -> Result<ContractState, HarnessError> {
    let chain_id = backend.chain_id();
    poll_until(chain_id, timeout, interval, || async move {
        let state = backend.get_contract_state(store_address, &[], None).await?;
        let newer = match current_height {
            Some(height) if state.height() <= height => {
                debug!("Chain {} still at height {}", chain_id, state.height());
                None
            }
            _ => Some(state),
        };
        Ok::<_, HarnessError>(newer)
    })
    .await
}
