//! Bounded fan-out / fan-in over per-candidate classifier calls.
//!
//! At most `limit` calls are in flight at once. Results come back in input
//! order; callers re-sort by score afterwards.

use std::future::Future;

use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::engine::errors::EngineResult;

/// What to do when one call of a batch fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure fails the whole batch; in-flight calls are dropped.
    #[default]
    AllOrNothing,
    /// Failed items are logged and left out; the batch still succeeds.
    SkipFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FanOut {
    pub limit: usize,
    pub policy: FailurePolicy,
}

impl Default for FanOut {
    fn default() -> Self {
        Self {
            limit: 8,
            policy: FailurePolicy::AllOrNothing,
        }
    }
}

impl FanOut {
    pub fn new(limit: usize, policy: FailurePolicy) -> Self {
        Self {
            limit: limit.max(1),
            policy,
        }
    }

    /// Run `call` for every item and wait for the batch to settle.
    pub async fn run<'a, T, U, F, Fut>(&self, items: &'a [T], mut call: F) -> EngineResult<Vec<(&'a T, U)>>
    where
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = EngineResult<U>>,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        // built up front so the stream holds no closure; keeps the batch future Send
        let pending: Vec<_> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let fut = call(item);
                async move { (idx, item, fut.await) }
            })
            .collect();

        let calls = stream::iter(pending).buffered(self.limit.max(1));

        match self.policy {
            FailurePolicy::AllOrNothing => {
                calls
                    .map(|(_, item, res)| res.map(|value| (item, value)))
                    .try_collect()
                    .await
            }
            FailurePolicy::SkipFailed => {
                let settled: Vec<_> = calls.collect().await;
                let total = settled.len();

                let kept: Vec<(&'a T, U)> = settled
                    .into_iter()
                    .filter_map(|(idx, item, res)| match res {
                        Ok(value) => Some((item, value)),
                        Err(err) => {
                            log::warn!("fan-out: item #{idx} dropped: {err}");
                            None
                        }
                    })
                    .collect();

                if kept.len() < total {
                    log::warn!("fan-out: {} of {total} calls failed", total - kept.len());
                }

                Ok(kept)
            }
        }
    }
}
