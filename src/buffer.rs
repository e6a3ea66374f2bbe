//! Shared trade buffer
//!
//! Append-only, time-ordered collection of trade events shared between the
//! feed task (writer) and the aggregator task (reader). All access goes
//! through one mutex; the critical sections are the append, the
//! point-in-time copy, and the retention filter, never the O(n)
//! resampling work itself.

use tokio::sync::Mutex;

use crate::types::Trade;

/// Outcome of a retention pass over the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub removed: usize,
    pub kept: usize,
}

/// Mutex-guarded trade history.
///
/// Owned by the aggregation subsystem and injected into the two tasks that
/// need it rather than living as a process-wide singleton.
#[derive(Debug, Default)]
pub struct TradeBuffer {
    trades: Mutex<Vec<Trade>>,
}

impl TradeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of trades. The batch is inserted whole so a partial
    /// read from the feed can never leave half a message in the buffer.
    pub async fn append(&self, batch: Vec<Trade>) {
        if batch.is_empty() {
            return;
        }
        let mut trades = self.trades.lock().await;
        trades.extend(batch);
    }

    /// Point-in-time copy of the full history. The lock is held only for
    /// the clone; callers compute on the copy outside the lock.
    pub async fn snapshot(&self) -> Vec<Trade> {
        self.trades.lock().await.clone()
    }

    /// Number of buffered trades
    pub async fn len(&self) -> usize {
        self.trades.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trades.lock().await.is_empty()
    }

    /// Drop all trades older than `cutoff_ms`. This is the only mutation
    /// permitted on historical contents; it shares the mutex with
    /// `snapshot` so the two can never interleave.
    pub async fn prune_older_than(&self, cutoff_ms: i64) -> PruneStats {
        let mut trades = self.trades.lock().await;
        let initial = trades.len();
        trades.retain(|t| t.ts >= cutoff_ms);
        PruneStats {
            removed: initial - trades.len(),
            kept: trades.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn trade(ts: i64) -> Trade {
        Trade {
            ts,
            price: 100.0,
            volume: 1.0,
            side: Side::Buy,
        }
    }

    #[tokio::test]
    async fn test_append_and_snapshot() {
        let buffer = TradeBuffer::new();
        buffer.append(vec![trade(1), trade(2)]).await;
        buffer.append(vec![trade(3)]).await;

        let copy = buffer.snapshot().await;
        assert_eq!(copy.len(), 3);
        assert_eq!(buffer.len().await, 3);

        // Snapshot is a copy: mutating the buffer afterwards does not
        // affect what the reader already holds.
        buffer.append(vec![trade(4)]).await;
        assert_eq!(copy.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let buffer = TradeBuffer::new();
        buffer.append(Vec::new()).await;
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn test_prune_older_than() {
        let buffer = TradeBuffer::new();
        buffer
            .append(vec![trade(100), trade(200), trade(300), trade(400)])
            .await;

        let stats = buffer.prune_older_than(300).await;
        assert_eq!(stats, PruneStats { removed: 2, kept: 2 });

        let remaining = buffer.snapshot().await;
        assert!(remaining.iter().all(|t| t.ts >= 300));
    }

    #[tokio::test]
    async fn test_prune_keeps_boundary_trade() {
        let buffer = TradeBuffer::new();
        buffer.append(vec![trade(100)]).await;
        let stats = buffer.prune_older_than(100).await;
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.kept, 1);
    }
}
