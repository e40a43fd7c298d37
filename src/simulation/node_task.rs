//! Per-node and per-application asynchronous timers.
//!
//! Node tasks only keep time. Every state transition they trigger happens in
//! the network task, which receives their events over the shared output
//! channel and owns the routing layer.

use embassy_time::{Duration, Instant, Timer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::{MAX_GEOCAST_SOURCES, MAX_NODE_COUNT, NodeId, NodeOutputMessage, NodeOutputPayload, NodesOutputQueueSender};

/// Identity and outbound channel shared by the timer tasks.
struct NodeContext {
    node_id: NodeId,
    out_tx: NodesOutputQueueSender,
}

impl NodeContext {
    async fn emit(&self, payload: NodeOutputPayload) {
        self.out_tx
            .send(NodeOutputMessage {
                node_id: self.node_id,
                payload,
            })
            .await;
    }
}

/// Beacon timer of one node.
///
/// Fires first at `start`, then every `period`. Deadlines are computed from
/// the previous deadline so slow handling in the network task does not
/// accumulate drift.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn node_task(node_id: NodeId, start: Instant, period: Duration, out_tx: NodesOutputQueueSender) {
    let context = NodeContext { node_id, out_tx };
    let mut next = start;

    loop {
        Timer::at(next).await;
        context.emit(NodeOutputPayload::HelloDue).await;
        next += period;
    }
}

/// Random first-send delay in `[period, 2 * period)`.
pub fn first_send_delay<R: Rng>(period: Duration, rng: &mut R) -> Duration {
    let period_ms = period.as_millis().max(1);
    let jitter = rng.gen_range(0..period_ms);
    Duration::from_millis(period_ms + jitter)
}

/// Application on `source` that periodically asks for a geocast toward `target`.
///
/// The first send is jittered from `seed`, so equal seeds give equal runs.
/// Stops once `stop_at` has passed, or never when it is `None`.
#[embassy_executor::task(pool_size = MAX_GEOCAST_SOURCES)]
pub async fn geocast_task(
    source: NodeId,
    target: NodeId,
    payload_size: usize,
    period: Duration,
    stop_at: Option<Instant>,
    seed: u64,
    out_tx: NodesOutputQueueSender,
) {
    let context = NodeContext { node_id: source, out_tx };
    let delay = first_send_delay(period, &mut StdRng::seed_from_u64(seed));
    let mut next = Instant::now() + delay;
    log::debug!("[{}] first geocast toward {} at {} ms", source, target, next.as_millis());

    loop {
        if stop_at.is_some_and(|stop| next > stop) {
            log::debug!("[{}] geocast application stopped", source);
            return;
        }
        Timer::at(next).await;
        context.emit(NodeOutputPayload::GeocastRequested { target, payload_size }).await;
        next += period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_send_falls_in_one_to_two_periods() {
        let period = Duration::from_millis(1000);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let delay = first_send_delay(period, &mut rng);
            assert!(delay >= period, "{:?} shorter than one period", delay);
            assert!(delay < period * 2, "{:?} not shorter than two periods", delay);
        }
    }

    #[test]
    fn equal_seeds_give_equal_first_sends() {
        let period = Duration::from_millis(2000);
        let delays = |seed: u64| -> Vec<Duration> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..16).map(|_| first_send_delay(period, &mut rng)).collect()
        };
        assert_eq!(delays(42), delays(42));
        assert_ne!(delays(42), delays(43));
    }

    #[test]
    fn zero_period_still_waits() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(first_send_delay(Duration::from_millis(0), &mut rng), Duration::from_millis(1));
    }
}
