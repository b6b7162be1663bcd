use std::collections::VecDeque;
use std::time::{Duration, Instant};
use rustc_hash::FxHashMap;
use tracing::trace;

/// Round trip time measurement based on ping messages and their acknowledgements.
///
/// Sending a ping records its code with a timestamp; receiving the acknowledgement for that code
///  yields a sample. Only the most recent `ping_backlog` pings are remembered, so an
///  acknowledgement that arrives very late is ignored.
pub struct RoundTripTimes {
    samples: RollingSamples,
    latest: Option<Duration>,
    waiting_pings: PingBacklog,
}

impl RoundTripTimes {
    pub fn new(rtt_sample_count: usize, ping_backlog: usize) -> RoundTripTimes {
        RoundTripTimes {
            samples: RollingSamples::new(rtt_sample_count),
            latest: None,
            waiting_pings: PingBacklog::new(ping_backlog),
        }
    }

    pub fn record_outbound_ping(&mut self, ping_code: u16, now: Instant) {
        self.waiting_pings.insert(ping_code, now);
    }

    /// Returns the round trip time if the ping code belongs to a remembered ping
    pub fn record_inbound_ping(&mut self, ping_code: u16, now: Instant) -> Option<Duration> {
        let Some(sent) = self.waiting_pings.remove(ping_code) else {
            trace!("received acknowledgement for unknown ping code {} - ignoring", ping_code);
            return None;
        };

        let rtt = now.saturating_duration_since(sent);
        self.samples.add_value(rtt.as_secs_f64());
        self.latest = Some(rtt);
        Some(rtt)
    }

    /// The moving average over the most recent samples
    pub fn smoothed_rtt(&self) -> Option<Duration> {
        self.samples.mean()
            .map(Duration::from_secs_f64)
    }

    pub fn latest_rtt(&self) -> Option<Duration> {
        self.latest
    }

    pub fn rtt_sample_count(&self) -> usize {
        self.samples.capacity
    }
}

enum SampleBuffer {
    Growing(Vec<f64>),
    Ring {
        buf: Vec<f64>,
        next: usize,
    },
}

struct RollingSamples {
    buf: SampleBuffer,
    capacity: usize,
    cached_sum: f64,
}

impl RollingSamples {
    fn new(capacity: usize) -> RollingSamples {
        RollingSamples {
            buf: SampleBuffer::Growing(Vec::with_capacity(capacity)),
            capacity,
            cached_sum: 0.0,
        }
    }

    fn len(&self) -> usize {
        match &self.buf {
            SampleBuffer::Growing(buf) => buf.len(),
            SampleBuffer::Ring { buf, .. } => buf.len(),
        }
    }

    fn add_value(&mut self, value: f64) {
        match &mut self.buf {
            SampleBuffer::Growing(buf) => {
                buf.push(value);
                if buf.len() == self.capacity {
                    let buf = std::mem::take(buf);
                    self.buf = SampleBuffer::Ring { buf, next: 0 };
                }
            }
            SampleBuffer::Ring { buf, next } => {
                self.cached_sum -= buf[*next];
                buf[*next] = value;
                *next = (*next + 1) % self.capacity;
            }
        }
        self.cached_sum += value;
    }

    fn mean(&self) -> Option<f64> {
        match self.len() {
            0 => None,
            n => Some((self.cached_sum / n as f64).max(0.0)),
        }
    }
}

/// Insertion ordered map with a fixed capacity, evicting the oldest entry
struct PingBacklog {
    capacity: usize,
    timestamps: FxHashMap<u16, Instant>,
    insertion_order: VecDeque<u16>,
}

impl PingBacklog {
    fn new(capacity: usize) -> PingBacklog {
        PingBacklog {
            capacity,
            timestamps: FxHashMap::default(),
            insertion_order: VecDeque::with_capacity(capacity),
        }
    }

    fn insert(&mut self, ping_code: u16, timestamp: Instant) {
        if self.timestamps.insert(ping_code, timestamp).is_some() {
            // a reused code moves to the back
            self.insertion_order.retain(|c| *c != ping_code);
        }
        self.insertion_order.push_back(ping_code);

        while self.insertion_order.len() > self.capacity {
            if let Some(evicted) = self.insertion_order.pop_front() {
                self.timestamps.remove(&evicted);
            }
        }
    }

    fn remove(&mut self, ping_code: u16) -> Option<Instant> {
        let result = self.timestamps.remove(&ping_code);
        if result.is_some() {
            self.insertion_order.retain(|c| *c != ping_code);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn millis(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_single_sample() {
        let t0 = Instant::now();
        let mut rtt = RoundTripTimes::new(10, 4);
        assert_eq!(rtt.smoothed_rtt(), None);
        assert_eq!(rtt.latest_rtt(), None);

        rtt.record_outbound_ping(7, t0);
        assert_eq!(rtt.record_inbound_ping(7, t0 + millis(30)), Some(millis(30)));

        assert_eq!(rtt.latest_rtt(), Some(millis(30)));
        let smoothed = rtt.smoothed_rtt().unwrap();
        assert!(smoothed.abs_diff(millis(30)) < Duration::from_micros(1));
    }

    #[test]
    fn test_unknown_and_duplicate_ack() {
        let t0 = Instant::now();
        let mut rtt = RoundTripTimes::new(10, 4);

        assert_eq!(rtt.record_inbound_ping(1, t0), None);

        rtt.record_outbound_ping(1, t0);
        assert!(rtt.record_inbound_ping(1, t0 + millis(5)).is_some());
        assert_eq!(rtt.record_inbound_ping(1, t0 + millis(6)), None);
        assert_eq!(rtt.latest_rtt(), Some(millis(5)));
    }

    #[rstest]
    #[case::below_capacity(3, vec![10, 20], 15)]
    #[case::at_capacity(3, vec![10, 20, 30], 20)]
    #[case::rolling(3, vec![10, 20, 30, 100], 50)]
    #[case::rolling_twice(2, vec![10, 20, 30, 40, 50], 45)]
    #[case::single_sample_window(1, vec![10, 99], 99)]
    fn test_moving_average(#[case] sample_count: usize, #[case] samples: Vec<u64>, #[case] expected_millis: u64) {
        let t0 = Instant::now();
        let mut rtt = RoundTripTimes::new(sample_count, 16);

        for (i, sample) in samples.iter().enumerate() {
            let code = i as u16;
            rtt.record_outbound_ping(code, t0);
            rtt.record_inbound_ping(code, t0 + millis(*sample));
        }

        let smoothed = rtt.smoothed_rtt().unwrap();
        assert!(smoothed.abs_diff(millis(expected_millis)) < Duration::from_micros(1), "{:?}", smoothed);
        assert_eq!(rtt.latest_rtt(), Some(millis(*samples.last().unwrap())));
    }

    #[test]
    fn test_backlog_evicts_oldest() {
        let t0 = Instant::now();
        let mut rtt = RoundTripTimes::new(10, 2);

        rtt.record_outbound_ping(1, t0);
        rtt.record_outbound_ping(2, t0);
        rtt.record_outbound_ping(3, t0);

        assert_eq!(rtt.record_inbound_ping(1, t0 + millis(1)), None);
        assert!(rtt.record_inbound_ping(2, t0 + millis(1)).is_some());
        assert!(rtt.record_inbound_ping(3, t0 + millis(1)).is_some());
    }

    #[test]
    fn test_backlog_reused_code() {
        let t0 = Instant::now();
        let mut rtt = RoundTripTimes::new(10, 2);

        rtt.record_outbound_ping(1, t0);
        rtt.record_outbound_ping(2, t0);
        rtt.record_outbound_ping(1, t0 + millis(10));
        rtt.record_outbound_ping(3, t0 + millis(10));

        // 2 was evicted, the second 1 survives with its new timestamp
        assert_eq!(rtt.record_inbound_ping(2, t0 + millis(20)), None);
        assert_eq!(rtt.record_inbound_ping(1, t0 + millis(20)), Some(millis(10)));
    }
}
