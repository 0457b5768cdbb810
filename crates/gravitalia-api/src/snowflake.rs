use std::sync::Mutex;

use chrono::Utc;

/// 2023-01-01T19:06:40Z, in milliseconds.
pub const EPOCH_MS: i64 = 1_672_600_000_000;

const REGION_BITS: u32 = 5;
const WORKER_BITS: u32 = 5;
const SEQUENCE_BITS: u32 = 12;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;

/// Time-ordered 63-bit ids rendered as decimal strings.
///
/// Layout: milliseconds since [`EPOCH_MS`], region (5 bits), worker
/// (5 bits), per-millisecond sequence (12 bits).
pub struct Snowflake {
    region: i64,
    worker: i64,
    /// (last timestamp, next sequence)
    state: Mutex<(i64, i64)>,
}

impl Snowflake {
    pub fn new(region: u8, worker: u8) -> Self {
        Self {
            region: i64::from(region) & ((1 << REGION_BITS) - 1),
            worker: i64::from(worker) & ((1 << WORKER_BITS) - 1),
            state: Mutex::new((0, 0)),
        }
    }

    pub fn next_id(&self) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (last, sequence) = &mut *state;

        let mut now = Utc::now().timestamp_millis();
        if now < *last || (now == *last && *sequence > MAX_SEQUENCE) {
            // clock went backwards or the millisecond is exhausted
            while now <= *last {
                std::hint::spin_loop();
                now = Utc::now().timestamp_millis();
            }
        }
        if now > *last {
            *last = now;
            *sequence = 0;
        }

        let id = ((now - EPOCH_MS) << (REGION_BITS + WORKER_BITS + SEQUENCE_BITS))
            | (self.region << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker << SEQUENCE_BITS)
            | *sequence;
        *sequence += 1;
        id.to_string()
    }
}

/// Creation time of an id, in unix milliseconds.
#[cfg(test)]
fn timestamp_ms(id: &str) -> Option<i64> {
    let id: i64 = id.parse().ok()?;
    Some((id >> (REGION_BITS + WORKER_BITS + SEQUENCE_BITS)) + EPOCH_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_increasing() {
        let ids = Snowflake::new(1, 1);
        let mut previous: i64 = 0;
        for _ in 0..5000 {
            let id: i64 = ids.next_id().parse().unwrap();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn id_carries_its_timestamp() {
        let before = Utc::now().timestamp_millis();
        let id = Snowflake::new(1, 3).next_id();
        let at = timestamp_ms(&id).unwrap();
        assert!(at >= before);
        assert!(at <= Utc::now().timestamp_millis());
    }

    #[test]
    fn worker_bits_are_masked() {
        let id: i64 = Snowflake::new(0, 0xFF).next_id().parse().unwrap();
        assert_eq!((id >> SEQUENCE_BITS) & 0x1F, 0x1F);
    }
}
