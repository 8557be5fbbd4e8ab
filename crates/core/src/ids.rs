//! Time-ordered identifier allocation.
//!
//! Ids are laid out most significant bit first as: one unused sign bit,
//! 41 bits of milliseconds since [`EPOCH_MS`], 10 bits of machine id and
//! 12 bits of per-millisecond sequence. The result is always a positive
//! `i64`, so the same value works as a BIGINT primary key and as a file
//! name in a course's content repository.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::types::DbId;

/// Custom epoch: 2024-10-24T00:00:00Z in Unix milliseconds.
pub const EPOCH_MS: i64 = 1_729_728_000_000;

const TIMESTAMP_BITS: u32 = 41;
const MACHINE_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

/// Largest machine id that fits the layout.
pub const MAX_MACHINE_ID: u16 = (1 << MACHINE_ID_BITS) - 1;

const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const MAX_ELAPSED_MS: i64 = (1 << TIMESTAMP_BITS) - 1;

/// Backward clock steps up to this size are absorbed by reusing the last
/// issued millisecond. Larger steps fail.
pub const CLOCK_DRIFT_TOLERANCE_MS: i64 = 10;

/// Longest spin while waiting for the clock to pass a millisecond whose
/// sequence space is exhausted. The spin holds the allocator lock on the
/// calling thread, which may be an async worker, so it stays short.
const MAX_EXHAUSTED_WAIT: Duration = Duration::from_millis(2);

/// Source of fresh, globally unique ids.
pub trait IdAllocator: Send + Sync {
    /// Return an id greater than every id previously returned by this
    /// allocator.
    fn next_id(&self) -> Result<DbId, CoreError>;
}

/// Millisecond wall clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Default)]
struct AllocatorState {
    last_ms: i64,
    sequence: i64,
}

/// Lock-protected snowflake allocator.
pub struct SnowflakeAllocator {
    machine_id: i64,
    clock: Arc<dyn Clock>,
    state: Mutex<AllocatorState>,
}

impl SnowflakeAllocator {
    /// Create an allocator for `machine_id` using the system clock.
    pub fn new(machine_id: u16) -> Result<Self, CoreError> {
        Self::with_clock(machine_id, Arc::new(SystemClock))
    }

    /// Create an allocator with an explicit clock.
    pub fn with_clock(machine_id: u16, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        if machine_id > MAX_MACHINE_ID {
            return Err(CoreError::Validation(format!(
                "Machine id must be at most {MAX_MACHINE_ID}, got {machine_id}"
            )));
        }
        Ok(Self {
            machine_id: i64::from(machine_id),
            clock,
            state: Mutex::new(AllocatorState::default()),
        })
    }

    fn wait_past(&self, last_ms: i64) -> Result<i64, CoreError> {
        let started = Instant::now();
        loop {
            let now = self.clock.now_ms();
            if now > last_ms {
                return Ok(now);
            }
            if started.elapsed() >= MAX_EXHAUSTED_WAIT {
                return Err(CoreError::Internal(format!(
                    "Clock did not advance past {last_ms} while allocating an id"
                )));
            }
            std::hint::spin_loop();
        }
    }
}

impl fmt::Debug for SnowflakeAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeAllocator")
            .field("machine_id", &self.machine_id)
            .finish_non_exhaustive()
    }
}

impl IdAllocator for SnowflakeAllocator {
    fn next_id(&self) -> Result<DbId, CoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::Internal("Id allocator lock poisoned".to_string()))?;

        let mut now = self.clock.now_ms();
        if now < state.last_ms {
            let drift = state.last_ms - now;
            if drift > CLOCK_DRIFT_TOLERANCE_MS {
                return Err(CoreError::Internal(format!(
                    "Clock moved backwards by {drift}ms, refusing to allocate ids"
                )));
            }
            now = state.last_ms;
        }

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                now = self.wait_past(state.last_ms)?;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        let elapsed = now - EPOCH_MS;
        if !(0..=MAX_ELAPSED_MS).contains(&elapsed) {
            return Err(CoreError::Internal(format!(
                "Clock reading {now} is outside the allocator's time range"
            )));
        }

        Ok((elapsed << (MACHINE_ID_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.sequence)
    }
}

/// Split an id into `(unix_ms, machine_id, sequence)`.
pub fn decompose(id: DbId) -> (i64, u16, u16) {
    let sequence = (id & MAX_SEQUENCE) as u16;
    let machine_id = ((id >> SEQUENCE_BITS) & i64::from(MAX_MACHINE_ID)) as u16;
    let elapsed = id >> (MACHINE_ID_BITS + SEQUENCE_BITS);
    (elapsed + EPOCH_MS, machine_id, sequence)
}
