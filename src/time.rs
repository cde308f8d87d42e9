use std::cell::Cell;

use chrono::{Local, TimeZone, Timelike, Utc};

use crate::calendar::{self, Field, TimeValue};
use crate::utils::encode;

/// Source of host time plus the calendar accessors the chip reads and
/// writes its time registers through.
///
/// Only the two host queries are required. Everything else works on
/// either an offset (running clock, relative to host time) or a latch
/// (a fixed virtual time value).
pub trait TimeBackend {
    /// Host wall-clock time in seconds.
    fn host_time(&self) -> TimeValue;

    /// Hundredths of the current host second, `0..=99`.
    fn host_centisecond(&self) -> u8;

    /// Virtual "now" of a clock running at `offset` from the host.
    /// Saturates instead of wrapping.
    fn get_latch(&self, offset: i64) -> TimeValue {
        self.host_time().saturating_add(offset)
    }

    fn get_centisecond(&self, bcd: bool) -> u8 {
        encode(self.host_centisecond().min(99), bcd)
    }

    fn get(&self, field: Field, latch: TimeValue, bcd: bool) -> u8 {
        calendar::get(field, latch, bcd)
    }

    /// Returns the offset that makes `field` of the running clock read
    /// `value` right now.
    fn set(&self, field: Field, value: i32, offset: i64, bcd: bool) -> i64 {
        let now = self.get_latch(offset);
        offset.saturating_add(calendar::set(field, value, now, bcd).saturating_sub(now))
    }

    fn set_latched(&self, field: Field, value: i32, latch: TimeValue, bcd: bool) -> TimeValue {
        calendar::set(field, value, latch, bcd)
    }
}

impl<T: TimeBackend + ?Sized> TimeBackend for &T {
    fn host_time(&self) -> TimeValue {
        (**self).host_time()
    }

    fn host_centisecond(&self) -> u8 {
        (**self).host_centisecond()
    }

    fn get_latch(&self, offset: i64) -> TimeValue {
        (**self).get_latch(offset)
    }

    fn get_centisecond(&self, bcd: bool) -> u8 {
        (**self).get_centisecond(bcd)
    }

    fn get(&self, field: Field, latch: TimeValue, bcd: bool) -> u8 {
        (**self).get(field, latch, bcd)
    }

    fn set(&self, field: Field, value: i32, offset: i64, bcd: bool) -> i64 {
        (**self).set(field, value, offset, bcd)
    }

    fn set_latched(&self, field: Field, value: i32, latch: TimeValue, bcd: bool) -> TimeValue {
        (**self).set_latched(field, value, latch, bcd)
    }
}

/// The host's local wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeBackend for SystemClock {
    fn host_time(&self) -> TimeValue {
        Utc.from_utc_datetime(&Local::now().naive_local()).timestamp()
    }

    fn host_centisecond(&self) -> u8 {
        (Local::now().nanosecond() / 10_000_000).min(99) as u8
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<TimeValue>,
    centisecond: Cell<u8>,
}

impl ManualClock {
    pub fn new(now: TimeValue) -> Self {
        ManualClock {
            now: Cell::new(now),
            centisecond: Cell::new(0),
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set_time(&self, now: TimeValue) {
        self.now.set(now);
    }

    pub fn set_centisecond(&self, centisecond: u8) {
        self.centisecond.set(centisecond);
    }
}

impl TimeBackend for ManualClock {
    fn host_time(&self) -> TimeValue {
        self.now.get()
    }

    fn host_centisecond(&self) -> u8 {
        self.centisecond.get()
    }
}
