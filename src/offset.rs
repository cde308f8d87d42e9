use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::{Field, TimeValue};
use crate::time::TimeBackend;

/// Which representation currently owns the virtual time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeBase {
    /// Host time plus the keeper's offset.
    Running,
    /// Frozen at `latch` until the clock is resumed.
    Halted { latch: TimeValue },
}

/// Keeps the chip's virtual clock as an offset from host time, or as a
/// frozen latch while the halt bit is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeKeeper {
    offset: i64,
    base: TimeBase,
}

impl TimeKeeper {
    pub fn new(offset: i64) -> Self {
        TimeKeeper {
            offset,
            base: TimeBase::Running,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn base(&self) -> TimeBase {
        self.base
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.base, TimeBase::Halted { .. })
    }

    pub fn now<T: TimeBackend>(&self, time: &T) -> TimeValue {
        match self.base {
            TimeBase::Running => time.get_latch(self.offset),
            TimeBase::Halted { latch } => latch,
        }
    }

    pub fn halt<T: TimeBackend>(&mut self, time: &T) {
        if let TimeBase::Running = self.base {
            let latch = time.get_latch(self.offset);
            debug!("clock halted at {}", latch);
            self.base = TimeBase::Halted { latch };
        }
    }

    /// Restarts the clock from the halted instant. Host time that passed
    /// while halted is folded into the offset.
    pub fn resume<T: TimeBackend>(&mut self, time: &T) {
        if let TimeBase::Halted { latch } = self.base {
            let elapsed = time.get_latch(0).saturating_sub(latch.saturating_sub(self.offset));
            self.offset = self.offset.saturating_sub(elapsed);
            debug!("clock resumed at {}, offset {}", latch, self.offset);
            self.base = TimeBase::Running;
        }
    }

    pub fn set_halted<T: TimeBackend>(&mut self, halt: bool, time: &T) {
        if halt {
            self.halt(time);
        } else {
            self.resume(time);
        }
    }

    /// Writes one calendar field into whichever representation is active.
    pub fn set_field<T: TimeBackend>(&mut self, time: &T, field: Field, value: i32, bcd: bool) {
        match self.base {
            TimeBase::Running => self.offset = time.set(field, value, self.offset, bcd),
            TimeBase::Halted { latch } => {
                self.base = TimeBase::Halted {
                    latch: time.set_latched(field, value, latch, bcd),
                }
            }
        }
    }
}
