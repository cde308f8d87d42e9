//! Emulation of the PCF8583 clock/calendar chip as it sits on a
//! bit-banged two-wire bus.
//!
//! The host machine drives the clock and data lines through
//! [`Pcf8583::set_clock_line`] and [`Pcf8583::set_data_line`] and samples
//! the chip's answer with [`Pcf8583::read_data_line`]. Host time and
//! battery-backed storage come from a [`TimeBackend`] and a [`Storage`].

pub mod bus;
pub mod calendar;
pub mod chip;
pub mod config;
pub mod master;
pub mod offset;
pub mod registers;
pub mod storage;
pub mod time;
pub mod utils;

pub use bus::State;
pub use chip::Pcf8583;
pub use master::{BusMaster, TwoWire};
pub use storage::{MemoryStorage, SaveDir, SavedContext, Storage};
pub use time::{ManualClock, SystemClock, TimeBackend};
