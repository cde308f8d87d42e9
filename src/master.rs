use anyhow::{bail, Result};
use tracing::trace;

use crate::bus::{READ_ADDRESS, WRITE_ADDRESS};
use crate::chip::Pcf8583;
use crate::storage::Storage;
use crate::time::TimeBackend;
use crate::utils::*;

/// The three line operations a two-wire device exposes.
pub trait TwoWire {
    fn set_clock_line(&mut self, level: bool);
    fn set_data_line(&mut self, level: bool);
    fn read_data_line(&self) -> bool;
}

impl<T: TimeBackend, S: Storage> TwoWire for Pcf8583<T, S> {
    fn set_clock_line(&mut self, level: bool) {
        Pcf8583::set_clock_line(self, level)
    }

    fn set_data_line(&mut self, level: bool) {
        Pcf8583::set_data_line(self, level)
    }

    fn read_data_line(&self) -> bool {
        Pcf8583::read_data_line(self)
    }
}

/// Bit-bangs transfers onto a [`TwoWire`] device, the way the host CPU's
/// port routines do. Data only changes while the clock is low, except to
/// frame START and STOP.
pub struct BusMaster<'a, B: ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: TwoWire + ?Sized> BusMaster<'a, B> {
    pub fn new(bus: &'a mut B) -> Self {
        BusMaster { bus }
    }

    pub fn start(&mut self) {
        self.bus.set_data_line(true);
        self.bus.set_clock_line(true);
        self.bus.set_data_line(false);
        self.bus.set_clock_line(false);
    }

    pub fn stop(&mut self) {
        self.bus.set_data_line(false);
        self.bus.set_clock_line(true);
        self.bus.set_data_line(true);
    }

    /// Shifts out one byte MSB first; true if the device acknowledged it.
    pub fn write_byte(&mut self, byte: u8) -> bool {
        for i in (0..8).rev() {
            self.bus.set_data_line(byte.bit(i));
            self.bus.set_clock_line(true);
            self.bus.set_clock_line(false);
        }
        self.bus.set_data_line(true);
        self.bus.set_clock_line(true);
        let ack = !self.bus.read_data_line();
        self.bus.set_clock_line(false);
        trace!("sent {:#04x}, ack {}", byte, ack);
        ack
    }

    /// Shifts in one byte, then answers with ACK to keep reading or NACK to
    /// end the transfer.
    pub fn read_byte(&mut self, ack: bool) -> u8 {
        let mut byte = 0;
        self.bus.set_data_line(true);
        for _ in 0..8 {
            self.bus.set_clock_line(true);
            byte = (byte << 1) | u8::from(self.bus.read_data_line());
            self.bus.set_clock_line(false);
        }
        self.bus.set_data_line(!ack);
        self.bus.set_clock_line(true);
        self.bus.set_clock_line(false);
        self.bus.set_data_line(true);
        trace!("received {:#04x}", byte);
        byte
    }

    fn select(&mut self, address: u8) -> Result<()> {
        if !self.write_byte(address) {
            self.stop();
            bail!("No device answered at {:#04x}", address);
        }
        Ok(())
    }

    /// Points the device at `pointer` and writes `values` there in one burst.
    pub fn write_registers(&mut self, pointer: u8, values: &[u8]) -> Result<()> {
        self.start();
        self.select(WRITE_ADDRESS)?;
        let mut acked = self.write_byte(pointer);
        for &val in values {
            if !acked {
                break;
            }
            acked = self.write_byte(val);
        }
        self.stop();
        if !acked {
            bail!("Write to {:#04x} was not acknowledged", pointer);
        }
        Ok(())
    }

    /// Reads `buf.len()` bytes starting at `pointer`, using a repeated START
    /// so the whole burst comes from one snapshot.
    pub fn read_registers(&mut self, pointer: u8, buf: &mut [u8]) -> Result<()> {
        self.start();
        self.select(WRITE_ADDRESS)?;
        if !self.write_byte(pointer) {
            self.stop();
            bail!("Register pointer {:#04x} was not acknowledged", pointer);
        }
        if !buf.is_empty() {
            self.start();
            self.select(READ_ADDRESS)?;
            let last = buf.len() - 1;
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.read_byte(i != last);
            }
        }
        self.stop();
        Ok(())
    }
}
