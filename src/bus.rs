use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::utils::*;

/// Device select byte for a write transfer.
pub const WRITE_ADDRESS: u8 = 0xa0;
/// Device select byte for a read transfer.
pub const READ_ADDRESS: u8 = 0xa1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Idle,
    StartWait,
    GetAddress,
    AddressWriteAck,
    AddressReadAck,
    GetRegNr,
    RegNrAck,
    ReadRegs,
    ReadAck,
    WriteRegs,
    WriteAck,
}

/// What the bus reads and writes bytes through.
pub trait RegisterFile {
    /// Called on every START condition.
    fn start(&mut self);
    fn read(&self, addr: usize) -> u8;
    fn write(&mut self, addr: usize, val: u8);
    /// Size of the address space the register pointer wraps around.
    fn size(&self) -> usize;
}

/// Two-wire protocol decoder, driven one line level at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    clock_line: bool,
    data_line: bool,
    state: State,
    bit: u8,
    shift: u8,
    pointer: usize,
}

impl Default for Bus {
    fn default() -> Self {
        Bus {
            clock_line: true,
            data_line: true,
            state: State::Idle,
            bit: 0,
            shift: 0,
            pointer: 0,
        }
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn clock_line(&self) -> bool {
        self.clock_line
    }

    pub fn data_line(&self) -> bool {
        self.data_line
    }

    /// Checks state restored from outside against an address space of
    /// `size` bytes.
    pub fn validate(&self, size: usize) -> Result<()> {
        if self.pointer >= size {
            bail!("Register pointer {:#x} outside {} bytes", self.pointer, size);
        }
        let max_bit = if self.state == State::ReadRegs { 7 } else { 8 };
        if self.bit > max_bit {
            bail!("Bit count {} in {:?}", self.bit, self.state);
        }
        Ok(())
    }

    pub fn set_clock<R: RegisterFile>(&mut self, level: bool, regs: &mut R) {
        if self.clock_line == level {
            return;
        }
        self.clock_line = level;
        if level {
            return;
        }

        let last_state = self.state;
        match self.state {
            State::Idle => {}
            State::StartWait => self.state = State::GetAddress,
            State::GetAddress => {
                if self.shift_in() {
                    self.state = match self.shift {
                        WRITE_ADDRESS => State::AddressWriteAck,
                        READ_ADDRESS => State::AddressReadAck,
                        addr => {
                            debug!("ignoring device address {:#04x}", addr);
                            State::Idle
                        }
                    };
                }
            }
            State::AddressWriteAck => {
                self.reset_shift();
                self.state = State::GetRegNr;
            }
            State::GetRegNr => {
                if self.shift_in() {
                    self.pointer = usize::from(self.shift) % regs.size();
                    self.state = State::RegNrAck;
                }
            }
            State::RegNrAck | State::WriteAck => {
                self.reset_shift();
                self.state = State::WriteRegs;
            }
            State::WriteRegs => {
                if self.shift_in() {
                    regs.write(self.pointer, self.shift);
                    self.advance_pointer(regs);
                    self.state = State::WriteAck;
                }
            }
            State::AddressReadAck => self.load(regs),
            State::ReadRegs => {
                self.bit += 1;
                if self.bit == 8 {
                    self.state = State::ReadAck;
                }
            }
            State::ReadAck => {
                if self.data_line {
                    debug!("read ended by master at {:#04x}", self.pointer);
                    self.state = State::Idle;
                } else {
                    self.advance_pointer(regs);
                    self.load(regs);
                }
            }
        }
        if self.state != last_state {
            trace!("{:?} -> {:?}", last_state, self.state);
        }
    }

    pub fn set_data<R: RegisterFile>(&mut self, level: bool, regs: &mut R) {
        if self.data_line == level {
            return;
        }
        self.data_line = level;
        if !self.clock_line {
            return;
        }

        if level {
            if self.state != State::Idle {
                debug!("stop in {:?}", self.state);
            }
            self.state = State::Idle;
        } else {
            trace!("start");
            regs.start();
            self.reset_shift();
            self.state = State::StartWait;
        }
    }

    /// The level the chip leaves on the data line: a data bit while
    /// sending, low while acknowledging, otherwise released high.
    pub fn read_data(&self) -> bool {
        match self.state {
            State::ReadRegs => self.shift.bit(7 - self.bit),
            State::AddressWriteAck
            | State::AddressReadAck
            | State::RegNrAck
            | State::ReadAck
            | State::WriteAck => false,
            _ => true,
        }
    }

    /// Samples the data line into the next bit; true once a byte is complete.
    fn shift_in(&mut self) -> bool {
        self.shift |= u8::from(self.data_line) << (7 - self.bit);
        self.bit += 1;
        self.bit == 8
    }

    fn reset_shift(&mut self) {
        self.shift = 0;
        self.bit = 0;
    }

    fn advance_pointer<R: RegisterFile>(&mut self, regs: &R) {
        self.pointer = (self.pointer + 1) % regs.size();
    }

    fn load<R: RegisterFile>(&mut self, regs: &R) {
        self.shift = regs.read(self.pointer);
        self.bit = 0;
        self.state = State::ReadRegs;
    }
}
