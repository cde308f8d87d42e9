use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bus::{Bus, RegisterFile, State};
use crate::calendar::TimeValue;
use crate::offset::TimeKeeper;
use crate::registers::{RegisterBank, ADDRESS_SPACE, RAM_SIZE, REGISTER_COUNT};
use crate::storage::{SavedContext, Storage, MAX_OFFSET};
use crate::time::TimeBackend;

/// A PCF8583 clock/calendar with 240 bytes of battery-backed RAM, seen
/// from the two bus lines.
pub struct Pcf8583<T, S> {
    device: String,
    bank: RegisterBank,
    keeper: TimeKeeper,
    bus: Bus,
    baseline: SavedContext,
    time: T,
    storage: S,
    closed: bool,
}

/// The chip's volatile state, for emulator save states.
#[derive(Serialize, Deserialize)]
struct ChipState {
    bank: RegisterBank,
    keeper: TimeKeeper,
    bus: Bus,
}

/// Register bank as the bus sees it during one edge.
struct Registers<'a, T> {
    bank: &'a mut RegisterBank,
    keeper: &'a mut TimeKeeper,
    time: &'a T,
}

impl<T: TimeBackend> RegisterFile for Registers<'_, T> {
    fn start(&mut self) {
        self.bank.latch_snapshot(&*self.keeper, self.time);
    }

    fn read(&self, addr: usize) -> u8 {
        self.bank.read(addr)
    }

    fn write(&mut self, addr: usize, val: u8) {
        self.bank.write(addr, val, self.keeper, self.time);
    }

    fn size(&self) -> usize {
        ADDRESS_SPACE
    }
}

impl<T: TimeBackend, S: Storage> Pcf8583<T, S> {
    /// Restores whatever `storage` holds for `device`, or starts from a
    /// zeroed chip running at host time.
    pub fn new(device: &str, time: T, mut storage: S) -> Result<Self> {
        let saved = match storage.load(device, RAM_SIZE, REGISTER_COUNT)? {
            Some(saved) if saved.fits(RAM_SIZE, REGISTER_COUNT) => saved,
            _ => {
                info!("no saved state for {}, starting fresh", device);
                SavedContext::zeroed(RAM_SIZE, REGISTER_COUNT)
            }
        };

        let mut registers = [0; REGISTER_COUNT];
        registers.copy_from_slice(&saved.registers);
        Ok(Pcf8583 {
            device: device.to_string(),
            bank: RegisterBank::new(registers, saved.ram.clone()),
            keeper: TimeKeeper::new(saved.offset),
            bus: Bus::new(),
            baseline: saved,
            time,
            storage,
            closed: false,
        })
    }

    pub fn set_clock_line(&mut self, level: bool) {
        let mut regs = Registers {
            bank: &mut self.bank,
            keeper: &mut self.keeper,
            time: &self.time,
        };
        self.bus.set_clock(level, &mut regs);
    }

    pub fn set_data_line(&mut self, level: bool) {
        let mut regs = Registers {
            bank: &mut self.bank,
            keeper: &mut self.keeper,
            time: &self.time,
        };
        self.bus.set_data(level, &mut regs);
    }

    pub fn read_data_line(&self) -> bool {
        self.bus.read_data()
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn state(&self) -> State {
        self.bus.state()
    }

    pub fn register_pointer(&self) -> usize {
        self.bus.pointer()
    }

    pub fn ram(&self) -> &[u8] {
        self.bank.ram()
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        self.bank.registers()
    }

    pub fn offset(&self) -> i64 {
        self.keeper.offset()
    }

    pub fn is_halted(&self) -> bool {
        self.keeper.is_halted()
    }

    pub fn twelve_hour(&self) -> bool {
        self.bank.twelve_hour()
    }

    /// Current virtual time, running or halted.
    pub fn now(&self) -> TimeValue {
        self.keeper.now(&self.time)
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    /// Saves the battery-backed state if it changed. Returns whether a save
    /// happened.
    pub fn flush(&mut self) -> Result<bool> {
        let current = self.saved_context();
        if current == self.baseline {
            return Ok(false);
        }
        self.storage.save(&self.device, &current)?;
        debug!("{} saved", self.device);
        self.baseline = current;
        Ok(true)
    }

    /// Tears the chip down, saving first when `save` is set and something
    /// changed.
    pub fn shutdown(mut self, save: bool) -> Result<bool> {
        self.closed = true;
        if save {
            self.flush()
        } else {
            Ok(false)
        }
    }

    pub fn save_state(&self) -> Result<Vec<u8>> {
        let state = ChipState {
            bank: self.bank.clone(),
            keeper: self.keeper.clone(),
            bus: self.bus.clone(),
        };
        Ok(bincode::serialize(&state)?)
    }

    pub fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let state: ChipState = bincode::deserialize(data)?;
        if state.bank.ram().len() != RAM_SIZE {
            bail!("Invalid save state: {} bytes of RAM", state.bank.ram().len());
        }
        if !(-MAX_OFFSET..=MAX_OFFSET).contains(&state.keeper.offset()) {
            bail!("Invalid save state: clock offset {}", state.keeper.offset());
        }
        state
            .bus
            .validate(ADDRESS_SPACE)
            .context("Invalid save state")?;
        self.bank = state.bank;
        self.keeper = state.keeper;
        self.bus = state.bus;
        Ok(())
    }
}

impl<T, S> Pcf8583<T, S> {
    fn saved_context(&self) -> SavedContext {
        SavedContext {
            ram: self.bank.ram().to_vec(),
            registers: self.bank.registers().to_vec(),
            offset: self.keeper.offset(),
        }
    }

    /// True when RAM, registers or offset differ from what was last loaded
    /// or saved.
    pub fn is_dirty(&self) -> bool {
        self.saved_context() != self.baseline
    }

    /// True when dropping the chip now would lose changes that neither
    /// [`Pcf8583::flush`] nor [`Pcf8583::shutdown`] dealt with.
    pub fn unsaved_on_drop(&self) -> bool {
        !self.closed && self.is_dirty()
    }
}

impl<T, S> Drop for Pcf8583<T, S> {
    fn drop(&mut self) {
        if self.unsaved_on_drop() {
            warn!("{} dropped without shutdown, changes not saved", self.device);
        }
    }
}
