use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::Field;
use crate::offset::TimeKeeper;
use crate::time::TimeBackend;
use crate::utils::*;

pub const REGISTER_COUNT: usize = 16;
pub const RAM_SIZE: usize = 240;
pub const ADDRESS_SPACE: usize = REGISTER_COUNT + RAM_SIZE;

/// Control register: clock halt.
pub const HALT_BIT: u8 = 7;
/// Hours register: 12h mode.
pub const HOUR_MODE_BIT: u8 = 7;
/// Hours register: PM indicator in 12h mode.
pub const HOUR_PM: u8 = 0x40;
/// Where the calendar's 12h encoding keeps its PM flag.
const CALENDAR_PM: u8 = crate::calendar::AM_PM_FLAG;

#[derive(Primitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Control = 0,
    Centiseconds = 1,
    Seconds = 2,
    Minutes = 3,
    Hours = 4,
    YearDate = 5,
    WeekdayMonth = 6,
    TimerDays = 7,
    AlarmControl = 8,
    CentisecondAlarm = 9,
    SecondAlarm = 10,
    MinuteAlarm = 11,
    HourAlarm = 12,
    DateAlarm = 13,
    MonthAlarm = 14,
    TimerAlarm = 15,
}

/// Hours register: bit 7 is the 12h flag, bit 6 PM. A raw 12h value
/// carrying the calendar's PM flag in bit 5 has it moved to bit 6.
pub fn encode_hours(raw: u8, twelve_hour: bool) -> u8 {
    if !twelve_hour {
        return raw;
    }
    let val = (1 << HOUR_MODE_BIT) | raw;
    if val & CALENDAR_PM != 0 {
        (val & !CALENDAR_PM) | HOUR_PM
    } else {
        val
    }
}

/// Returns the mode flag and the six low bits handed to the calendar.
pub fn decode_hours(val: u8) -> (bool, u8) {
    (val.bit(HOUR_MODE_BIT), val & 0x3f)
}

/// Year (bits 7-6) and BCD day of month (bits 5-0).
pub fn encode_year_date(year: u8, day: u8) -> u8 {
    ((year & 0x03) << 6) | day
}

pub fn decode_year_date(val: u8) -> (u8, u8) {
    ((val & 0xc0) >> 6, val & 0x3f)
}

/// Weekday + 1 (bits 7-5) and BCD month (bits 4-0).
pub fn encode_weekday_month(weekday: u8, month: u8) -> u8 {
    ((weekday.wrapping_add(1) & 0x07) << 5) | month
}

/// The weekday comes back as days since Sunday, so a stored 0 decodes to -1.
pub fn decode_weekday_month(val: u8) -> (i32, u8) {
    (i32::from((val & 0xe0) >> 5) - 1, val & 0x1f)
}

/// The sixteen clock registers and the general-purpose RAM behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBank {
    registers: [u8; REGISTER_COUNT],
    snapshot: [u8; REGISTER_COUNT],
    ram: Vec<u8>,
    am_pm: bool,
}

impl RegisterBank {
    pub fn new(registers: [u8; REGISTER_COUNT], ram: Vec<u8>) -> Self {
        RegisterBank {
            registers,
            snapshot: [0; REGISTER_COUNT],
            ram,
            am_pm: false,
        }
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn snapshot(&self) -> &[u8; REGISTER_COUNT] {
        &self.snapshot
    }

    pub fn twelve_hour(&self) -> bool {
        self.am_pm
    }

    /// Fills the read buffer that serves every register read until the
    /// next START.
    pub fn latch_snapshot<T: TimeBackend>(&mut self, keeper: &TimeKeeper, time: &T) {
        let now = keeper.now(time);
        let hour = if self.am_pm {
            time.get(Field::HourAmPm, now, true)
        } else {
            time.get(Field::Hour, now, true)
        };

        let snap = &mut self.snapshot;
        snap[Register::Control as usize] = self.registers[Register::Control as usize];
        snap[Register::Centiseconds as usize] = time.get_centisecond(true);
        snap[Register::Seconds as usize] = time.get(Field::Second, now, true);
        snap[Register::Minutes as usize] = time.get(Field::Minute, now, true);
        snap[Register::Hours as usize] = encode_hours(hour, self.am_pm);
        snap[Register::YearDate as usize] = encode_year_date(
            time.get(Field::Year, now, true),
            time.get(Field::DayOfMonth, now, true),
        );
        snap[Register::WeekdayMonth as usize] = encode_weekday_month(
            time.get(Field::Weekday, now, true),
            time.get(Field::Month, now, true),
        );
        snap[Register::TimerDays as usize] = 0;
        let alarms = Register::AlarmControl as usize..REGISTER_COUNT;
        snap[alarms.clone()].copy_from_slice(&self.registers[alarms]);
    }

    pub fn read(&self, addr: usize) -> u8 {
        if addr < REGISTER_COUNT {
            self.snapshot[addr]
        } else {
            self.ram[addr - REGISTER_COUNT]
        }
    }

    pub fn write<T: TimeBackend>(
        &mut self,
        addr: usize,
        val: u8,
        keeper: &mut TimeKeeper,
        time: &T,
    ) {
        let reg = match Register::from_usize(addr) {
            Some(reg) => reg,
            None => {
                self.ram[addr - REGISTER_COUNT] = val;
                return;
            }
        };
        debug!("write {:?} <- {:#04x}", reg, val);
        match reg {
            Register::Control => {
                keeper.set_halted(val.bit(HALT_BIT), time);
                self.registers[addr] = val;
            }
            Register::Centiseconds | Register::TimerDays => {}
            Register::Seconds => keeper.set_field(time, Field::Second, i32::from(val), true),
            Register::Minutes => keeper.set_field(time, Field::Minute, i32::from(val), true),
            Register::Hours => {
                let (twelve_hour, raw) = decode_hours(val);
                let field = if twelve_hour {
                    Field::HourAmPm
                } else {
                    Field::Hour
                };
                keeper.set_field(time, field, i32::from(raw), true);
                self.am_pm = twelve_hour;
            }
            Register::YearDate => {
                let (year, day) = decode_year_date(val);
                keeper.set_field(time, Field::Year, i32::from(year), true);
                keeper.set_field(time, Field::DayOfMonth, i32::from(day), true);
            }
            Register::WeekdayMonth => {
                let (weekday, month) = decode_weekday_month(val);
                keeper.set_field(time, Field::Weekday, weekday, true);
                keeper.set_field(time, Field::Month, i32::from(month), true);
            }
            Register::AlarmControl
            | Register::CentisecondAlarm
            | Register::SecondAlarm
            | Register::MinuteAlarm
            | Register::HourAlarm
            | Register::DateAlarm
            | Register::MonthAlarm
            | Register::TimerAlarm => self.registers[addr] = val,
        }
    }
}
