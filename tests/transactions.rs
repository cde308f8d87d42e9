use anyhow::Result;

use pcf8583::calendar::{self, Field, TimeValue};
use pcf8583::registers::{Register, ADDRESS_SPACE, REGISTER_COUNT};
use pcf8583::{BusMaster, ManualClock, MemoryStorage, Pcf8583, SaveDir, State};

// Sunday 2021-03-14 15:09:26 UTC
const PI_DAY: TimeValue = 1_615_734_566;

type TestChip<'a> = Pcf8583<&'a ManualClock, MemoryStorage>;

fn chip(clock: &ManualClock) -> Result<TestChip<'_>> {
    Pcf8583::new("pcf8583", clock, MemoryStorage::new())
}

#[test]
fn single_byte_write() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    let mut master = BusMaster::new(&mut chip);
    master.start();
    assert!(master.write_byte(0xa0));
    assert!(master.write_byte(0x20));
    assert!(master.write_byte(0x5a));
    master.stop();

    assert_eq!(chip.ram()[0x20 - REGISTER_COUNT], 0x5a);
    assert_eq!(chip.register_pointer(), 0x21);
    assert_eq!(chip.state(), State::Idle);
    Ok(())
}

#[test]
fn last_address_wraps_to_control() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    BusMaster::new(&mut chip).write_registers(0xff, &[0x01, 0x04])?;
    assert_eq!(chip.ram()[ADDRESS_SPACE - REGISTER_COUNT - 1], 0x01);
    assert_eq!(chip.registers()[Register::Control as usize], 0x04);
    assert_eq!(chip.register_pointer(), 1);
    Ok(())
}

#[test]
fn burst_read_returns_snapshot_in_order() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    clock.set_centisecond(12);
    let mut chip = chip(&clock)?;
    let mut master = BusMaster::new(&mut chip);
    master.write_registers(0x08, &[0x11, 0x22, 0x33])?;
    master.write_registers(0x10, &[0xde, 0xad])?;

    let mut buf = [0; 0x12];
    master.read_registers(0, &mut buf)?;
    assert_eq!(
        buf,
        [
            0x00, 0x12, 0x26, 0x09, 0x15, 0x54, 0x23, 0x00, 0x11, 0x22, 0x33, 0x00, 0x00, 0x00,
            0x00, 0x00, 0xde, 0xad
        ]
    );
    assert_eq!(chip.state(), State::Idle);
    assert_eq!(chip.register_pointer(), 0x11);
    Ok(())
}

#[test]
fn reads_within_a_transaction_are_frozen() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    let mut master = BusMaster::new(&mut chip);
    master.write_registers(Register::Seconds as u8, &[])?;

    master.start();
    assert!(master.write_byte(0xa1));
    let first = master.read_byte(true);
    clock.advance(5);
    clock.set_centisecond(99);
    let mut again = 0;
    for i in 1..=ADDRESS_SPACE {
        again = master.read_byte(i != ADDRESS_SPACE);
    }
    master.stop();
    assert_eq!(first, 0x26);
    assert_eq!(again, first);

    let mut seconds = [0];
    master.read_registers(Register::Seconds as u8, &mut seconds)?;
    assert_eq!(seconds[0], 0x31);
    Ok(())
}

#[test]
fn halt_and_resume_do_not_jump() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    {
        let mut master = BusMaster::new(&mut chip);
        master.write_registers(Register::Control as u8, &[0x80])?;
    }
    assert!(chip.is_halted());
    clock.advance(86_400 + 17);
    {
        let mut master = BusMaster::new(&mut chip);
        let mut buf = [0; 3];
        master.read_registers(Register::Seconds as u8, &mut buf)?;
        assert_eq!(buf, [0x26, 0x09, 0x15]);
        master.write_registers(Register::Control as u8, &[0x00])?;
    }
    assert!(!chip.is_halted());
    assert_eq!(chip.now(), PI_DAY);

    clock.advance(4);
    let mut buf = [0; 3];
    BusMaster::new(&mut chip).read_registers(Register::Seconds as u8, &mut buf)?;
    assert_eq!(buf, [0x30, 0x09, 0x15]);
    Ok(())
}

#[test]
fn setting_time_while_halted() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    let mut master = BusMaster::new(&mut chip);
    // halt, then 23:59:50 in one burst
    master.write_registers(Register::Control as u8, &[0x80, 0x00, 0x50, 0x59, 0x23])?;
    clock.advance(1000);
    master.write_registers(Register::Control as u8, &[0x00])?;
    clock.advance(15);

    let mut buf = [0; 5];
    master.read_registers(Register::Seconds as u8, &mut buf)?;
    // 00:00:05 on Monday the 15th
    assert_eq!(buf, [0x05, 0x00, 0x00, 0x55, 0x43]);
    Ok(())
}

#[test]
fn twelve_hour_pm_moves_to_bit_six() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    let mut master = BusMaster::new(&mut chip);
    master.write_registers(Register::Hours as u8, &[0x80 | 0x20 | 0x07])?;
    let mut hours = [0];
    master.read_registers(Register::Hours as u8, &mut hours)?;
    assert_eq!(hours[0], 0xc7);
    assert!(chip.twelve_hour());
    assert_eq!(calendar::get(Field::Hour, chip.now(), false), 19);
    Ok(())
}

#[test]
fn unknown_device_changes_nothing() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut chip = chip(&clock)?;
    let mut master = BusMaster::new(&mut chip);
    master.start();
    assert!(!master.write_byte(0xd0));
    for _ in 0..4 {
        master.write_byte(0xff);
    }
    master.stop();
    assert_eq!(chip.state(), State::Idle);
    assert!(!chip.is_dirty());
    Ok(())
}

#[test]
fn persistence_round_trip() -> Result<()> {
    let clock = ManualClock::new(PI_DAY);
    let mut storage = MemoryStorage::new();

    let mut chip = Pcf8583::new("cmd-rtc", &clock, &mut storage)?;
    let mut master = BusMaster::new(&mut chip);
    master.write_registers(Register::AlarmControl as u8, &[0x90, 0x12])?;
    master.write_registers(0x40, b"battery")?;
    master.write_registers(Register::Minutes as u8, &[0x45])?;
    let offset = chip.offset();
    assert!(chip.shutdown(true)?);
    assert_eq!(storage.saves(), 1);

    let mut chip = Pcf8583::new("cmd-rtc", &clock, &mut storage)?;
    assert_eq!(chip.offset(), offset);
    let mut buf = [0; 7];
    BusMaster::new(&mut chip).read_registers(0x40, &mut buf)?;
    assert_eq!(&buf, b"battery");
    let mut alarm = [0; 2];
    BusMaster::new(&mut chip).read_registers(Register::AlarmControl as u8, &mut alarm)?;
    assert_eq!(alarm, [0x90, 0x12]);
    assert!(!chip.shutdown(true)?);
    assert_eq!(storage.saves(), 1);
    Ok(())
}

#[test]
fn save_dir_persists_across_instances() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let clock = ManualClock::new(PI_DAY);

    let mut chip = Pcf8583::new("rtc", &clock, SaveDir::new(dir.path()))?;
    BusMaster::new(&mut chip).write_registers(0x10, &[1, 2, 3])?;
    assert!(chip.shutdown(true)?);

    let chip = Pcf8583::new("rtc", &clock, SaveDir::new(dir.path()))?;
    assert_eq!(&chip.ram()[..3], &[1, 2, 3]);
    let other = Pcf8583::new("other", &clock, SaveDir::new(dir.path()))?;
    assert_eq!(&other.ram()[..3], &[0, 0, 0]);
    Ok(())
}

mod proptests {
    use super::*;
    use test_strategy::{proptest, Arbitrary};

    #[derive(Debug, Clone, Copy, Arbitrary)]
    enum Edge {
        Clock(bool),
        Data(bool),
    }

    /// Line activity that never pulls data low while the clock is high.
    #[proptest]
    fn no_start_means_no_effect(edges: Vec<Edge>) {
        let clock = ManualClock::new(PI_DAY);
        let mut chip = chip(&clock).unwrap();
        let mut clock_line = true;
        let mut data_line = true;
        for edge in edges {
            match edge {
                Edge::Clock(level) => {
                    chip.set_clock_line(level);
                    clock_line = level;
                }
                Edge::Data(level) => {
                    if clock_line && data_line && !level {
                        continue;
                    }
                    chip.set_data_line(level);
                    data_line = level;
                }
            }
        }
        assert_eq!(chip.state(), State::Idle);
        assert!(!chip.is_dirty());
        assert_eq!(chip.register_pointer(), 0);
    }

    #[proptest]
    fn written_bytes_read_back(#[strategy(8..=255u8)] pointer: u8, value: u8) {
        let clock = ManualClock::new(PI_DAY);
        let mut chip = chip(&clock).unwrap();
        BusMaster::new(&mut chip)
            .write_registers(pointer, &[value])
            .unwrap();
        assert_eq!(
            chip.register_pointer(),
            (usize::from(pointer) + 1) % ADDRESS_SPACE
        );

        let mut buf = [0];
        BusMaster::new(&mut chip)
            .read_registers(pointer, &mut buf)
            .unwrap();
        assert_eq!(buf[0], value);
        // a NACKed byte doesn't advance the pointer
        assert_eq!(chip.register_pointer(), usize::from(pointer));
    }

    #[proptest]
    fn halt_resume_round_trip(#[strategy(0..1_000_000i64)] paused: i64, offset: i16) {
        let clock = ManualClock::new(PI_DAY + i64::from(offset));
        let mut chip = chip(&clock).unwrap();
        BusMaster::new(&mut chip)
            .write_registers(Register::Control as u8, &[0x80])
            .unwrap();
        let halted_at = chip.now();
        clock.advance(paused);
        BusMaster::new(&mut chip)
            .write_registers(Register::Control as u8, &[0x00])
            .unwrap();
        assert_eq!(chip.now(), halted_at);
    }
}
