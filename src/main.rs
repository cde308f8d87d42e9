use anyhow::Result;
use std::time::Duration;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::prelude::*;

use pcf8583::config::{Command, Config, Settings};
use pcf8583::registers::*;
use pcf8583::utils::from_bcd;
use pcf8583::{BusMaster, Pcf8583, SaveDir, Storage, SystemClock, TimeBackend};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn init_logging() -> Result<()> {
    // RUST_LOG selects what gets printed, e.g. RUST_LOG=pcf8583=trace
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn format_time(regs: &[u8]) -> String {
    let hours = regs[Register::Hours as usize];
    let (twelve_hour, hour) = decode_hours(hours);
    let (year, day) = decode_year_date(regs[Register::YearDate as usize]);
    let (weekday, month) = decode_weekday_month(regs[Register::WeekdayMonth as usize]);
    let weekday = WEEKDAYS.get(weekday as usize).copied().unwrap_or("???");
    let time = format!(
        "{:02}:{:02}:{:02}.{:02}",
        from_bcd(if twelve_hour { hour & 0x1f } else { hour }),
        from_bcd(regs[Register::Minutes as usize]),
        from_bcd(regs[Register::Seconds as usize]),
        from_bcd(regs[Register::Centiseconds as usize]),
    );
    let suffix = match (twelve_hour, hours & HOUR_PM != 0) {
        (false, _) => "",
        (true, false) => " AM",
        (true, true) => " PM",
    };
    format!(
        "{} {:02}/{:02} year+{} {}{}",
        weekday,
        from_bcd(day),
        from_bcd(month),
        year,
        time,
        suffix
    )
}

fn dump<T: TimeBackend, S: Storage>(chip: &mut Pcf8583<T, S>) -> Result<()> {
    let mut buf = [0; ADDRESS_SPACE];
    BusMaster::new(chip).read_registers(0, &mut buf)?;
    let control = buf[Register::Control as usize];
    println!("{}", format_time(&buf));
    println!(
        "control {:#04x}{}",
        control,
        if control & (1 << HALT_BIT) != 0 {
            " (halted)"
        } else {
            ""
        }
    );
    for (i, row) in buf.chunks(16).enumerate() {
        let bytes: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:02x}: {}", i * 16, bytes.join(" "));
    }
    Ok(())
}

fn watch<T: TimeBackend, S: Storage>(
    chip: &mut Pcf8583<T, S>,
    count: u32,
    interval: Duration,
) -> Result<()> {
    let mut buf = [0; Register::TimerDays as usize];
    for i in 0..count {
        if i > 0 {
            spin_sleep::sleep(interval);
        }
        BusMaster::new(&mut *chip).read_registers(0, &mut buf)?;
        println!("{}", format_time(&buf));
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let config = Config::from_args();
    let settings = Settings::resolve(&config)?;

    let storage = SaveDir::new(&settings.saves_dir);
    let mut chip = Pcf8583::new(&settings.device, SystemClock, storage)?;
    match config.command {
        Command::Dump => dump(&mut chip)?,
        Command::Watch { count, interval_ms } => {
            watch(&mut chip, count, Duration::from_millis(interval_ms))?
        }
        Command::Poke { address, values } => {
            BusMaster::new(&mut chip).write_registers(address, &values)?
        }
    }

    if chip.shutdown(settings.save_on_exit)? {
        info!("saved {} to {}", settings.device, settings.saves_dir.display());
    }
    Ok(())
}
