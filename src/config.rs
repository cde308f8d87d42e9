use anyhow::{Context, Result};
use clap::AppSettings;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(setting = AppSettings::DeriveDisplayOrder)]
pub struct Config {
    #[structopt(long, default_value = "./pcf8583.toml")]
    pub config_file: PathBuf,

    #[structopt(long)]
    pub saves_dir: Option<PathBuf>,

    #[structopt(long, help = "Name the battery-backed state is saved under")]
    pub device: Option<String>,

    #[structopt(long, help = "Don't write changes back to the saves directory")]
    pub no_save: bool,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Print the clock registers and RAM
    Dump,
    /// Print the time at a fixed interval
    Watch {
        #[structopt(long, default_value = "10")]
        count: u32,

        #[structopt(long, default_value = "1000")]
        interval_ms: u64,
    },
    /// Write bytes starting at a register address
    Poke {
        #[structopt(parse(try_from_str = parse_byte))]
        address: u8,

        #[structopt(parse(try_from_str = parse_byte), required = true)]
        values: Vec<u8>,
    },
}

/// Accepts `0x`-prefixed hex or decimal.
pub fn parse_byte(s: &str) -> Result<u8, ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

/// The struct that `pcf8583.toml` gets deserialized into.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub saves_dir: PathBuf,
    pub device: String,
    pub save_on_exit: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            saves_dir: PathBuf::from("./saves"),
            device: String::from("pcf8583"),
            save_on_exit: true,
        }
    }
}

impl Settings {
    /// Reads the TOML file at `path`; uses default values if the file
    /// doesn't exist or otherwise fails to open.
    pub fn load(path: &Path) -> Result<Self> {
        if let Ok(mut file) = File::open(path) {
            let mut toml = String::new();
            file.read_to_string(&mut toml)?;
            toml::from_str(&toml).with_context(|| format!("Couldn't parse `{}`", path.display()))
        } else {
            Ok(Settings::default())
        }
    }

    /// Command-line values win over the file.
    pub fn resolve(config: &Config) -> Result<Self> {
        let mut settings = Settings::load(&config.config_file)?;
        if let Some(dir) = &config.saves_dir {
            settings.saves_dir = dir.clone();
        }
        if let Some(device) = &config.device {
            settings.device = device.clone();
        }
        if config.no_save {
            settings.save_on_exit = false;
        }
        Ok(settings)
    }
}
