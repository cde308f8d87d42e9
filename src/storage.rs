use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Largest distance, in seconds, a saved clock may sit from host time:
/// a little over 400 years either way.
pub const MAX_OFFSET: i64 = 400 * 366 * 86_400;

/// Battery-backed state of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedContext {
    pub ram: Vec<u8>,
    pub registers: Vec<u8>,
    pub offset: i64,
}

impl SavedContext {
    pub fn zeroed(ram_size: usize, register_size: usize) -> Self {
        SavedContext {
            ram: vec![0; ram_size],
            registers: vec![0; register_size],
            offset: 0,
        }
    }

    pub fn fits(&self, ram_size: usize, register_size: usize) -> bool {
        self.ram.len() == ram_size
            && self.registers.len() == register_size
            && (-MAX_OFFSET..=MAX_OFFSET).contains(&self.offset)
    }
}

pub trait Storage {
    /// `Ok(None)` when nothing usable has been saved under `device`.
    fn load(
        &mut self,
        device: &str,
        ram_size: usize,
        register_size: usize,
    ) -> Result<Option<SavedContext>>;

    fn save(&mut self, device: &str, context: &SavedContext) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn load(
        &mut self,
        device: &str,
        ram_size: usize,
        register_size: usize,
    ) -> Result<Option<SavedContext>> {
        (**self).load(device, ram_size, register_size)
    }

    fn save(&mut self, device: &str, context: &SavedContext) -> Result<()> {
        (**self).save(device, context)
    }
}

/// One `<device>.rtc` file per device in a directory.
#[derive(Debug, Clone)]
pub struct SaveDir {
    dir: PathBuf,
}

impl SaveDir {
    pub fn new(dir: &Path) -> Self {
        SaveDir {
            dir: dir.to_path_buf(),
        }
    }

    pub fn path(&self, device: &str) -> PathBuf {
        self.dir.join(format!("{}.rtc", device))
    }
}

impl Storage for SaveDir {
    fn load(
        &mut self,
        device: &str,
        ram_size: usize,
        register_size: usize,
    ) -> Result<Option<SavedContext>> {
        let path = self.path(device);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Couldn't open `{}`", path.display()))
            }
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let context: SavedContext = bincode::deserialize(&data)
            .with_context(|| format!("Couldn't decode `{}`", path.display()))?;
        if !context.fits(ram_size, register_size) {
            warn!(
                "discarding `{}`: {} RAM and {} register bytes saved, offset {}",
                path.display(),
                context.ram.len(),
                context.registers.len(),
                context.offset
            );
            return Ok(None);
        }
        debug!("loaded {} from `{}`", device, path.display());
        Ok(Some(context))
    }

    fn save(&mut self, device: &str, context: &SavedContext) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Couldn't create `{}`", self.dir.display()))?;
        let path = self.path(device);
        let mut file = File::create(&path)
            .with_context(|| format!("Couldn't create `{}`", path.display()))?;
        file.write_all(&bincode::serialize(context)?)?;
        debug!("saved {} to `{}`", device, path.display());
        Ok(())
    }
}

/// Keeps saved contexts in memory and counts the saves.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    contexts: HashMap<String, SavedContext>,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn get(&self, device: &str) -> Option<&SavedContext> {
        self.contexts.get(device)
    }
}

impl Storage for MemoryStorage {
    fn load(
        &mut self,
        device: &str,
        ram_size: usize,
        register_size: usize,
    ) -> Result<Option<SavedContext>> {
        Ok(self
            .contexts
            .get(device)
            .filter(|context| context.fits(ram_size, register_size))
            .cloned())
    }

    fn save(&mut self, device: &str, context: &SavedContext) -> Result<()> {
        self.saves += 1;
        self.contexts.insert(device.to_string(), context.clone());
        Ok(())
    }
}
