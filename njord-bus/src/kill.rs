use crate::{Bus, BusError};
use std::{
    io,
    path::{Path, PathBuf},
};

/// Key on the bus key/value plane whose value `"1"` means tripped.
pub const DEFAULT_BUS_KEY: &str = "njord:kill_switch";

/// Process-wide halt condition, OR-combined from two independent probes:
/// a file sentinel (presence means tripped, any content) and a bus-level flag.
///
/// The switch has no armed state; probing, tripping and clearing are stateless
/// and idempotent. Any component performing a live-impact action consults both
/// probes.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    file_path: PathBuf,
    bus_key: String,
}

impl KillSwitch {
    pub fn new(file_path: impl Into<PathBuf>, bus_key: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            bus_key: bus_key.into(),
        }
    }

    pub fn with_default_key(file_path: impl Into<PathBuf>) -> Self {
        Self::new(file_path, DEFAULT_BUS_KEY)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn bus_key(&self) -> &str {
        &self.bus_key
    }

    /// Whether the file sentinel probe is tripped.
    pub fn file_tripped(&self) -> bool {
        self.file_path.exists()
    }

    /// Whether the bus flag probe is tripped.
    pub async fn bus_tripped(&self, bus: &dyn Bus) -> Result<bool, BusError> {
        Ok(bus.get_key(&self.bus_key).await?.as_deref() == Some("1"))
    }

    /// Whether either probe is tripped.
    pub async fn tripped(&self, bus: &dyn Bus) -> Result<bool, BusError> {
        if self.file_tripped() {
            return Ok(true);
        }
        self.bus_tripped(bus).await
    }

    /// Trip the file sentinel (`touch`).
    pub fn trip_file(&self) -> io::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file_path, b"")
    }

    /// Clear the file sentinel (`unlink`); clearing an already-clear switch is a no-op.
    pub fn clear_file(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub async fn trip_bus(&self, bus: &dyn Bus) -> Result<(), BusError> {
        bus.set_key(&self.bus_key, "1").await
    }

    pub async fn clear_bus(&self, bus: &dyn Bus) -> Result<(), BusError> {
        bus.del_key(&self.bus_key).await
    }
}
