use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use log::{debug, warn};
use thiserror::Error;

use super::config::Configuration;

const FILE_NAME: &str = "notify.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unable to locate config dir")]
    NoConfigDir,
}

/// Durable home of the notification [`Configuration`].
///
/// Every setter rewrites the whole file through a temp file, `fsync` and
/// rename, so the new values are on disk before the call returns and a
/// crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// `~/.config/keepalive/notify.json` on Linux, `%APPDATA%\keepalive\notify.json` on Windows, etc.
    pub fn new() -> Result<Self, StoreError> {
        let proj = ProjectDirs::from("", "", "keepalive").ok_or(StoreError::NoConfigDir)?;
        Self::with_dir(proj.config_dir())
    }

    /// Store rooted in an explicit directory (created if missing).
    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(FILE_NAME),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration; defaults when nothing was stored yet.
    ///
    /// A file that cannot be read is logged and treated as unset.
    pub fn get(&self) -> Configuration {
        match self.try_get() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Could not read {:?}, using defaults: {}", self.path, e);
                Configuration::default()
            }
        }
    }

    pub fn try_get(&self) -> Result<Configuration, StoreError> {
        match fs::File::open(&self.path) {
            Ok(file) => Ok(serde_json::from_reader(io::BufReader::new(file))?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Configuration::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Updates endpoint and/or sub-path; `None` keeps the stored value.
    pub fn set_config(
        &self,
        base_endpoint: Option<&str>,
        sub_path: Option<&str>,
    ) -> Result<(), StoreError> {
        self.update(|cfg| {
            if let Some(base) = base_endpoint {
                cfg.base_endpoint = base.to_string();
            }
            if let Some(path) = sub_path {
                cfg.sub_path = path.to_string();
            }
        })
    }

    /// Replaces the token; `None` clears it.
    pub fn set_token(&self, token: Option<&str>) -> Result<(), StoreError> {
        self.update(|cfg| cfg.token = token.unwrap_or_default().to_string())
    }

    fn update(&self, apply: impl FnOnce(&mut Configuration)) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        // An unreadable file is left alone rather than rewritten from defaults.
        let mut cfg = self.try_get()?;
        apply(&mut cfg);
        self.write(&cfg)
    }

    fn write(&self, cfg: &Configuration) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, cfg)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!("Saved {:?} to {:?}", cfg, self.path);
        Ok(())
    }
}
