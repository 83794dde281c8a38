//! Persistent machine records.
//!
//! Each machine lives in `<store>/machines/<name>/` next to its SSH key. The
//! record holds the raw options, the validated configuration once available,
//! and the identifiers recorded during provisioning, so a later invocation can
//! start, stop or remove the instance.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instance::Instance;
use crate::server_config::{ServerConfig, ServerOptions};

const MACHINES_DIR: &str = "machines";
const RECORD_FILE_NAME: &str = "machine.json";
/// File name of the machine's private key inside its directory.
pub const PRIVATE_KEY_FILE_NAME: &str = "id_rsa";

/// Errors raised while reading or writing machine records.
#[derive(Debug, Error)]
pub enum MachineStoreError {
    /// Raised when the machine name cannot be used as a directory name.
    #[error("invalid machine name {name:?}: use letters, digits, '-', '_' or '.'")]
    InvalidName {
        /// Rejected name.
        name: String,
    },
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a record cannot be encoded or decoded.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the record.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Everything persisted for one machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    /// Name the host runtime knows the machine by.
    pub machine_name: String,
    /// Options as supplied on the command line.
    pub options: ServerOptions,
    /// Validated configuration, present once validation succeeded.
    #[serde(default)]
    pub config: Option<ServerConfig>,
    /// Identifiers recorded during provisioning.
    #[serde(default)]
    pub instance: Instance,
}

impl MachineRecord {
    /// Creates a record for a machine that has not been validated yet.
    #[must_use]
    pub fn new(machine_name: impl Into<String>, options: ServerOptions) -> Self {
        Self {
            machine_name: machine_name.into(),
            options,
            config: None,
            instance: Instance::new(),
        }
    }
}

/// Directory-backed store of machine records.
#[derive(Clone, Debug)]
pub struct MachineStore {
    root: Utf8PathBuf,
}

fn io_error(path: &Utf8Path, err: &io::Error) -> MachineStoreError {
    MachineStoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn check_name(name: &str) -> Result<(), MachineStoreError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(MachineStoreError::InvalidName {
            name: name.to_owned(),
        })
    }
}

impl MachineStore {
    /// Opens a store rooted at `root`. Nothing is created until a record is
    /// saved.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding one machine's record and key material.
    ///
    /// # Errors
    ///
    /// Returns [`MachineStoreError::InvalidName`] for names that are not a
    /// single path component.
    pub fn machine_dir(&self, name: &str) -> Result<Utf8PathBuf, MachineStoreError> {
        check_name(name)?;
        Ok(self.root.join(MACHINES_DIR).join(name))
    }

    /// Path of the machine's private key.
    ///
    /// # Errors
    ///
    /// Returns [`MachineStoreError::InvalidName`] for invalid names.
    pub fn private_key_path(&self, name: &str) -> Result<Utf8PathBuf, MachineStoreError> {
        Ok(self.machine_dir(name)?.join(PRIVATE_KEY_FILE_NAME))
    }

    /// Creates the machine directory if needed and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`MachineStoreError`] when the directory cannot be created.
    pub fn ensure_machine_dir(&self, name: &str) -> Result<Utf8PathBuf, MachineStoreError> {
        let dir = self.machine_dir(name)?;
        Dir::create_ambient_dir_all(&dir, ambient_authority())
            .map_err(|err| io_error(&dir, &err))?;
        Ok(dir)
    }

    /// Loads a record, returning `None` when the machine is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`MachineStoreError`] when the record exists but cannot be
    /// read or parsed.
    pub fn load(&self, name: &str) -> Result<Option<MachineRecord>, MachineStoreError> {
        let dir_path = self.machine_dir(name)?;
        let record_path = dir_path.join(RECORD_FILE_NAME);
        let dir = match Dir::open_ambient_dir(&dir_path, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&dir_path, &err)),
        };
        let contents = match dir.read_to_string(RECORD_FILE_NAME) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&record_path, &err)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| MachineStoreError::Parse {
                path: record_path,
                message: err.to_string(),
            })
    }

    /// Writes a record, creating the machine directory when needed.
    ///
    /// # Errors
    ///
    /// Returns [`MachineStoreError`] when the record cannot be written.
    pub fn save(&self, record: &MachineRecord) -> Result<Utf8PathBuf, MachineStoreError> {
        let dir_path = self.ensure_machine_dir(&record.machine_name)?;
        let record_path = dir_path.join(RECORD_FILE_NAME);
        let rendered =
            serde_json::to_string_pretty(record).map_err(|err| MachineStoreError::Parse {
                path: record_path.clone(),
                message: err.to_string(),
            })?;
        let dir = Dir::open_ambient_dir(&dir_path, ambient_authority())
            .map_err(|err| io_error(&dir_path, &err))?;
        dir.write(RECORD_FILE_NAME, rendered)
            .map_err(|err| io_error(&record_path, &err))?;
        Ok(record_path)
    }

    /// Deletes a machine directory with its record and key material. Missing
    /// machines are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`MachineStoreError`] when the directory cannot be removed.
    pub fn delete(&self, name: &str) -> Result<(), MachineStoreError> {
        let dir_path = self.machine_dir(name)?;
        let machines_path = self.root.join(MACHINES_DIR);
        let machines = match Dir::open_ambient_dir(&machines_path, ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(io_error(&machines_path, &err)),
        };
        match machines.remove_dir_all(name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&dir_path, &err)),
        }
    }
}

#[cfg(test)]
mod tests;
