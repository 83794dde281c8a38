//! SSH credential preparation.
//!
//! A machine either gets a freshly generated RSA keypair or a copy of a
//! caller-supplied one. Both end up next to the machine record so the host
//! runtime finds them in a single place.

use std::ffi::OsString;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::info;

use crate::command::{CommandRunner, SpawnError};

const KEYGEN_PROGRAM: &str = "ssh-keygen";

/// Errors raised while preparing key material.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SshKeyError {
    /// `ssh-keygen` could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// `ssh-keygen` exited unsuccessfully.
    #[error("ssh-keygen failed for {path}: {message}")]
    Generate {
        /// Target key path.
        path: Utf8PathBuf,
        /// Captured standard error or exit status.
        message: String,
    },
    /// A key file to import does not exist.
    #[error("ssh key {path} does not exist (check --sakuracloud-ssh-key)")]
    Missing {
        /// Missing file.
        path: Utf8PathBuf,
    },
    /// Reading, copying or protecting a key file failed.
    #[error("failed to access {path}: {message}")]
    Io {
        /// File that could not be accessed.
        path: Utf8PathBuf,
        /// Operating system error text.
        message: String,
    },
    /// The public key file exists but holds no key.
    #[error("public key {path} is empty")]
    EmptyPublicKey {
        /// Offending file.
        path: Utf8PathBuf,
    },
}

/// Capability that places a private key at a target path and returns the
/// matching public key text.
pub trait SshKeyProvider {
    /// Prepares the keypair at `private_key` (`<private_key>.pub` holds the
    /// public half).
    ///
    /// # Errors
    ///
    /// Returns [`SshKeyError`] when the key material cannot be produced.
    fn prepare(&self, private_key: &Utf8Path) -> Result<String, SshKeyError>;
}

/// Default key provider: imports `import_from` when set, otherwise runs
/// `ssh-keygen`.
#[derive(Clone, Debug)]
pub struct SshKeys<R: CommandRunner> {
    runner: R,
    import_from: Option<Utf8PathBuf>,
}

impl<R: CommandRunner> SshKeys<R> {
    /// Provider that generates a new keypair.
    #[must_use]
    pub const fn generate(runner: R) -> Self {
        Self {
            runner,
            import_from: None,
        }
    }

    /// Provider that imports an existing keypair.
    #[must_use]
    pub const fn import(runner: R, source: Utf8PathBuf) -> Self {
        Self {
            runner,
            import_from: Some(source),
        }
    }

    fn generate_into(&self, private_key: &Utf8Path) -> Result<(), SshKeyError> {
        let args: Vec<OsString> = [
            "-t",
            "rsa",
            "-b",
            "2048",
            "-N",
            "",
            "-q",
            "-f",
            private_key.as_str(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        let output = self.runner.run(KEYGEN_PROGRAM, &args)?;
        if output.is_success() {
            info!(path = %private_key, "generated ssh keypair");
            return Ok(());
        }
        let stderr = output.stderr.trim();
        let message = if stderr.is_empty() {
            format!("exit status {:?}", output.code)
        } else {
            stderr.to_owned()
        };
        Err(SshKeyError::Generate {
            path: private_key.to_path_buf(),
            message,
        })
    }
}

impl<R: CommandRunner> SshKeyProvider for SshKeys<R> {
    fn prepare(&self, private_key: &Utf8Path) -> Result<String, SshKeyError> {
        ensure_parent(private_key)?;
        match &self.import_from {
            Some(source) => {
                copy_file(source, private_key)?;
                copy_file(&public_key_path(source), &public_key_path(private_key))?;
                restrict_permissions(private_key)?;
                info!(source = %source, path = %private_key, "imported ssh keypair");
            }
            None => self.generate_into(private_key)?,
        }
        read_public_key(&public_key_path(private_key))
    }
}

/// Path of the public half of a keypair.
#[must_use]
pub fn public_key_path(private_key: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{private_key}.pub"))
}

/// Checks that a keypair to import exists before any resource is created.
///
/// # Errors
///
/// Returns [`SshKeyError::Missing`] naming the first absent file.
pub fn check_importable(source: &Utf8Path) -> Result<(), SshKeyError> {
    for path in [source.to_path_buf(), public_key_path(source)] {
        if !file_exists(&path)? {
            return Err(SshKeyError::Missing { path });
        }
    }
    Ok(())
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), SshKeyError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| SshKeyError::Io {
        path: path.to_path_buf(),
        message: String::from("key path is missing a filename"),
    })?;
    Ok((parent, file_name))
}

fn open_dir(path: &Utf8Path) -> Result<Dir, SshKeyError> {
    Dir::open_ambient_dir(path, ambient_authority()).map_err(|err| SshKeyError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn ensure_parent(path: &Utf8Path) -> Result<(), SshKeyError> {
    let (parent, _) = split(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| SshKeyError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })
}

fn file_exists(path: &Utf8Path) -> Result<bool, SshKeyError> {
    let (parent, file_name) = split(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| SshKeyError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(SshKeyError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn copy_file(from: &Utf8Path, to: &Utf8Path) -> Result<(), SshKeyError> {
    if !file_exists(from)? {
        return Err(SshKeyError::Missing {
            path: from.to_path_buf(),
        });
    }
    let (from_parent, from_name) = split(from)?;
    let (to_parent, to_name) = split(to)?;
    let source_dir = open_dir(from_parent)?;
    let target_dir = open_dir(to_parent)?;
    source_dir
        .copy(from_name, &target_dir, to_name)
        .map(|_| ())
        .map_err(|err| SshKeyError::Io {
            path: to.to_path_buf(),
            message: err.to_string(),
        })
}

#[cfg(unix)]
fn restrict_permissions(path: &Utf8Path) -> Result<(), SshKeyError> {
    use std::os::unix::fs::PermissionsExt;

    let (parent, file_name) = split(path)?;
    let dir = open_dir(parent)?;
    let permissions = cap_std::fs::Permissions::from_std(std::fs::Permissions::from_mode(0o600));
    dir.set_permissions(file_name, permissions)
        .map_err(|err| SshKeyError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Utf8Path) -> Result<(), SshKeyError> {
    Ok(())
}

fn read_public_key(path: &Utf8Path) -> Result<String, SshKeyError> {
    let (parent, file_name) = split(path)?;
    let contents = open_dir(parent)?
        .read_to_string(file_name)
        .map_err(|err| SshKeyError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let key = contents.trim();
    if key.is_empty() {
        return Err(SshKeyError::EmptyPublicKey {
            path: path.to_path_buf(),
        });
    }
    Ok(key.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRunner;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const PUBLIC_KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ test@example";

    struct KeyDir {
        _tmp: TempDir,
        root: Utf8PathBuf,
    }

    #[fixture]
    fn key_dir() -> KeyDir {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
        KeyDir { _tmp: tmp, root }
    }

    fn write(path: &Utf8Path, contents: &str) {
        std::fs::write(path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
    }

    #[rstest]
    fn generate_runs_ssh_keygen_and_reads_public_key(key_dir: KeyDir) {
        let target = key_dir.root.join("machines/web/id_rsa");
        let runner = ScriptedRunner::new();
        runner.push_success();
        std::fs::create_dir_all(key_dir.root.join("machines/web"))
            .unwrap_or_else(|err| panic!("mkdir: {err}"));
        write(&public_key_path(&target), &format!("{PUBLIC_KEY}\n"));

        let key = SshKeys::generate(runner.clone())
            .prepare(&target)
            .unwrap_or_else(|err| panic!("prepare: {err}"));

        assert_eq!(key, PUBLIC_KEY);
        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(
            invocations[0].command_string(),
            format!("ssh-keygen -t rsa -b 2048 -N  -q -f {target}")
        );
    }

    #[rstest]
    fn generate_surfaces_keygen_failure(key_dir: KeyDir) {
        let target = key_dir.root.join("id_rsa");
        let runner = ScriptedRunner::new();
        runner.push_failure(1, "Saving key failed");

        let err = SshKeys::generate(runner)
            .prepare(&target)
            .expect_err("keygen failure should surface");

        assert_eq!(
            err,
            SshKeyError::Generate {
                path: target,
                message: "Saving key failed".to_owned(),
            }
        );
    }

    #[rstest]
    fn import_copies_both_halves(key_dir: KeyDir) {
        let source = key_dir.root.join("imported");
        write(&source, "PRIVATE");
        write(&public_key_path(&source), PUBLIC_KEY);
        let target = key_dir.root.join("machine/id_rsa");

        let key = SshKeys::import(ScriptedRunner::new(), source)
            .prepare(&target)
            .unwrap_or_else(|err| panic!("prepare: {err}"));

        assert_eq!(key, PUBLIC_KEY);
        let private = std::fs::read_to_string(&target).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(private, "PRIVATE");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target)
                .unwrap_or_else(|err| panic!("metadata: {err}"))
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[rstest]
    fn import_check_reports_missing_public_key(key_dir: KeyDir) {
        let source = key_dir.root.join("lonely");
        write(&source, "PRIVATE");

        let err = check_importable(&source).expect_err("public half is missing");

        assert_eq!(
            err,
            SshKeyError::Missing {
                path: public_key_path(&source)
            }
        );
    }
}
