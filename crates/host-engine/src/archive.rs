use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archiver exited with status {0}")]
    Failed(String),
    #[error("archive was not produced at {0}")]
    Missing(PathBuf),
}

/// Packs the contents of a directory into a single archive file.
pub trait Archiver {
    fn archive(&mut self, source_dir: &Path, destination: &Path) -> Result<(), ArchiveError>;
}

/// Zips a directory with the platform's archiving tool.
///
/// Uses `ditto` on macOS and `zip` elsewhere. `LAYERKIT_ZIP_BIN` overrides the
/// program; it is invoked with the same arguments as `zip`.
#[derive(Debug, Default)]
pub struct SystemZipArchiver {
    program: Option<OsString>,
}

impl SystemZipArchiver {
    pub fn new() -> Self {
        Self { program: std::env::var_os("LAYERKIT_ZIP_BIN") }
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self { program: Some(program.into()) }
    }

    fn command(&self, source_dir: &Path, destination: &Path) -> Command {
        match &self.program {
            Some(program) => zip_command(program, source_dir, destination),
            None if cfg!(target_os = "macos") => {
                let mut command = Command::new("ditto");
                command.arg("-ck").arg("--sequesterRsrc").arg(source_dir).arg(destination);
                command
            }
            None => zip_command(&OsString::from("zip"), source_dir, destination),
        }
    }
}

fn zip_command(program: &OsString, source_dir: &Path, destination: &Path) -> Command {
    let mut command = Command::new(program);
    command.current_dir(source_dir).arg("-r").arg("-q").arg(destination).arg(".");
    command
}

impl Archiver for SystemZipArchiver {
    fn archive(&mut self, source_dir: &Path, destination: &Path) -> Result<(), ArchiveError> {
        // The zip tool resolves the destination against its working directory.
        let destination = if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            std::env::current_dir()?.join(destination)
        };

        let status = self.command(source_dir, &destination).status()?;
        if !status.success() {
            return Err(ArchiveError::Failed(status.to_string()));
        }

        if !destination.exists() {
            return Err(ArchiveError::Missing(destination));
        }

        Ok(())
    }
}
