//! Address bar persisted to a text file through `cap_std`.
//!
//! Writes go to a hidden temporary file in the same directory which is then
//! renamed over the target, so a reader never sees a half-written address.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use cap_std::fs::{Dir, OpenOptions};
use cap_std::ambient_authority;
use tracing::debug;
use url::Url;

use crate::domain::ports::{AddressBar, AddressBarError};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Address bar stored as a single URL line in a file.
pub struct FileAddressBar {
    dir: Dir,
    file_name: String,
    initial: Url,
    write_lock: Mutex<()>,
}

impl FileAddressBar {
    /// Open the file at `path`; until it is first written, the location is
    /// `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressBarError::Io`] when the parent directory cannot be
    /// opened or `path` does not name a file.
    pub fn open(path: &Path, initial: Url) -> Result<Self, AddressBarError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                AddressBarError::io(format!("{} does not name a UTF-8 file", path.display()))
            })?
            .to_owned();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|error| {
            AddressBarError::io(format!("failed to open {}: {error}", parent.display()))
        })?;
        Ok(Self {
            dir,
            file_name,
            initial,
            write_lock: Mutex::new(()),
        })
    }

    fn write_atomic(&self, contents: &str) -> io::Result<()> {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(".{}.tmp.{}.{counter}", self.file_name, std::process::id());
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        let written = self.dir.open_with(&tmp_name, &options).and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        });
        if let Err(error) = written {
            drop(self.dir.remove_file(&tmp_name));
            return Err(error);
        }
        self.dir
            .rename(&tmp_name, &self.dir, &self.file_name)
            .inspect_err(|_| drop(self.dir.remove_file(&tmp_name)))
    }
}

impl AddressBar for FileAddressBar {
    fn location(&self) -> Result<Url, AddressBarError> {
        let raw = match self.dir.read_to_string(&self.file_name) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(self.initial.clone());
            }
            Err(error) => {
                return Err(AddressBarError::io(format!(
                    "failed to read {}: {error}",
                    self.file_name
                )));
            }
        };
        Url::parse(raw.trim()).map_err(|error| {
            AddressBarError::invalid_location(format!("{}: {error}", raw.trim()))
        })
    }

    fn replace(&self, location: &Url) -> Result<(), AddressBarError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_atomic(&format!("{location}\n")).map_err(|error| {
            AddressBarError::io(format!("failed to write {}: {error}", self.file_name))
        })?;
        debug!(file = %self.file_name, location = %location, "address persisted");
        Ok(())
    }
}
