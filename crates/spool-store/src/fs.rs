use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use spool_types::{AddressScheme, Envelope, StorageAddress};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{EnvelopeStore, StoredEnvelope};

/// Suffix of in-progress writes; such files are hidden and never listed.
const TEMP_SUFFIX: &str = ".tmp";

/// Outcome of a full directory scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Records that deserialized cleanly, oldest first.
    pub loaded: Vec<StoredEnvelope>,
    /// Records that failed to deserialize and were deleted.
    pub healed: Vec<StorageAddress>,
    /// Entries left alone: subdirectories, foreign names, unreadable files.
    pub skipped: Vec<String>,
}

/// Flat-directory envelope store.
///
/// Each envelope lives in `<root>/<address>`. Writes go to a hidden temp file
/// in the same directory and are renamed into place, so a concurrent remover
/// or reader only ever sees a whole record or no record.
#[derive(Clone, Debug)]
pub struct FilesystemStore {
    root: PathBuf,
    scheme: AddressScheme,
}

impl FilesystemStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Temp files left behind by an interrupted write are removed.
    pub fn open(root: impl Into<PathBuf>, scheme: AddressScheme) -> StoreResult<Self> {
        let store = Self {
            root: root.into(),
            scheme,
        };
        ensure_dir(&store.root)?;
        let swept = store.sweep_temp_files()?;

        info!(
            root = %store.root.display(),
            ?scheme,
            swept,
            "envelope store opened"
        );
        Ok(store)
    }

    /// Open an existing directory without creating or sweeping it.
    pub fn inspect(root: impl Into<PathBuf>, scheme: AddressScheme) -> StoreResult<Self> {
        let root = root.into();
        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => Ok(Self { root, scheme }),
            Ok(_) => Err(StoreError::NotADirectory(root)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::Missing(root)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    /// Path of the file holding `address`.
    pub fn path_for(&self, address: &StorageAddress) -> PathBuf {
        self.root.join(address.as_str())
    }

    /// Read one record without healing it.
    ///
    /// Returns `Ok(None)` if nothing is stored at `address` and
    /// [`StoreError::Corrupt`] if the file does not decode.
    pub fn load(&self, address: &StorageAddress) -> StoreResult<Option<Envelope>> {
        let bytes = match fs::read(self.path_for(address)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Envelope::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                address: address.clone(),
                reason: e.to_string(),
            })
    }

    /// Addressable records, oldest first, without reading or healing them.
    pub fn addresses(&self) -> StoreResult<Vec<StorageAddress>> {
        Ok(self.index()?.0)
    }

    /// Load every record, deleting the ones that do not deserialize.
    pub fn scan(&self) -> StoreResult<ScanReport> {
        let (addresses, skipped) = self.index()?;
        let mut report = ScanReport {
            skipped,
            ..ScanReport::default()
        };

        for address in addresses {
            let path = self.path_for(&address);
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // Removed between listing and reading.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(address = %address, error = %e, "cannot read envelope; skipping");
                    report.skipped.push(address.to_string());
                    continue;
                }
            };

            match Envelope::from_bytes(&bytes) {
                Ok(envelope) => report.loaded.push(StoredEnvelope { address, envelope }),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "cannot deserialize envelope; deleting"
                    );
                    if let Err(e) = remove_if_present(&path) {
                        warn!(path = %path.display(), error = %e, "failed to delete corrupt envelope");
                    }
                    report.healed.push(address);
                }
            }
        }

        debug!(
            loaded = report.loaded.len(),
            healed = report.healed.len(),
            skipped = report.skipped.len(),
            "envelope scan complete"
        );
        Ok(report)
    }

    /// Total size in bytes of all addressable files.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        ensure_dir(&self.root)?;
        let mut total = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let addressable = name
                .to_str()
                .is_some_and(|name| StorageAddress::parse(name).is_ok());
            let meta = entry.metadata()?;
            if addressable && meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }

    /// Sorted addresses plus the names of entries that are not records.
    fn index(&self) -> StoreResult<(Vec<StorageAddress>, Vec<String>)> {
        ensure_dir(&self.root)?;
        let mut skipped = Vec::new();
        let mut candidates: Vec<(SystemTime, StorageAddress)> = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if !entry.file_type()?.is_file() {
                debug!(name = %name, "skipping non-file entry");
                skipped.push(name);
                continue;
            }
            let Ok(address) = StorageAddress::parse(&name) else {
                warn!(name = %name, "skipping file with a foreign name");
                skipped.push(name);
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            candidates.push((modified, address));
        }

        candidates.sort();
        let addresses = candidates.into_iter().map(|(_, address)| address).collect();
        Ok((addresses, skipped))
    }

    fn temp_path(&self, address: &StorageAddress) -> PathBuf {
        self.root
            .join(format!(".{}.{}{TEMP_SUFFIX}", address, Uuid::now_v7().simple()))
    }

    fn sweep_temp_files(&self) -> StoreResult<usize> {
        let mut swept = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && name.ends_with(TEMP_SUFFIX) && entry.file_type()?.is_file() {
                if remove_if_present(&entry.path())? {
                    swept += 1;
                }
            }
        }
        Ok(swept)
    }
}

impl EnvelopeStore for FilesystemStore {
    fn address_of(&self, envelope: &Envelope) -> StoreResult<StorageAddress> {
        Ok(StorageAddress::derive(envelope, self.scheme)?)
    }

    fn save(&self, envelope: &Envelope) -> StoreResult<StorageAddress> {
        let bytes = envelope.to_bytes()?;
        let address = match self.scheme {
            AddressScheme::ContentHash => StorageAddress::from_content(&bytes),
            AddressScheme::EventId => StorageAddress::derive(envelope, self.scheme)?,
        };

        ensure_dir(&self.root)?;
        let temp = self.temp_path(&address);
        if let Err(e) = write_then_rename(&temp, &self.path_for(&address), &bytes) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(address = %address, bytes = bytes.len(), "saved envelope");
        Ok(address)
    }

    fn remove_address(&self, address: &StorageAddress) -> StoreResult<bool> {
        let removed = remove_if_present(&self.path_for(address))?;
        if removed {
            debug!(address = %address, "removed envelope");
        }
        Ok(removed)
    }

    fn list(&self) -> StoreResult<Vec<StoredEnvelope>> {
        Ok(self.scan()?.loaded)
    }
}

fn ensure_dir(path: &Path) -> StoreResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StoreError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn write_then_rename(temp: &Path, dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, dest)
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
