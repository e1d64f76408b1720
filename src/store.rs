use crate::error::{Error, Result};
use crate::record::{NewSighting, Sighting};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, error, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only CSV ledger of raw sightings.
///
/// Columns: `id, date_observed, time_observed, latitude, longitude, common_name`.
/// Rows are never rewritten; the only mutation is [`SightingStore::append`].
/// Callers sharing a store between threads must serialise `append`, see
/// [`crate::fieldlog::FieldLog`].
pub struct SightingStore {
    path: PathBuf,
}

impl SightingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row in file order.
    ///
    /// Returns `Ok(None)` when the ledger does not exist yet and
    /// [`Error::MalformedStore`] when any row fails to parse.
    pub fn load(&self) -> Result<Option<Vec<Sighting>>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = ReaderBuilder::new().from_reader(file);
        let mut sightings = Vec::new();
        for row in reader.deserialize() {
            let sighting: Sighting = row.map_err(|source| Error::MalformedStore {
                path: self.path.clone(),
                source,
            })?;
            sightings.push(sighting);
        }

        debug!("Loaded {} sightings from {}", sightings.len(), self.path.display());
        Ok(Some(sightings))
    }

    /// Id the next appended row will receive: `max(id) + 1`, or 1 when the
    /// ledger is missing, empty or unreadable.
    ///
    /// An unreadable ledger restarts the counter at 1, which can collide with
    /// ids already on disk.
    pub fn next_id(&self) -> u64 {
        match self.load() {
            Ok(Some(sightings)) => sightings.iter().map(|s| s.id).max().map_or(1, |max| max + 1),
            Ok(None) => 1,
            Err(e) => {
                warn!("Could not read existing sightings, restarting ids at 1: {}", e);
                1
            }
        }
    }

    /// Assign the next id and append the row, writing the header only when
    /// the ledger is new.
    ///
    /// A ledger whose last row lacks a line terminator gets one first. If the
    /// write fails part way the file is cut back to its previous length.
    pub fn append(&self, new: NewSighting) -> Result<Sighting> {
        let sighting = new.with_id(self.next_id());

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();

        let mut bytes = Vec::new();
        if len > 0 && !ends_with_newline(&mut file)? {
            bytes.push(b'\n');
        }

        // Encode the whole row first so it goes out in a single write.
        let mut writer = WriterBuilder::new()
            .has_headers(len == 0)
            .from_writer(bytes);
        writer.serialize(&sighting)?;
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;

        write_or_rollback(&file, &file, &bytes)?;

        info!(
            "Recorded sighting {} of {} at ({}, {})",
            sighting.id, sighting.common_name, sighting.latitude, sighting.longitude
        );
        Ok(sighting)
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Write `bytes` through `sink` and flush. On failure `file` is truncated to
/// the length it had before the write.
fn write_or_rollback(file: &File, mut sink: impl Write, bytes: &[u8]) -> std::io::Result<()> {
    let previous_len = file.metadata()?.len();
    if let Err(e) = sink.write_all(bytes).and_then(|_| sink.flush()) {
        if let Err(truncate) = file.set_len(previous_len) {
            error!("Could not roll back partial write: {}", truncate);
        }
        return Err(e);
    }
    Ok(())
}
