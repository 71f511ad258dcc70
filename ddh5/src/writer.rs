//! The writer session: a long-lived handle tying a measurement run to one
//! container file.
//!
//! A [`Ddh5Writer`] owns the run's record collection and its container.
//! On open it allocates a fresh, day-bucketed run directory, initializes
//! the group, and writes any initial data; afterwards every
//! [`Ddh5Writer::add_data`] call merges a row batch and persists exactly
//! the increment. Closing the session stamps a close timestamp — via
//! [`Ddh5Writer::close`] for error-checked shutdown, or best-effort on
//! drop so the stamp also lands on panic and early-return paths.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::append::{AppendMode, write_datadict};
use crate::container::{Container, ensure_parent_dirs, stamp_attrs};
use crate::datadict::DataDict;
use crate::error::{Result, WriterError};

/// Group that writer sessions store their data under.
pub const DEFAULT_GROUP: &str = "data";

/// Render format for day-bucket directory names.
const DAY_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

/// Today's date as a day-bucket name.
fn day_stamp() -> String {
    time::OffsetDateTime::now_utc()
        .date()
        .format(DAY_FORMAT)
        .unwrap_or_default()
}

/// Allocates the container path for a new run.
///
/// Runs are bucketed per UTC day as
/// `<basedir>/<day>/<day>_<NNNN>[_<name>]/<same>.ddh5`, where `NNNN` is one
/// past the highest index already present in the day folder (`0001` for the
/// first run). Entries whose names do not carry a parseable index are
/// ignored.
fn next_run_path(basedir: &Path, name: Option<&str>) -> Result<PathBuf> {
    let day = day_stamp();
    let day_dir = basedir.join(&day);
    let prefix = format!("{day}_");

    let mut max_idx = 0u32;
    if day_dir.is_dir() {
        let entries = fs::read_dir(&day_dir).map_err(|e| WriterError::BaseDirAccess {
            path: day_dir.clone(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| WriterError::BaseDirAccess {
                path: day_dir.clone(),
                source: e,
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(rest) = file_name.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(digits) = rest.get(..4)
                && let Ok(idx) = digits.parse::<u32>()
            {
                max_idx = max_idx.max(idx);
            }
        }
    }

    let idx = max_idx + 1;
    let folder = match name {
        Some(name) => format!("{day}_{idx:04}_{name}"),
        None => format!("{day}_{idx:04}"),
    };
    Ok(day_dir.join(&folder).join(format!("{folder}.ddh5")))
}

/// A writer session for streaming a measurement run into one container.
#[derive(Debug)]
pub struct Ddh5Writer {
    datadict: DataDict,
    container: Container,
    filepath: PathBuf,
    group: String,
    inserted_rows: usize,
    closed: bool,
}

impl Ddh5Writer {
    /// Opens a session under the default group (`data`).
    ///
    /// # Errors
    ///
    /// See [`Ddh5Writer::open_in_group`].
    pub fn open<P: AsRef<Path>>(
        datadict: DataDict,
        basedir: P,
        name: Option<&str>,
    ) -> Result<Self> {
        Self::open_in_group(datadict, basedir, DEFAULT_GROUP, name)
    }

    /// Opens a session, allocating a fresh run directory under `basedir`.
    ///
    /// The collection defines the run's structure and must have at least
    /// one field; it is validated up front. A `name` is recorded as the
    /// `dataset.name` collection metadata and suffixed to the run
    /// directory. Any rows already in the collection are written
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::EmptyStructure`] for a field-less collection,
    /// [`WriterError::BaseDirAccess`] if the run directory cannot be
    /// allocated, and container/append errors from the initial write.
    pub fn open_in_group<P: AsRef<Path>>(
        mut datadict: DataDict,
        basedir: P,
        group: &str,
        name: Option<&str>,
    ) -> Result<Self> {
        if datadict.is_empty() {
            return Err(WriterError::EmptyStructure.into());
        }
        datadict.validate()?;
        if let Some(name) = name {
            datadict.add_meta("dataset.name", json!(name));
        }

        let filepath = next_run_path(basedir.as_ref(), name)?;
        ensure_parent_dirs(&filepath)?;

        let mut container = Container::open_append(&filepath)?;
        container.init_group(group)?;

        let mut session = Self {
            datadict,
            container,
            filepath,
            group: group.to_string(),
            inserted_rows: 0,
            closed: false,
        };
        session.stamp_last_change()?;

        if session.datadict.nrows() > 0 {
            write_datadict(
                &mut session.container,
                &session.datadict,
                &session.group,
                AppendMode::Overwrite,
                true,
            )?;
            session.inserted_rows = session.datadict.nrows();
        }

        tracing::info!(path = %session.filepath.display(), "data will be saved here");
        Ok(session)
    }

    /// Merges one batch of rows and persists the increment.
    ///
    /// The batch contract is that of [`DataDict::add_data`]: one entry per
    /// field, equal row counts. The first persisted batch creates the
    /// datasets; later batches append only the new rows. While the
    /// collection holds no rows the file is left untouched, so the first
    /// non-empty batch is still the one that creates the datasets.
    ///
    /// # Errors
    ///
    /// Validation errors leave both the collection and the file unchanged;
    /// container errors may leave the collection ahead of the file, which
    /// the next successful call reconciles.
    pub fn add_data(&mut self, batch: &[(&str, &[f64])]) -> Result<()> {
        self.datadict.add_data(batch)?;

        if self.datadict.nrows() > 0 {
            let mode = if self.inserted_rows > 0 {
                AppendMode::AppendNew
            } else {
                AppendMode::Overwrite
            };
            write_datadict(&mut self.container, &self.datadict, &self.group, mode, true)?;
            self.inserted_rows = self.datadict.nrows();
        }

        self.stamp_last_change()
    }

    /// Stamps `last_change` timestamps on the container and the group.
    fn stamp_last_change(&mut self) -> Result<()> {
        self.container.set_container_attrs(stamp_attrs("last_change"))?;
        self.container
            .set_group_attrs(&self.group, stamp_attrs("last_change"))?;
        self.container.flush()
    }

    /// Closes the session, stamping close timestamps.
    ///
    /// Dropping the session performs the same sequence best-effort; call
    /// this to observe failures instead of a warning log.
    ///
    /// # Errors
    ///
    /// Propagates the final attribute writes and flush.
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.container.set_container_attrs(stamp_attrs("close"))?;
        self.container
            .set_group_attrs(&self.group, stamp_attrs("close"))?;
        self.container.flush()
    }

    /// The container file this session writes to.
    pub fn file_path(&self) -> &Path {
        &self.filepath
    }

    /// Rows persisted so far.
    pub fn inserted_rows(&self) -> usize {
        self.inserted_rows
    }

    /// The session's record collection.
    pub fn data(&self) -> &DataDict {
        &self.datadict
    }
}

impl Drop for Ddh5Writer {
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            tracing::warn!(
                path = %self.filepath.display(),
                error = %err,
                "failed to stamp close timestamp"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerReader;
    use crate::datadict::DataField;
    use crate::read::{ReadOptions, datadict_from_ddh5};
    use tempfile::tempdir;

    fn structure() -> DataDict {
        let mut dd = DataDict::new();
        dd.insert_field("x", DataField::independent());
        dd.insert_field("y", DataField::dependent(["x"]).with_unit("V"));
        dd
    }

    #[test]
    fn test_run_directories_are_day_bucketed_and_numbered() {
        let dir = tempdir().unwrap();
        let day = day_stamp();

        let first = Ddh5Writer::open(structure(), dir.path(), None).unwrap();
        let expected = dir
            .path()
            .join(&day)
            .join(format!("{day}_0001"))
            .join(format!("{day}_0001.ddh5"));
        assert_eq!(first.file_path(), expected);

        let second = Ddh5Writer::open(structure(), dir.path(), Some("rabi")).unwrap();
        assert!(
            second
                .file_path()
                .to_string_lossy()
                .contains(&format!("{day}_0002_rabi"))
        );

        first.close().unwrap();
        second.close().unwrap();
    }

    #[test]
    fn test_unparseable_run_entries_are_ignored() {
        let dir = tempdir().unwrap();
        let day = day_stamp();
        fs::create_dir_all(dir.path().join(&day).join(format!("{day}_junk"))).unwrap();
        fs::create_dir_all(dir.path().join(&day).join("notes")).unwrap();

        let writer = Ddh5Writer::open(structure(), dir.path(), None).unwrap();
        assert!(
            writer
                .file_path()
                .to_string_lossy()
                .contains(&format!("{day}_0001"))
        );
    }

    #[test]
    fn test_add_data_streams_increments() {
        let dir = tempdir().unwrap();
        let mut writer = Ddh5Writer::open(structure(), dir.path(), Some("sweep")).unwrap();
        assert_eq!(writer.inserted_rows(), 0);

        writer.add_data(&[("x", &[0.0]), ("y", &[0.0])]).unwrap();
        writer
            .add_data(&[("x", &[1.0, 2.0]), ("y", &[1.0, 4.0])])
            .unwrap();
        assert_eq!(writer.inserted_rows(), 3);

        let path = writer.file_path().to_path_buf();
        writer.close().unwrap();

        let back = datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
        assert_eq!(back.field("y").unwrap().values(), &[0.0, 1.0, 4.0]);
        assert_eq!(back.get_meta("dataset.name"), Some(&serde_json::json!("sweep")));
    }

    #[test]
    fn test_zero_row_batches_leave_the_file_untouched() {
        let dir = tempdir().unwrap();
        let mut writer = Ddh5Writer::open(structure(), dir.path(), None).unwrap();

        // An empty batch is valid input but must not create the datasets:
        // zero-row datasets would demote the first real batch to the
        // no-op Overwrite arm and its rows would never reach disk.
        writer.add_data(&[("x", &[]), ("y", &[])]).unwrap();
        assert_eq!(writer.inserted_rows(), 0);

        writer
            .add_data(&[("x", &[0.0, 1.0]), ("y", &[1.0, 4.0])])
            .unwrap();
        assert_eq!(writer.inserted_rows(), 2);

        let path = writer.file_path().to_path_buf();
        writer.close().unwrap();

        let back = datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
        assert_eq!(back.nrows(), 2);
        assert_eq!(back.field("y").unwrap().values(), &[1.0, 4.0]);
    }

    #[test]
    fn test_initial_rows_are_written_at_open() {
        let dir = tempdir().unwrap();
        let mut dd = structure();
        dd.add_data(&[("x", &[0.0, 1.0]), ("y", &[0.0, 1.0])]).unwrap();

        let writer = Ddh5Writer::open(dd, dir.path(), None).unwrap();
        assert_eq!(writer.inserted_rows(), 2);
        let path = writer.file_path().to_path_buf();
        writer.close().unwrap();

        let back = datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
        assert_eq!(back.nrows(), 2);
    }

    #[test]
    fn test_close_stamp_lands_on_drop_too() {
        let dir = tempdir().unwrap();
        let path;
        {
            let mut writer = Ddh5Writer::open(structure(), dir.path(), None).unwrap();
            writer.add_data(&[("x", &[0.0]), ("y", &[0.0])]).unwrap();
            path = writer.file_path().to_path_buf();
            // No close(): the drop fallback must stamp.
        }

        let reader = ContainerReader::open(&path).unwrap();
        let has_close = |attrs: &[(String, crate::attr::AttrValue)]| {
            attrs.iter().any(|(k, _)| k == "__close_time_sec__")
        };
        assert!(has_close(&reader.index().attrs));
        assert!(has_close(&reader.index().group("data").unwrap().attrs));
    }

    #[test]
    fn test_empty_structure_is_rejected() {
        let dir = tempdir().unwrap();
        let err = Ddh5Writer::open(DataDict::new(), dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("no fields"));
    }
}
