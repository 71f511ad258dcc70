//! The `.ddh5` on-disk container format.
//!
//! A container is a single file holding any number of named groups, each
//! group holding one resizable dataset per field plus attributes. On disk
//! the container is a log of framed records:
//!
//! ```text
//! [0..16)   Header: magic "DDH5", format version, flags, reserved
//! [16..)    Frames, each: len | kind | payload | trailer (= !len)
//! ```
//!
//! Control frames (kind 1) carry JSON-encoded structural records: container
//! and group attributes, group initialization, and dataset creation. Data
//! frames (kind 2) carry raw little-endian `f64` sample rows for one
//! dataset. Group and dataset state is reconstructed by replaying the log.
//!
//! The trailer is a commit marker. A frame is only considered present when
//! it is complete and its trailer matches, so a reader that races an
//! in-progress writer simply observes the log prefix up to the last
//! committed frame — this is what makes concurrent reads safe without any
//! locking. A writer reopening a container truncates a torn tail before
//! appending (single-writer discipline).
//!
//! Since datasets only ever gain rows and committed frames are never moved
//! or rewritten, any row a reader has observed stays valid forever.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::attr::AttrValue;
use crate::error::{AppendError, ContainerError, Result};

/// File extension of a container, without the leading dot.
pub const DATAFILE_EXT: &str = "ddh5";

/// Render format for the human-readable half of timestamp attributes.
const TIMESTR_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Magic bytes identifying a ddh5 container.
const MAGIC: [u8; 4] = *b"DDH5";

/// Current container format version.
const VERSION: u32 = 1;

/// Size of the container header in bytes.
const HEADER_SIZE: usize = 16;

/// Frame kind for JSON control records.
const KIND_CONTROL: u32 = 1;

/// Frame kind for raw sample data.
const KIND_DATA: u32 = 2;

/// Bytes per stored sample.
const SAMPLE_SIZE: usize = 8;

/// Normalizes a user-supplied path to a container file path.
///
/// If the input already carries the `.ddh5` extension it is used as-is;
/// otherwise the extension is appended. Every entry point accepting a path
/// goes through this.
pub fn resolve_path<P: AsRef<Path>>(base: P) -> PathBuf {
    let base = base.as_ref();
    if base.extension().is_some_and(|ext| ext == DATAFILE_EXT) {
        base.to_path_buf()
    } else {
        let mut full = base.as_os_str().to_os_string();
        full.push(".");
        full.push(DATAFILE_EXT);
        PathBuf::from(full)
    }
}

/// Creates the directory tree containing `filepath`, if absent. Idempotent.
///
/// # Errors
///
/// Returns [`ContainerError::Io`] if directory creation fails.
pub fn ensure_parent_dirs(filepath: &Path) -> Result<()> {
    if let Some(parent) = filepath.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| ContainerError::Io {
            path: filepath.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Current time as (unix seconds, rendered string).
pub(crate) fn now_stamp() -> (i64, String) {
    let now = time::OffsetDateTime::now_utc();
    let rendered = now.format(TIMESTR_FORMAT).unwrap_or_default();
    (now.unix_timestamp(), rendered)
}

/// Builds the pair of timestamp attributes for an event such as `creation`,
/// `last_change`, or `close`: `__<name>_time_sec__` and `__<name>_time_str__`.
pub(crate) fn stamp_attrs(name: &str) -> Vec<(String, AttrValue)> {
    let (sec, rendered) = now_stamp();
    vec![
        (format!("__{name}_time_sec__"), AttrValue::Int(sec)),
        (format!("__{name}_time_str__"), AttrValue::Str(rendered)),
    ]
}

/// Structural records carried by control frames.
#[derive(Debug, Serialize, Deserialize)]
enum ControlRecord {
    /// Upsert container-level attributes.
    ContainerMeta {
        attrs: Vec<(String, AttrValue)>,
    },
    /// Create the named group, deleting any previous group of that name.
    GroupInit {
        name: String,
    },
    /// Upsert attributes on a group.
    GroupMeta {
        group: String,
        attrs: Vec<(String, AttrValue)>,
    },
    /// Create a dataset within a group.
    FieldCreate {
        group: String,
        field: String,
        row_shape: Vec<usize>,
        unit: Option<String>,
        axes: Vec<String>,
        attrs: Vec<(String, AttrValue)>,
    },
}

/// One committed run of sample rows within the file.
#[derive(Debug, Clone, Copy)]
struct DataChunk {
    /// Byte offset of the first sample within the file.
    offset: usize,
    /// Number of rows in the chunk.
    nrows: usize,
}

/// Replayed state of one dataset.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    /// Dataset (field) name.
    pub name: String,
    /// Fixed dimensions beyond the row dimension.
    pub row_shape: Vec<usize>,
    /// `unit` attribute, if present.
    pub unit: Option<String>,
    /// `axes` attribute; empty for independent fields.
    pub axes: Vec<String>,
    /// Remaining dataset attributes (timestamps, field metadata).
    pub attrs: Vec<(String, AttrValue)>,
    /// Total committed rows.
    pub nrows: usize,
    /// Committed sample runs, in append order.
    chunks: Vec<DataChunk>,
}

impl FieldIndex {
    /// Samples per row.
    pub fn row_size(&self) -> usize {
        self.row_shape.iter().product::<usize>().max(1)
    }

    /// Full on-disk shape: committed rows followed by the inner dimensions.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(1 + self.row_shape.len());
        shape.push(self.nrows);
        shape.extend_from_slice(&self.row_shape);
        shape
    }
}

/// Replayed state of one group.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    /// Group name, unique within the container.
    pub name: String,
    /// Group attributes (timestamps plus collection metadata).
    pub attrs: Vec<(String, AttrValue)>,
    /// Datasets in creation order.
    pub fields: Vec<FieldIndex>,
}

impl GroupIndex {
    /// Looks up a dataset by name.
    pub fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut FieldIndex> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

/// Replayed state of a whole container.
#[derive(Debug, Clone, Default)]
pub struct ContainerIndex {
    /// Container-level attributes.
    pub attrs: Vec<(String, AttrValue)>,
    /// Groups in creation order.
    pub groups: Vec<GroupIndex>,
}

impl ContainerIndex {
    /// Looks up a group by name.
    pub fn group(&self, name: &str) -> Option<&GroupIndex> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut GroupIndex> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Applies a control record to the index.
    fn apply(&mut self, record: ControlRecord, path: &Path) -> Result<()> {
        match record {
            ControlRecord::ContainerMeta { attrs } => {
                upsert_attrs(&mut self.attrs, attrs);
            }
            ControlRecord::GroupInit { name } => {
                self.groups.retain(|g| g.name != name);
                self.groups.push(GroupIndex {
                    name,
                    ..GroupIndex::default()
                });
            }
            ControlRecord::GroupMeta { group, attrs } => {
                let group_state =
                    self.group_mut(&group)
                        .ok_or_else(|| ContainerError::Corrupted {
                            path: path.to_path_buf(),
                            reason: format!("attributes for unknown group '{group}'"),
                        })?;
                upsert_attrs(&mut group_state.attrs, attrs);
            }
            ControlRecord::FieldCreate {
                group,
                field,
                row_shape,
                unit,
                axes,
                attrs,
            } => {
                let group_state =
                    self.group_mut(&group)
                        .ok_or_else(|| ContainerError::Corrupted {
                            path: path.to_path_buf(),
                            reason: format!("dataset in unknown group '{group}'"),
                        })?;
                if group_state.field(&field).is_some() {
                    return Err(ContainerError::Corrupted {
                        path: path.to_path_buf(),
                        reason: format!("duplicate dataset '{field}' in group '{group}'"),
                    }
                    .into());
                }
                group_state.fields.push(FieldIndex {
                    name: field,
                    row_shape,
                    unit,
                    axes,
                    attrs,
                    nrows: 0,
                    chunks: Vec::new(),
                });
            }
        }
        Ok(())
    }
}

/// Upserts `new` into `attrs`, latest value per key winning.
fn upsert_attrs(attrs: &mut Vec<(String, AttrValue)>, new: Vec<(String, AttrValue)>) {
    for (key, value) in new {
        match attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => attrs.push((key, value)),
        }
    }
}

/// Replays the frame log in `buf`, returning the reconstructed index and
/// the byte length of the valid prefix.
///
/// Replay stops at the first incomplete or uncommitted frame; a torn tail
/// is normal while a writer is active and simply shortens the snapshot.
fn replay(buf: &[u8], path: &Path) -> Result<(ContainerIndex, usize)> {
    if buf.len() < HEADER_SIZE {
        return Err(ContainerError::TruncatedHeader {
            path: path.to_path_buf(),
            len: buf.len() as u64,
        }
        .into());
    }

    if buf[0..4] != MAGIC {
        return Err(ContainerError::Corrupted {
            path: path.to_path_buf(),
            reason: format!("invalid magic bytes: expected {MAGIC:?}, found {:?}", &buf[0..4]),
        }
        .into());
    }

    let version = read_u32(buf, 4);
    if version != VERSION {
        return Err(ContainerError::Corrupted {
            path: path.to_path_buf(),
            reason: format!("unsupported format version: expected {VERSION}, found {version}"),
        }
        .into());
    }

    let mut index = ContainerIndex::default();
    let mut pos = HEADER_SIZE;

    loop {
        if buf.len() - pos < 8 {
            break;
        }
        let len_word = read_u32(buf, pos);
        let len = len_word as usize;
        let kind = read_u32(buf, pos + 4);
        let frame_end = pos + 8 + len + 4;
        if frame_end > buf.len() {
            break;
        }
        let trailer = read_u32(buf, pos + 8 + len);
        if trailer != !len_word {
            break;
        }

        let payload_offset = pos + 8;
        let payload = &buf[payload_offset..payload_offset + len];

        match kind {
            KIND_CONTROL => {
                let record: ControlRecord =
                    serde_json::from_slice(payload).map_err(|e| ContainerError::Corrupted {
                        path: path.to_path_buf(),
                        reason: format!("undecodable control record: {e}"),
                    })?;
                index.apply(record, path)?;
            }
            KIND_DATA => {
                apply_data_frame(&mut index, payload, payload_offset, path)?;
            }
            other => {
                return Err(ContainerError::Corrupted {
                    path: path.to_path_buf(),
                    reason: format!("unknown frame kind {other}"),
                }
                .into());
            }
        }

        pos = frame_end;
    }

    Ok((index, pos))
}

/// Applies one committed data frame to the index.
fn apply_data_frame(
    index: &mut ContainerIndex,
    payload: &[u8],
    payload_offset: usize,
    path: &Path,
) -> Result<()> {
    let corrupted = |reason: String| -> crate::error::Ddh5Error {
        ContainerError::Corrupted {
            path: path.to_path_buf(),
            reason,
        }
        .into()
    };

    if payload.len() < 4 {
        return Err(corrupted("data frame too short".to_string()));
    }
    let group_len = read_u32(payload, 0) as usize;
    let mut cursor = 4;
    if payload.len() < cursor + group_len + 4 {
        return Err(corrupted("data frame too short".to_string()));
    }
    let group = std::str::from_utf8(&payload[cursor..cursor + group_len])
        .map_err(|e| corrupted(format!("non-UTF-8 group name: {e}")))?;
    cursor += group_len;

    let field_len = read_u32(payload, cursor) as usize;
    cursor += 4;
    if payload.len() < cursor + field_len + 4 {
        return Err(corrupted("data frame too short".to_string()));
    }
    let field = std::str::from_utf8(&payload[cursor..cursor + field_len])
        .map_err(|e| corrupted(format!("non-UTF-8 field name: {e}")))?;
    cursor += field_len;

    let nrows = read_u32(payload, cursor) as usize;
    cursor += 4;

    let group_name = group.to_string();
    let field_name = field.to_string();
    let field_state = index
        .group_mut(&group_name)
        .and_then(|g| g.field_mut(&field_name))
        .ok_or_else(|| {
            corrupted(format!(
                "data for unknown dataset '{field_name}' in group '{group_name}'"
            ))
        })?;

    let expected = nrows * field_state.row_size() * SAMPLE_SIZE;
    if payload.len() - cursor != expected {
        return Err(corrupted(format!(
            "data frame for '{field_name}' carries {} sample bytes, expected {expected}",
            payload.len() - cursor
        )));
    }

    field_state.chunks.push(DataChunk {
        offset: payload_offset + cursor,
        nrows,
    });
    field_state.nrows += nrows;
    Ok(())
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

/// Write handle for a container, opened in append mode.
///
/// Exactly one writer per container is supported at a time; readers may
/// open the same file concurrently through [`ContainerReader`].
#[derive(Debug)]
pub struct Container {
    file: File,
    path: PathBuf,
    index: ContainerIndex,
    /// Byte offset of the end of the committed log.
    end: u64,
    /// Set once the container entered concurrent-read-friendly mode.
    frozen: bool,
}

impl Container {
    /// Creates or opens a container for appending.
    ///
    /// An existing file is replayed to reconstruct group/dataset state; a
    /// torn tail left by an interrupted writer is truncated away before any
    /// new frame is appended.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError`] on I/O failure or if the existing file is
    /// corrupted.
    pub fn open_append<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io_err = |e: std::io::Error| ContainerError::Io {
            path: path.clone(),
            source: e,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        let len = file.metadata().map_err(io_err)?.len();
        if len == 0 {
            let mut header = [0u8; HEADER_SIZE];
            header[0..4].copy_from_slice(&MAGIC);
            header[4..8].copy_from_slice(&VERSION.to_le_bytes());
            file.write_all(&header).map_err(io_err)?;
            file.sync_data().map_err(|e| ContainerError::SyncFailed {
                path: path.clone(),
                source: e,
            })?;
            return Ok(Self {
                file,
                path,
                index: ContainerIndex::default(),
                end: HEADER_SIZE as u64,
                frozen: false,
            });
        }

        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        file.read_to_end(&mut buf).map_err(io_err)?;

        let (index, valid_len) = replay(&buf, &path)?;
        if (valid_len as u64) < len {
            tracing::warn!(
                path = %path.display(),
                torn_bytes = len - valid_len as u64,
                "truncating torn tail left by an interrupted writer"
            );
            file.set_len(valid_len as u64).map_err(io_err)?;
        }
        file.seek(SeekFrom::Start(valid_len as u64)).map_err(io_err)?;

        Ok(Self {
            file,
            path,
            index,
            end: valid_len as u64,
            frozen: false,
        })
    }

    /// The container file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The replayed container state.
    pub fn index(&self) -> &ContainerIndex {
        &self.index
    }

    /// Whether the container is in concurrent-read-friendly mode.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Enters concurrent-read-friendly mode.
    ///
    /// From this point on no new datasets may be created through this
    /// handle; only row appends and attribute updates are allowed. This is
    /// irreversible for the handle's lifetime.
    pub fn freeze_structure(&mut self) {
        if !self.frozen {
            tracing::debug!(path = %self.path.display(), "structure frozen for concurrent reads");
            self.frozen = true;
        }
    }

    /// Appends one committed frame, returning the payload's byte offset.
    fn write_frame(&mut self, kind: u32, payload: &[u8]) -> Result<u64> {
        #[allow(clippy::cast_possible_truncation)] // payloads are far below 4 GiB
        let len = payload.len() as u32;
        let mut frame = Vec::with_capacity(payload.len() + 12);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&kind.to_le_bytes());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&(!len).to_le_bytes());

        self.file.write_all(&frame).map_err(|e| ContainerError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        let payload_offset = self.end + 8;
        self.end += frame.len() as u64;
        Ok(payload_offset)
    }

    /// Appends a control record and applies it to the in-memory index.
    fn write_control(&mut self, record: ControlRecord) -> Result<()> {
        let payload = serde_json::to_vec(&record).map_err(|e| ContainerError::Io {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;
        self.write_frame(KIND_CONTROL, &payload)?;
        let path = self.path.clone();
        self.index.apply(record, &path)
    }

    /// Initializes a group: any existing group of that name is deleted
    /// entirely and a fresh empty group is created, stamped with a creation
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Propagates any underlying I/O failure as fatal.
    pub fn init_group(&mut self, name: &str) -> Result<()> {
        self.write_control(ControlRecord::GroupInit {
            name: name.to_string(),
        })?;
        self.set_group_attrs(name, stamp_attrs("creation"))?;
        self.flush()
    }

    /// Upserts container-level attributes.
    pub fn set_container_attrs(&mut self, attrs: Vec<(String, AttrValue)>) -> Result<()> {
        self.write_control(ControlRecord::ContainerMeta { attrs })
    }

    /// Upserts attributes on a group.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::GroupMissing`] if the group does not exist.
    pub fn set_group_attrs(
        &mut self,
        group: &str,
        attrs: Vec<(String, AttrValue)>,
    ) -> Result<()> {
        if self.index.group(group).is_none() {
            return Err(AppendError::GroupMissing {
                group: group.to_string(),
            }
            .into());
        }
        self.write_control(ControlRecord::GroupMeta {
            group: group.to_string(),
            attrs,
        })
    }

    /// Creates a dataset within a group.
    ///
    /// The dataset's inner shape, `unit`, `axes`, and attributes are fixed
    /// at creation; later appends only grow the row dimension.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::StructureFrozen`] once the container is in
    /// concurrent-read-friendly mode, or [`AppendError::GroupMissing`] if
    /// the group does not exist.
    pub fn create_field(
        &mut self,
        group: &str,
        field: &str,
        row_shape: &[usize],
        unit: Option<&str>,
        axes: &[String],
        attrs: Vec<(String, AttrValue)>,
    ) -> Result<()> {
        if self.frozen {
            return Err(ContainerError::StructureFrozen {
                group: group.to_string(),
                field: field.to_string(),
            }
            .into());
        }
        if self.index.group(group).is_none() {
            return Err(AppendError::GroupMissing {
                group: group.to_string(),
            }
            .into());
        }
        self.write_control(ControlRecord::FieldCreate {
            group: group.to_string(),
            field: field.to_string(),
            row_shape: row_shape.to_vec(),
            unit: unit.map(ToString::to_string),
            axes: axes.to_vec(),
            attrs,
        })
    }

    /// Appends complete rows to an existing dataset.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::GroupMissing`] for an unknown group and
    /// [`AppendError::ShapeMismatch`] if the sample count is not a whole
    /// number of rows for the dataset.
    pub fn append_rows(&mut self, group: &str, field: &str, samples: &[f64]) -> Result<()> {
        let field_state = self
            .index
            .group(group)
            .ok_or_else(|| AppendError::GroupMissing {
                group: group.to_string(),
            })?
            .field(field)
            .ok_or_else(|| ContainerError::Corrupted {
                path: self.path.clone(),
                reason: format!("append to unknown dataset '{field}' in group '{group}'"),
            })?;

        let row_size = field_state.row_size();
        let row_shape = field_state.row_shape.clone();
        if samples.len() % row_size != 0 {
            return Err(AppendError::ShapeMismatch {
                field: field.to_string(),
                expected: row_shape,
                found: vec![samples.len()],
            }
            .into());
        }
        let nrows = samples.len() / row_size;
        if nrows == 0 {
            return Ok(());
        }

        let mut payload =
            Vec::with_capacity(12 + group.len() + field.len() + samples.len() * SAMPLE_SIZE);
        #[allow(clippy::cast_possible_truncation)] // names and row counts fit in u32
        {
            payload.extend_from_slice(&(group.len() as u32).to_le_bytes());
            payload.extend_from_slice(group.as_bytes());
            payload.extend_from_slice(&(field.len() as u32).to_le_bytes());
            payload.extend_from_slice(field.as_bytes());
            payload.extend_from_slice(&(nrows as u32).to_le_bytes());
        }
        let samples_at = payload.len();
        for sample in samples {
            payload.extend_from_slice(&sample.to_le_bytes());
        }

        let payload_offset = self.write_frame(KIND_DATA, &payload)?;

        // Mirror the on-disk change in the index.
        let field_state = self
            .index
            .group_mut(group)
            .and_then(|g| g.field_mut(field))
            .ok_or_else(|| ContainerError::Corrupted {
                path: self.path.clone(),
                reason: format!("dataset '{field}' vanished from index"),
            })?;
        field_state.chunks.push(DataChunk {
            offset: usize::try_from(payload_offset).unwrap_or(usize::MAX) + samples_at,
            nrows,
        });
        field_state.nrows += nrows;
        Ok(())
    }

    /// Syncs all appended frames to disk.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::SyncFailed`] if the sync fails.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| ContainerError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        self.file.sync_data().map_err(|e| {
            ContainerError::SyncFailed {
                path: self.path.clone(),
                source: e,
            }
            .into()
        })
    }
}

/// Read-only, memory-mapped view of a container.
///
/// The view is a snapshot: it covers exactly the frames committed at open
/// time. An active writer appending concurrently is harmless — incomplete
/// frames at the tail are ignored by replay.
#[derive(Debug)]
pub struct ContainerReader {
    mmap: Mmap,
    path: PathBuf,
    index: ContainerIndex,
}

impl ContainerReader {
    /// Opens a container for reading.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Io`] or
    /// [`ContainerError::TruncatedHeader`] (both transient while a writer is
    /// mid-creation) or [`ContainerError::Corrupted`] (fatal).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io_err = |e: std::io::Error| ContainerError::Io {
            path: path.clone(),
            source: e,
        };

        let file = File::open(&path).map_err(io_err)?;
        // SAFETY: the mapping is read-only and lives as long as `self`. A
        // concurrent writer only ever appends past the committed tail;
        // replay below never trusts bytes beyond a valid commit trailer.
        let mmap = unsafe { Mmap::map(&file).map_err(io_err)? };

        let (index, _) = replay(&mmap, &path)?;
        Ok(Self { mmap, path, index })
    }

    /// The container file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The replayed container state.
    pub fn index(&self) -> &ContainerIndex {
        &self.index
    }

    /// Group names in creation order.
    pub fn group_names(&self) -> Vec<String> {
        self.index.groups.iter().map(|g| g.name.clone()).collect()
    }

    /// Reads rows `[start, stop)` of one dataset into a flat buffer.
    ///
    /// Rows outside the committed range are silently clipped; callers pass
    /// bounds already reconciled against dataset lengths.
    pub fn read_rows(&self, field: &FieldIndex, start: usize, stop: usize) -> Vec<f64> {
        let stop = stop.min(field.nrows);
        if start >= stop {
            return Vec::new();
        }

        let row_size = field.row_size();
        let mut out = Vec::with_capacity((stop - start) * row_size);
        let mut row_base = 0usize;

        for chunk in &field.chunks {
            let chunk_end = row_base + chunk.nrows;
            let take_start = start.max(row_base);
            let take_end = stop.min(chunk_end);
            if take_start < take_end {
                let byte_start = chunk.offset + (take_start - row_base) * row_size * SAMPLE_SIZE;
                let nsamples = (take_end - take_start) * row_size;
                let bytes = &self.mmap[byte_start..byte_start + nsamples * SAMPLE_SIZE];
                for sample in bytes.chunks_exact(SAMPLE_SIZE) {
                    let mut raw = [0u8; SAMPLE_SIZE];
                    raw.copy_from_slice(sample);
                    out.push(f64::from_le_bytes(raw));
                }
            }
            row_base = chunk_end;
            if row_base >= stop {
                break;
            }
        }

        out
    }
}
