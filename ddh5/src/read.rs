//! The concurrent-read gate: reconstructing record collections from a
//! container that may have an active writer.
//!
//! Readers never coordinate with the writer. Instead this module layers
//! three defenses over the raw [`ContainerReader`]:
//!
//! 1. a bounded open retry for transient contention (the writer may be
//!    mid-creation, leaving a short or busy file);
//! 2. length reconciliation across a group's datasets — a reader can land
//!    between two appends of the same batch, observing unequal lengths,
//!    which is clamped to the shortest dataset by default;
//! 3. a final collection validation, so a reconstructed [`DataDict`] is
//!    never returned in a partially-consistent state.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::attr::{self, is_meta_key, strip_meta_key};
use crate::container::{ContainerReader, GroupIndex, resolve_path};
use crate::datadict::{DataDict, DataField};
use crate::error::{ReadError, Result};

/// Options for reconstructing a record collection from a container.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// First row to read (inclusive).
    pub start_row: usize,
    /// Last row to read (exclusive); `None` reads to the end.
    pub stop_row: Option<usize>,
    /// Reconstruct fields, attributes, and shapes but skip all values.
    pub structure_only: bool,
    /// Clamp unequal dataset lengths to the shortest instead of failing.
    ///
    /// Unequal lengths are expected when racing an active writer; turning
    /// this off promotes the condition to [`ReadError::TornSnapshot`].
    pub ignore_unequal_lengths: bool,
    /// Open retries after the first failed attempt.
    pub n_retries: u32,
    /// Fixed delay between open attempts.
    pub retry_delay: Duration,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            start_row: 0,
            stop_row: None,
            structure_only: false,
            ignore_unequal_lengths: true,
            n_retries: 5,
            retry_delay: Duration::from_millis(10),
        }
    }
}

/// Opens a container for reading, retrying transient failures.
///
/// Only failures flagged transient (plain I/O errors, an incomplete
/// header) are retried; corruption is fatal on the first attempt.
///
/// # Errors
///
/// Returns [`ReadError::RetriesExhausted`] wrapping the last transient
/// failure once the budget is spent.
fn open_with_retry(path: &Path, opts: &ReadOptions) -> Result<ContainerReader> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match ContainerReader::open(path) {
            Ok(reader) => return Ok(reader),
            Err(err) if err.is_transient() && attempt <= opts.n_retries => {
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    error = %err,
                    "container not readable yet, retrying"
                );
                std::thread::sleep(opts.retry_delay);
            }
            Err(err) if err.is_transient() => {
                return Err(ReadError::RetriesExhausted {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source: Box::new(err),
                }
                .into());
            }
            Err(err) => return Err(err),
        }
    }
}

/// Reconstructs one group into a record collection.
fn datadict_from_group(
    reader: &ContainerReader,
    group: &GroupIndex,
    opts: &ReadOptions,
) -> Result<DataDict> {
    let mut datadict = DataDict::new();
    for (key, value) in &group.attrs {
        if is_meta_key(key) {
            datadict.add_raw_meta(key, attr::decode(value));
        }
    }

    let lengths: Vec<(String, usize)> = group
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.nrows))
        .collect();
    let common = lengths.iter().map(|(_, n)| *n).min().unwrap_or(0);
    if lengths.iter().any(|(_, n)| *n != common) {
        if opts.ignore_unequal_lengths {
            tracing::warn!(
                group = group.name,
                ?lengths,
                "unequal dataset lengths, clamping to the shortest"
            );
        } else {
            return Err(ReadError::TornSnapshot { lengths }.into());
        }
    }

    let start = opts.start_row;
    let stop = opts.stop_row.unwrap_or(common).min(common);

    for field_state in &group.fields {
        let mut field = DataField::independent().with_row_shape(&field_state.row_shape);
        field.unit = field_state.unit.clone();
        field.axes = field_state.axes.clone();

        for (key, value) in &field_state.attrs {
            if is_meta_key(key) {
                field.add_meta(strip_meta_key(key), attr::decode(value));
            }
        }
        // Full on-disk shape, independent of the requested row range.
        field.add_meta("shape", json!(field_state.shape()));

        if !opts.structure_only && stop > start {
            let values = reader.read_rows(field_state, start, stop);
            field = field.with_values(&values);
        }

        datadict.insert_field(&field_state.name, field);
    }

    datadict.validate()?;
    Ok(datadict)
}

/// Reconstructs the record collection stored in one group of a container.
///
/// A missing file or group is a configuration error and fails immediately,
/// without retries.
///
/// # Errors
///
/// Returns [`ReadError`] variants for missing file/group, retry
/// exhaustion, and (when tolerance is off) torn snapshots; container
/// corruption and validation failures propagate as their own kinds.
pub fn datadict_from_ddh5<P: AsRef<Path>>(
    basepath: P,
    group: &str,
    opts: &ReadOptions,
) -> Result<DataDict> {
    let filepath = resolve_path(basepath);
    if !filepath.exists() {
        return Err(ReadError::FileMissing { path: filepath }.into());
    }

    let reader = open_with_retry(&filepath, opts)?;
    let group_state = reader
        .index()
        .group(group)
        .ok_or_else(|| ReadError::GroupMissing {
            path: filepath.clone(),
            group: group.to_string(),
        })?;

    datadict_from_group(&reader, group_state, opts)
}

/// Reconstructs every group of a container, keyed by group name.
///
/// # Errors
///
/// Same conditions as [`datadict_from_ddh5`]; the first failing group
/// aborts the whole read.
pub fn all_datadicts_from_ddh5<P: AsRef<Path>>(
    basepath: P,
    opts: &ReadOptions,
) -> Result<BTreeMap<String, DataDict>> {
    let filepath = resolve_path(basepath);
    if !filepath.exists() {
        return Err(ReadError::FileMissing { path: filepath }.into());
    }

    let reader = open_with_retry(&filepath, opts)?;
    let mut out = BTreeMap::new();
    for group_state in &reader.index().groups {
        let datadict = datadict_from_group(&reader, group_state, opts)?;
        out.insert(group_state.name.clone(), datadict);
    }
    Ok(out)
}
