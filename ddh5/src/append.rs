//! The append engine: merging an in-memory record collection into a
//! container group.
//!
//! Appending is incremental by design. A long-running measurement holds a
//! growing [`DataDict`] and calls into this module repeatedly; each call
//! reconciles the in-memory state against the on-disk datasets and writes
//! only what the selected [`AppendMode`] asks for.

use std::path::{Path, PathBuf};

use crate::attr;
use crate::container::{Container, ensure_parent_dirs, resolve_path, stamp_attrs};
use crate::datadict::DataDict;
use crate::error::{AppendError, Result};

/// How an already-existing dataset is reconciled with in-memory data.
///
/// The set of modes is closed; every reconciliation site matches on it
/// exhaustively, so adding a mode is a compile-visible change.
///
/// [`AppendNew`](Self::AppendNew) and [`AppendAll`](Self::AppendAll) differ
/// in what the in-memory field is assumed to hold: the full accumulated
/// history versus only the newest increment. Pick the mode matching the
/// data source and keep it for the group's lifetime; mixing modes against
/// one group is a caller error with undefined results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendMode {
    /// Replace the group wholesale. Entry points re-initialize the group
    /// before writing; on a dataset that still exists this mode writes
    /// nothing.
    Overwrite,
    /// Append only the rows beyond the dataset's current length.
    ///
    /// The check is length-only: rows already on disk are never compared
    /// against memory, and an in-memory field with no more rows than the
    /// dataset writes nothing.
    #[default]
    AppendNew,
    /// Append the entire in-memory content after the existing rows.
    AppendAll,
}

/// Writes a record collection into an existing group of an open container.
///
/// Group metadata is upserted on every call (latest value per key wins).
/// Fields without a dataset are created, stamped with a creation time,
/// `unit`, `axes`, and their field metadata, and filled with all in-memory
/// rows; fields with a dataset are extended per `mode`. Each dataset
/// mutation is followed by a flush.
///
/// When `concurrent_read` is set and every field already has its dataset,
/// the container structure is frozen before any data is written, making
/// the file safe for concurrent readers.
///
/// # Errors
///
/// Returns [`AppendError::GroupMissing`] if the group has not been
/// initialized, [`AppendError::ShapeMismatch`] if an in-memory field's
/// inner shape disagrees with its dataset, and container errors on I/O
/// failure.
pub fn write_datadict(
    container: &mut Container,
    datadict: &DataDict,
    group: &str,
    mode: AppendMode,
    concurrent_read: bool,
) -> Result<()> {
    if container.index().group(group).is_none() {
        return Err(AppendError::GroupMissing {
            group: group.to_string(),
        }
        .into());
    }

    tracing::debug!(
        group,
        ?mode,
        fields = datadict.num_fields(),
        rows = datadict.nrows(),
        "writing record collection"
    );

    let meta: Vec<_> = datadict
        .meta_items()
        .map(|(key, value)| (key.to_string(), attr::encode(value)))
        .collect();
    if !meta.is_empty() {
        container.set_group_attrs(group, meta)?;
    }

    let all_exist = datadict.field_names().all(|name| {
        container
            .index()
            .group(group)
            .is_some_and(|g| g.field(name).is_some())
    });
    if all_exist && concurrent_read {
        container.freeze_structure();
    }

    for (name, field) in datadict.data_items() {
        let existing = container
            .index()
            .group(group)
            .and_then(|g| g.field(name))
            .map(|f| (f.nrows, f.row_shape.clone()));

        match existing {
            None => {
                let mut attrs = stamp_attrs("creation");
                attrs.extend(
                    field
                        .meta_items()
                        .map(|(key, value)| (key.to_string(), attr::encode(value))),
                );
                container.create_field(
                    group,
                    name,
                    field.row_shape(),
                    field.unit.as_deref(),
                    &field.axes,
                    attrs,
                )?;
                container.append_rows(group, name, field.values())?;
            }
            Some((disk_rows, disk_shape)) => {
                if disk_shape != field.row_shape() {
                    return Err(AppendError::ShapeMismatch {
                        field: name.to_string(),
                        expected: disk_shape,
                        found: field.row_shape().to_vec(),
                    }
                    .into());
                }
                match mode {
                    // Callers overwrite by re-initializing the group first;
                    // a dataset that survived is left untouched.
                    AppendMode::Overwrite => {}
                    AppendMode::AppendNew => {
                        if field.nrows() > disk_rows {
                            let written = disk_rows * field.row_size();
                            container.append_rows(group, name, &field.values()[written..])?;
                        }
                    }
                    AppendMode::AppendAll => {
                        container.append_rows(group, name, field.values())?;
                    }
                }
            }
        }

        container.flush()?;
    }

    container.flush()
}

/// One-shot convenience: writes a record collection to a container file.
///
/// The path is normalized via [`resolve_path`] and parent directories are
/// created as needed. The group is initialized (dropping any previous
/// content) when it does not exist yet or when `mode` is
/// [`AppendMode::Overwrite`]. Returns the resolved file path.
///
/// # Errors
///
/// Propagates container and append failures.
pub fn datadict_to_ddh5<P: AsRef<Path>>(
    datadict: &DataDict,
    basepath: P,
    group: &str,
    mode: AppendMode,
    concurrent_read: bool,
) -> Result<PathBuf> {
    let filepath = resolve_path(basepath);
    ensure_parent_dirs(&filepath)?;

    let mut container = Container::open_append(&filepath)?;
    if container.index().group(group).is_none() || mode == AppendMode::Overwrite {
        container.init_group(group)?;
    }
    write_datadict(&mut container, datadict, group, mode, concurrent_read)?;

    Ok(filepath)
}
