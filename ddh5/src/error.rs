//! Error types for the ddh5 storage layer.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all ddh5 operations.
///
/// This enum covers all error conditions across the storage layer, from
/// container-level I/O to record-collection validation. Each subsystem has
/// its own error enum; this type aggregates them for a single `Result` alias.
#[derive(Error, Debug)]
pub enum Ddh5Error {
    /// Error in the on-disk container (I/O, corruption, structure rules).
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// Error during an append operation (write path).
    #[error("append error: {0}")]
    Append(#[from] AppendError),

    /// Error during a read/reconstruction operation.
    #[error("read error: {0}")]
    Read(#[from] ReadError),

    /// Record collection failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error in writer-session setup or teardown.
    #[error("writer error: {0}")]
    Writer(#[from] WriterError),
}

impl Ddh5Error {
    /// Whether this failure may resolve on its own while a writer is active.
    ///
    /// Transient failures are the ones the read gate retries: plain I/O
    /// errors (the writer may hold a short-lived exclusive state) and a
    /// header that is not fully on disk yet. Corruption and configuration
    /// errors are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Ddh5Error::Container(ContainerError::Io { .. })
                | Ddh5Error::Container(ContainerError::TruncatedHeader { .. })
        )
    }
}

/// Errors raised by the on-disk container format.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// An underlying I/O operation on the container file failed.
    #[error("I/O failure on container '{}': {source}", path.display())]
    Io {
        /// The container file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The container file exists but its header is not fully written yet.
    ///
    /// This is the transient condition a reader can hit when racing a writer
    /// that is in the middle of creating the file; the read gate retries it.
    #[error("container '{}' has an incomplete header ({len} bytes)", path.display())]
    TruncatedHeader {
        /// The container file path.
        path: PathBuf,
        /// The number of header bytes present.
        len: u64,
    },

    /// The container file is corrupted or has an unsupported format.
    #[error("container '{}' is corrupted: {reason}", path.display())]
    Corrupted {
        /// The container file path.
        path: PathBuf,
        /// Description of the corruption.
        reason: String,
    },

    /// A dataset-creating change was attempted after the container entered
    /// concurrent-read-friendly mode.
    ///
    /// Once a writer freezes the container structure, readers may be
    /// observing it; only row appends and attribute updates are allowed
    /// from that point on.
    #[error("cannot create dataset '{field}' in group '{group}': container structure is frozen for concurrent reads")]
    StructureFrozen {
        /// The target group name.
        group: String,
        /// The dataset that could not be created.
        field: String,
    },

    /// Failed to sync the container file to disk.
    #[error("failed to sync container '{}' to disk: {source}", path.display())]
    SyncFailed {
        /// The container file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the append engine.
#[derive(Error, Debug)]
pub enum AppendError {
    /// The target group does not exist; callers must initialize it first.
    #[error("group '{group}' does not exist, initialize the container first")]
    GroupMissing {
        /// The missing group name.
        group: String,
    },

    /// The in-memory field's inner shape does not match the on-disk dataset.
    #[error("field '{field}' shape mismatch: dataset rows are {expected:?}, in-memory rows are {found:?}")]
    ShapeMismatch {
        /// The field name.
        field: String,
        /// The inner (per-row) shape of the on-disk dataset.
        expected: Vec<usize>,
        /// The inner shape of the in-memory field.
        found: Vec<usize>,
    },
}

/// Errors raised by the concurrent-read gate.
#[derive(Error, Debug)]
pub enum ReadError {
    /// The requested container file does not exist.
    #[error("container file '{}' does not exist", path.display())]
    FileMissing {
        /// The resolved container path.
        path: PathBuf,
    },

    /// The requested group is not present in the container.
    #[error("group '{group}' does not exist in container '{}'", path.display())]
    GroupMissing {
        /// The resolved container path.
        path: PathBuf,
        /// The missing group name.
        group: String,
    },

    /// Fields in the group have unequal row counts and tolerance is off.
    #[error("unequal dataset lengths in group: {lengths:?}")]
    TornSnapshot {
        /// Observed `(field, rows)` pairs.
        lengths: Vec<(String, usize)>,
    },

    /// Opening the container kept failing past the retry budget.
    #[error("container '{}' not readable after {attempts} attempts: {source}", path.display())]
    RetriesExhausted {
        /// The resolved container path.
        path: PathBuf,
        /// Total open attempts made.
        attempts: u32,
        /// The last open failure.
        #[source]
        source: Box<Ddh5Error>,
    },
}

/// Errors raised when validating a record collection.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A field lists an axis that is not itself a field of the collection.
    #[error("field '{field}' depends on axis '{axis}' which is not a field of the collection")]
    UnknownAxis {
        /// The dependent field.
        field: String,
        /// The axis name that did not resolve.
        axis: String,
    },

    /// Fields disagree on the number of rows.
    #[error("field '{field}' has {found} rows, expected {expected}")]
    RowCountMismatch {
        /// The offending field.
        field: String,
        /// The row count of the first field.
        expected: usize,
        /// The row count found.
        found: usize,
    },

    /// A sample buffer does not divide evenly into rows.
    #[error("field '{field}': {samples} samples do not divide into rows of {row_size} samples")]
    RaggedRows {
        /// The offending field.
        field: String,
        /// The number of samples supplied.
        samples: usize,
        /// Samples per row implied by the field's inner shape.
        row_size: usize,
    },

    /// A batch insert did not supply data for every field.
    #[error("no data supplied for field '{field}'")]
    FieldMissing {
        /// The field that was not covered.
        field: String,
    },

    /// A batch insert named a field that is not part of the collection.
    #[error("field '{field}' is not part of the collection")]
    UnknownField {
        /// The unknown field name.
        field: String,
    },
}

/// Errors raised during writer-session setup.
#[derive(Error, Debug)]
pub enum WriterError {
    /// The base directory could not be created or scanned.
    #[error("failed to access data directory '{}': {source}", path.display())]
    BaseDirAccess {
        /// The directory that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The initial record collection has no fields at all.
    ///
    /// A writer session needs at least the structure of the data to be able
    /// to merge row batches later.
    #[error("initial record collection defines no fields")]
    EmptyStructure,
}

/// Type alias for `Result<T, Ddh5Error>`.
pub type Result<T> = std::result::Result<T, Ddh5Error>;
