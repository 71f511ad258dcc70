//! ddh5 — persistent storage for streaming measurement data.
//!
//! A `.ddh5` container is a single append-only file holding named groups
//! of growing, row-aligned datasets plus free-form attributes. The crate
//! covers the full storage lifecycle of a measurement run:
//!
//! - [`datadict`] — the in-memory record collection ([`DataDict`],
//!   [`DataField`]): named fields sharing a row dimension, with units,
//!   axis dependencies, and metadata.
//! - [`container`] — the on-disk format: a framed log with torn-tail
//!   commit markers, replayed into an index on open and memory-mapped on
//!   the read path.
//! - [`append`] — the append engine: incremental merging of a collection
//!   into a group under an explicit [`AppendMode`].
//! - [`read`] — the concurrent-read gate: bounded open retries, dataset
//!   length reconciliation, and validated reconstruction while a writer
//!   is active.
//! - [`writer`] — the writer session ([`Ddh5Writer`]): day-bucketed run
//!   directories and guaranteed close timestamps.
//! - [`attr`] — the attribute codec between free-form JSON values and the
//!   storable [`AttrValue`] forms.
//!
//! # Quick start
//!
//! ```
//! use ddh5::{AppendMode, DataDict, DataField, ReadOptions};
//!
//! let dir = tempfile::tempdir().unwrap();
//!
//! let mut dd = DataDict::new();
//! dd.insert_field("x", DataField::independent().with_unit("s"));
//! dd.insert_field("y", DataField::dependent(["x"]).with_unit("V"));
//! dd.add_data(&[("x", &[0.0, 1.0]), ("y", &[0.0, 1.0])]).unwrap();
//!
//! let path = ddh5::datadict_to_ddh5(
//!     &dd,
//!     dir.path().join("run"),
//!     "data",
//!     AppendMode::Overwrite,
//!     false,
//! )
//! .unwrap();
//!
//! let back = ddh5::datadict_from_ddh5(&path, "data", &ReadOptions::default()).unwrap();
//! assert_eq!(back.nrows(), 2);
//! assert_eq!(back.field("y").unwrap().unit.as_deref(), Some("V"));
//! ```
//!
//! For a live measurement, prefer a [`Ddh5Writer`] session: it allocates
//! the run directory, streams row batches, and stamps timestamps on
//! close even across panics.

pub mod append;
pub mod attr;
pub mod container;
pub mod datadict;
pub mod error;
pub mod read;
pub mod writer;

pub use append::{AppendMode, datadict_to_ddh5, write_datadict};
pub use attr::AttrValue;
pub use container::{Container, ContainerReader, DATAFILE_EXT, resolve_path};
pub use datadict::{DataDict, DataField};
pub use error::{
    AppendError, ContainerError, Ddh5Error, ReadError, Result, ValidationError, WriterError,
};
pub use read::{ReadOptions, all_datadicts_from_ddh5, datadict_from_ddh5};
pub use writer::Ddh5Writer;
