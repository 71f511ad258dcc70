//! The in-memory record collection (`DataDict`).
//!
//! A [`DataDict`] is a named, insertion-ordered set of fields sharing a
//! growable row dimension. Each field holds an N-dimensional sample array
//! stored flat in row-major order, an optional `unit`, an ordered `axes`
//! list naming the fields it depends on, and free-form metadata. The
//! collection itself carries metadata under the reserved `__key__` naming
//! convention.
//!
//! This is the construction/export contract the storage layer works
//! against; the richer data-model algebra (gridding, reduction) lives with
//! downstream consumers and is out of scope here.

use serde_json::Value;

use crate::attr::{is_meta_key, to_meta_key};
use crate::error::{Result, ValidationError};

/// One named array-valued entry of a record collection.
///
/// Samples are stored flat in row-major order; `row_shape` holds the fixed
/// inner dimensions, so the logical shape is `[nrows, row_shape...]` and
/// only the row dimension grows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataField {
    /// Flat row-major sample storage.
    values: Vec<f64>,
    /// Fixed dimensions beyond the row dimension. Empty for scalar rows.
    row_shape: Vec<usize>,
    /// Physical unit, if any.
    pub unit: Option<String>,
    /// Names of the fields this one varies over. Empty for independents.
    pub axes: Vec<String>,
    /// Per-field metadata, keys in reserved `__key__` form.
    meta: Vec<(String, Value)>,
}

impl DataField {
    /// Creates an empty independent field (no axes) with scalar rows.
    pub fn independent() -> Self {
        Self::default()
    }

    /// Creates an empty dependent field varying over the given axes.
    pub fn dependent<S: Into<String>, I: IntoIterator<Item = S>>(axes: I) -> Self {
        Self {
            axes: axes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the unit, builder style.
    #[must_use]
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    /// Sets the inner (per-row) shape, builder style.
    #[must_use]
    pub fn with_row_shape(mut self, row_shape: &[usize]) -> Self {
        self.row_shape = row_shape.to_vec();
        self
    }

    /// Seeds the field with initial rows, builder style.
    ///
    /// # Panics
    ///
    /// Panics if the sample count is not a whole number of rows. Intended
    /// for structure literals; use [`DataField::push_rows`] for checked
    /// insertion.
    #[must_use]
    pub fn with_values(mut self, values: &[f64]) -> Self {
        assert_eq!(
            values.len() % self.row_size(),
            0,
            "initial values must be a whole number of rows"
        );
        self.values = values.to_vec();
        self
    }

    /// Samples per row (product of the inner dimensions).
    pub fn row_size(&self) -> usize {
        self.row_shape.iter().product::<usize>().max(1)
    }

    /// Number of complete rows currently held.
    pub fn nrows(&self) -> usize {
        self.values.len() / self.row_size()
    }

    /// Full logical shape: row count followed by the inner dimensions.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(1 + self.row_shape.len());
        shape.push(self.nrows());
        shape.extend_from_slice(&self.row_shape);
        shape
    }

    /// The fixed inner dimensions.
    pub fn row_shape(&self) -> &[usize] {
        &self.row_shape
    }

    /// The flat row-major sample buffer.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Appends rows to the field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::RaggedRows`] if the sample count is not a
    /// whole multiple of the field's row size. The field name is filled in
    /// by callers that know it.
    pub fn push_rows(&mut self, samples: &[f64]) -> std::result::Result<(), ValidationError> {
        if samples.len() % self.row_size() != 0 {
            return Err(ValidationError::RaggedRows {
                field: String::new(),
                samples: samples.len(),
                row_size: self.row_size(),
            });
        }
        self.values.extend_from_slice(samples);
        Ok(())
    }

    /// Sets a metadata entry on the field (key wrapped into reserved form).
    pub fn add_meta(&mut self, name: &str, value: Value) {
        let key = to_meta_key(name);
        match self.meta.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.meta.push((key, value)),
        }
    }

    /// Metadata entries of the field, keys in reserved form.
    pub fn meta_items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.meta.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A named, ordered set of fields with a shared row dimension.
///
/// Field order is insertion order and is preserved through storage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataDict {
    fields: Vec<(String, DataField)>,
    /// Collection-level metadata, keys in reserved `__key__` form.
    meta: Vec<(String, Value)>,
}

impl DataDict {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the collection, replacing any previous field of the
    /// same name.
    pub fn insert_field(&mut self, name: &str, field: DataField) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = field,
            None => self.fields.push((name.to_string(), field)),
        }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&DataField> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Looks up a field by name, mutably.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut DataField> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    /// Iterates fields in collection order.
    pub fn data_items(&self) -> impl Iterator<Item = (&str, &DataField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Field names in collection order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Whether the collection has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of rows currently held (0 for an empty collection).
    ///
    /// All fields agree on this after a successful [`DataDict::validate`].
    pub fn nrows(&self) -> usize {
        self.fields.first().map_or(0, |(_, f)| f.nrows())
    }

    /// Sets a collection-level metadata entry (key wrapped into reserved
    /// form, latest value wins).
    pub fn add_meta(&mut self, name: &str, value: Value) {
        let key = to_meta_key(name);
        match self.meta.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.meta.push((key, value)),
        }
    }

    /// Looks up a collection-level metadata entry by plain or reserved name.
    pub fn get_meta(&self, name: &str) -> Option<&Value> {
        let key = to_meta_key(name);
        self.meta.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Collection-level metadata entries, keys in reserved form.
    pub fn meta_items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.meta.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Metadata entries for one field, keys in reserved form.
    pub fn field_meta_items(&self, name: &str) -> impl Iterator<Item = (&str, &Value)> {
        self.field(name).into_iter().flat_map(DataField::meta_items)
    }

    /// Sets a raw metadata entry, trusting the key to be in reserved form
    /// already. Non-reserved keys are ignored (they are structural).
    pub(crate) fn add_raw_meta(&mut self, key: &str, value: Value) {
        if is_meta_key(key) {
            match self.meta.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value,
                None => self.meta.push((key.to_string(), value)),
            }
        }
    }

    /// Merges one batch of rows into the collection.
    ///
    /// The batch must name every field of the collection exactly once, and
    /// every entry must contribute the same number of rows. The merge is
    /// all-or-nothing: on error the collection is unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when a batch entry names an unknown
    /// field, a field is not covered, sample counts are ragged, or row
    /// counts disagree across entries.
    pub fn add_data(&mut self, batch: &[(&str, &[f64])]) -> Result<()> {
        for (name, _) in batch {
            if self.field(name).is_none() {
                return Err(ValidationError::UnknownField {
                    field: (*name).to_string(),
                }
                .into());
            }
        }

        let mut batch_rows: Option<usize> = None;
        for (name, field) in &self.fields {
            let samples = batch
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, s)| *s)
                .ok_or_else(|| ValidationError::FieldMissing {
                    field: name.clone(),
                })?;

            let row_size = field.row_size();
            if samples.len() % row_size != 0 {
                return Err(ValidationError::RaggedRows {
                    field: name.clone(),
                    samples: samples.len(),
                    row_size,
                }
                .into());
            }

            let rows = samples.len() / row_size;
            match batch_rows {
                None => batch_rows = Some(rows),
                Some(expected) if expected != rows => {
                    return Err(ValidationError::RowCountMismatch {
                        field: name.clone(),
                        expected,
                        found: rows,
                    }
                    .into());
                }
                Some(_) => {}
            }
        }

        // Checked above; the extends cannot fail.
        for (name, field) in &mut self.fields {
            if let Some((_, samples)) = batch.iter().find(|(n, _)| n == name) {
                field.values.extend_from_slice(samples);
            }
        }

        Ok(())
    }

    /// Validates the collection invariants.
    ///
    /// Every `axes` entry must name a field of the collection, and all
    /// fields must agree on the row count.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        for (name, field) in &self.fields {
            for axis in &field.axes {
                if self.field(axis).is_none() {
                    return Err(ValidationError::UnknownAxis {
                        field: name.clone(),
                        axis: axis.clone(),
                    }
                    .into());
                }
            }
        }

        let expected = self.nrows();
        for (name, field) in &self.fields {
            if field.nrows() != expected {
                return Err(ValidationError::RowCountMismatch {
                    field: name.clone(),
                    expected,
                    found: field.nrows(),
                }
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn xy_dict() -> DataDict {
        let mut dd = DataDict::new();
        dd.insert_field("x", DataField::independent().with_unit("s"));
        dd.insert_field("y", DataField::dependent(["x"]).with_unit("V"));
        dd
    }

    #[test]
    fn test_field_shapes() {
        let field = DataField::independent()
            .with_row_shape(&[2])
            .with_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(field.row_size(), 2);
        assert_eq!(field.nrows(), 2);
        assert_eq!(field.shape(), vec![2, 2]);

        let scalar = DataField::independent().with_values(&[1.0, 2.0, 3.0]);
        assert_eq!(scalar.shape(), vec![3]);
    }

    #[test]
    fn test_add_data_grows_all_fields() {
        let mut dd = xy_dict();
        dd.add_data(&[("x", &[0.0]), ("y", &[0.0])]).unwrap();
        dd.add_data(&[("x", &[1.0, 2.0]), ("y", &[1.0, 4.0])])
            .unwrap();

        assert_eq!(dd.nrows(), 3);
        assert_eq!(dd.field("y").unwrap().values(), &[0.0, 1.0, 4.0]);
        dd.validate().unwrap();
    }

    #[test]
    fn test_add_data_rejects_mismatched_rows() {
        let mut dd = xy_dict();
        let err = dd
            .add_data(&[("x", &[1.0, 2.0]), ("y", &[1.0])])
            .unwrap_err();
        assert!(err.to_string().contains("rows"));
        // All-or-nothing: nothing was inserted.
        assert_eq!(dd.nrows(), 0);
    }

    #[test]
    fn test_add_data_requires_all_fields() {
        let mut dd = xy_dict();
        assert!(dd.add_data(&[("x", &[1.0])]).is_err());
        assert!(dd.add_data(&[("x", &[1.0]), ("z", &[1.0])]).is_err());
    }

    #[test]
    fn test_validate_axes() {
        let mut dd = DataDict::new();
        dd.insert_field("y", DataField::dependent(["x"]));
        let err = dd.validate().unwrap_err();
        assert!(err.to_string().contains("axis 'x'"));

        dd.insert_field("x", DataField::independent());
        dd.validate().unwrap();
    }

    #[test]
    fn test_meta_keys_are_wrapped() {
        let mut dd = xy_dict();
        dd.add_meta("sample", json!("qubit-7"));

        let keys: Vec<&str> = dd.meta_items().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["__sample__"]);
        assert_eq!(dd.get_meta("sample"), Some(&json!("qubit-7")));
        assert_eq!(dd.get_meta("__sample__"), Some(&json!("qubit-7")));

        // Latest wins.
        dd.add_meta("sample", json!("qubit-8"));
        assert_eq!(dd.get_meta("sample"), Some(&json!("qubit-8")));
    }

    #[test]
    fn test_field_order_is_insertion_order() {
        let dd = xy_dict();
        let names: Vec<&str> = dd.field_names().collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
