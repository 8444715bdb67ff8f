//! Store schemas and row batches.

use super::array::{ArrayValue, byte_len};
use super::dtype::DType;
use super::sample::Sample;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-field layout: element type plus per-sample shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Element type, fixed for the lifetime of a store.
    pub dtype: DType,
    /// Shape of one sample of this field (without the sample axis).
    pub shape: Vec<usize>,
}

impl FieldSpec {
    /// Creates a field spec.
    #[must_use]
    pub const fn new(dtype: DType, shape: Vec<usize>) -> Self {
        Self { dtype, shape }
    }

    /// Describes the layout of an existing value.
    #[must_use]
    pub fn of(value: &ArrayValue) -> Self {
        Self {
            dtype: value.dtype(),
            shape: value.shape().to_vec(),
        }
    }

    /// Bytes occupied by one row of this field.
    ///
    /// Saturates at `usize::MAX` for shapes that cannot be addressed; specs
    /// taken from arrays or checked with [`FieldSpec::checked_row_bytes`]
    /// never do.
    #[must_use]
    pub fn row_bytes(&self) -> usize {
        self.checked_row_bytes().unwrap_or(usize::MAX)
    }

    /// Bytes occupied by one row of this field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the shape overflows `usize`.
    pub fn checked_row_bytes(&self) -> Result<usize> {
        byte_len(self.dtype, &self.shape)
    }

    /// Returns whether `value` has exactly this dtype and shape.
    #[must_use]
    pub fn matches(&self, value: &ArrayValue) -> bool {
        value.dtype() == self.dtype && value.shape() == self.shape.as_slice()
    }
}

/// Ordered set of fields that make up a store group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl StoreSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Infers a schema from a pivot sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the pivot has no fields.
    pub fn from_pivot(pivot: &Sample) -> Result<Self> {
        if pivot.is_empty() {
            return Err(Error::Schema(
                "pivot sample has no fields to infer a schema from".to_string(),
            ));
        }
        Ok(Self {
            fields: pivot
                .fields()
                .map(|(name, value)| (name.to_string(), FieldSpec::of(value)))
                .collect(),
        })
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Returns whether a field is part of the schema.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the schema has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks that `sample` carries exactly the schema's fields with matching layouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] naming the first missing, unexpected, or
    /// mismatched field.
    pub fn check_row(&self, sample: &Sample) -> Result<()> {
        for (name, spec) in &self.fields {
            let value = sample
                .get(name)
                .ok_or_else(|| Error::Schema(format!("row is missing field '{name}'")))?;
            if !spec.matches(value) {
                return Err(Error::Schema(format!(
                    "field '{name}' expects {} {:?}, got {} {:?}",
                    spec.dtype,
                    spec.shape,
                    value.dtype(),
                    value.shape()
                )));
            }
        }
        if let Some(extra) = sample.field_names().find(|name| !self.contains(name)) {
            return Err(Error::Schema(format!("row has unexpected field '{extra}'")));
        }
        Ok(())
    }

    /// Builds an all-zero sample with this schema's layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if a field shape is too large to address.
    pub fn zero_row(&self) -> Result<Sample> {
        self.fields
            .iter()
            .map(|(name, spec)| {
                Ok((
                    name.clone(),
                    ArrayValue::zeros(spec.dtype, spec.shape.clone())?,
                ))
            })
            .collect()
    }
}

/// A contiguous run of rows, one stacked array per field.
///
/// Every array has shape `(rows, *field_shape)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    rows: usize,
    columns: BTreeMap<String, ArrayValue>,
}

impl RowBatch {
    /// Creates an empty batch with a fixed row count.
    #[must_use]
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: BTreeMap::new(),
        }
    }

    /// Adds a stacked column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the column's leading axis does not equal
    /// the batch row count.
    pub fn insert(&mut self, name: impl Into<String>, column: ArrayValue) -> Result<()> {
        let name = name.into();
        if column.shape().is_empty() || column.rows() != self.rows {
            return Err(Error::Schema(format!(
                "column '{name}' has shape {:?}, batch expects {} rows",
                column.shape(),
                self.rows
            )));
        }
        self.columns.insert(name, column);
        Ok(())
    }

    /// Stacks samples into a batch. All samples must share one field set and layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the samples disagree on fields or layouts.
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let mut batch = Self::new(samples.len());
        let Some(first) = samples.first() else {
            return Ok(batch);
        };
        let schema = StoreSchema::from_pivot(first)?;
        for sample in samples {
            schema.check_row(sample)?;
        }
        for (name, spec) in schema.iter() {
            let mut data = Vec::with_capacity(spec.row_bytes() * samples.len());
            for sample in samples {
                if let Some(value) = sample.get(name) {
                    data.extend_from_slice(value.as_bytes());
                }
            }
            let mut shape = Vec::with_capacity(spec.shape.len() + 1);
            shape.push(samples.len());
            shape.extend_from_slice(&spec.shape);
            batch.insert(name, ArrayValue::from_bytes(spec.dtype, shape, data)?)?;
        }
        Ok(batch)
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Looks up a stacked column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ArrayValue> {
        self.columns.get(name)
    }

    /// Iterates over stacked columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ArrayValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Materialises batch-local row `index` as a sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= rows`.
    pub fn row(&self, index: usize) -> Result<Sample> {
        if index >= self.rows {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.rows,
            });
        }
        self.columns
            .iter()
            .map(|(name, column)| Ok((name.clone(), column.row(index)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(a: f32, b: i32) -> Sample {
        Sample::new()
            .with_field("a", ArrayValue::from_vec(vec![3], vec![a; 3]).unwrap())
            .with_field("b", ArrayValue::scalar(b))
    }

    #[test]
    fn test_schema_from_pivot() {
        let schema = StoreSchema::from_pivot(&sample(1.0, 2)).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("a"), Some(&FieldSpec::new(DType::F32, vec![3])));
        assert_eq!(schema.get("b").unwrap().row_bytes(), 4);
    }

    #[test]
    fn test_empty_pivot_is_schema_error() {
        assert!(matches!(
            StoreSchema::from_pivot(&Sample::new()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_check_row() {
        let schema = StoreSchema::from_pivot(&sample(1.0, 2)).unwrap();
        assert!(schema.check_row(&sample(5.0, 6)).is_ok());

        let mut missing = sample(1.0, 2);
        missing.remove("b");
        assert!(schema.check_row(&missing).is_err());

        let extra = sample(1.0, 2).with_field("c", ArrayValue::scalar(0u8));
        assert!(schema.check_row(&extra).is_err());

        let wrong = sample(1.0, 2).with_field("b", ArrayValue::scalar(2i64));
        assert!(schema.check_row(&wrong).is_err());
    }

    #[test]
    fn test_batch_roundtrips_rows() {
        let rows = vec![sample(1.0, 10), sample(2.0, 20), sample(3.0, 30)];
        let batch = RowBatch::from_samples(&rows).unwrap();
        assert_eq!(batch.rows(), 3);
        assert_eq!(batch.column("a").unwrap().shape(), &[3, 3]);
        assert_eq!(batch.row(1).unwrap(), rows[1]);
        assert!(batch.row(3).is_err());
    }

    #[test]
    fn test_zero_row_matches_schema() {
        let schema = StoreSchema::from_pivot(&sample(1.0, 2)).unwrap();
        let zero = schema.zero_row().unwrap();
        assert!(schema.check_row(&zero).is_ok());
        assert_eq!(zero.get("b").unwrap().to_vec::<i32>().unwrap(), vec![0]);
    }
}
