//! Dense n-dimensional array values.

use super::dtype::{DType, Element};
use crate::{Error, Result};

/// A dense array of one element type, stored as raw little-endian bytes.
///
/// Invariant: `data.len() == shape.iter().product() * dtype.size()`.
/// A scalar has an empty shape and exactly one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayValue {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl ArrayValue {
    /// Creates an array from raw little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the byte count does not match the shape
    /// or the shape is too large to address.
    pub fn from_bytes(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(dtype, &shape)?;
        if data.len() != expected {
            return Err(Error::Schema(format!(
                "array of {dtype} with shape {shape:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Creates a typed array from a flat vector in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if `values.len()` does not match the shape.
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let expected = element_count(&shape)
            .ok_or_else(|| Error::Schema(format!("shape {shape:?} overflows")))?;
        if values.len() != expected {
            return Err(Error::Schema(format!(
                "shape {shape:?} holds {expected} elements, got {}",
                values.len()
            )));
        }
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.size());
        for value in values {
            value.write_le(&mut data);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data,
        })
    }

    /// Creates a zero-dimensional array.
    #[must_use]
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut data = Vec::with_capacity(T::DTYPE.size());
        value.write_le(&mut data);
        Self {
            dtype: T::DTYPE,
            shape: Vec::new(),
            data,
        }
    }

    /// Creates an all-zero array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the shape is too large to address.
    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Result<Self> {
        let data = vec![0u8; byte_len(dtype, &shape)?];
        Ok(Self { dtype, shape, data })
    }

    /// Element type.
    #[must_use]
    pub const fn dtype(&self) -> DType {
        self.dtype
    }

    /// Array shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw little-endian bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the array and returns its raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    /// Returns whether the array holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the elements into a flat vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if `T` does not match the array's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::Schema(format!(
                "cannot read {} array as {}",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.size())
            .map(T::read_le)
            .collect())
    }

    /// Number of rows along the leading axis.
    ///
    /// Zero-dimensional arrays have no leading axis and report zero rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Returns row `index` of the leading axis as its own array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index` is past the leading axis.
    pub fn row(&self, index: usize) -> Result<Self> {
        let rows = self.rows();
        if index >= rows {
            return Err(Error::IndexOutOfRange { index, len: rows });
        }
        let row_shape = self.shape[1..].to_vec();
        let row_bytes = self.data.len() / rows;
        let start = index * row_bytes;
        Ok(Self {
            dtype: self.dtype,
            shape: row_shape,
            data: self.data[start..start + row_bytes].to_vec(),
        })
    }
}

/// Number of elements a shape holds, or `None` if it overflows `usize`.
#[must_use]
pub fn element_count(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// Bytes needed for `shape` elements of `dtype`.
pub(crate) fn byte_len(dtype: DType, shape: &[usize]) -> Result<usize> {
    element_count(shape)
        .and_then(|n| n.checked_mul(dtype.size()))
        .ok_or_else(|| Error::Schema(format!("{dtype} array with shape {shape:?} is too large")))
}
