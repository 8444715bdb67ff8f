//! Data models for sampleconv.
//!
//! Arrays, samples, schemas, and row batches shared by the store adapter,
//! the archive codec, and the conversion services.

mod array;
mod dtype;
mod sample;
mod schema;

pub use array::{ArrayValue, element_count};
pub use dtype::{DType, Element};
pub use sample::{Sample, Scalar};
pub use schema::{FieldSpec, RowBatch, StoreSchema};
