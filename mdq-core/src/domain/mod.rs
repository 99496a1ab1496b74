//! Domain types: data types, canonical schema, cells, records, lineage.

pub mod cell;
pub mod data_type;
pub mod lineage;
pub mod record;

pub use cell::{Cell, CurrencyCode, Frequency, RawValue};
pub use data_type::{DataType, FieldKind, FieldName};
pub use lineage::{fingerprint_cells, Lineage, ProcessInfo};
pub use record::{Batch, CanonicalRecord, QualityAnnotation, RawBatch, RawRecord};
