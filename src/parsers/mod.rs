pub mod classes;
pub mod error;
pub mod fields;

pub use classes::{merge_class_maps, parse_classes, ClassMap, ClassRecord};
pub use error::ParseError;
pub use fields::{parse_field, parse_field_params, parse_fields, Field, FieldKind};
