//! JSON Abstract Data Notation (JADN): a schema model, structural checker,
//! shorthand-to-core transformer, and a validating encode/decode codec.
//!
//! ```
//! use jadn::{Codec, Schema};
//!
//! let schema = Schema::from_json_str(r#"{
//!     "types": [["Percent", "Integer", ["{0", "}100"], ""]]
//! }"#).unwrap();
//!
//! let codec = Codec::new(&schema).unwrap();
//! let wire = codec.encode("Percent", &jadn::Value::from_i64(42)).unwrap();
//! assert_eq!(wire, jadn::Value::from_i64(42));
//! ```

pub mod codec;
pub mod definitions;
pub mod schema;
pub mod transform;
pub mod value;

pub use codec::Codec;
pub use definitions::{BaseType, Config, Extension};
pub use schema::error::ValidationError;
pub use schema::{check, Analysis, FieldDefinition, Info, Schema, TypeDefinition};
pub use value::Value;
