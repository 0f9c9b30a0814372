//! WPILib struct support for parsing packed binary structures.
//!
//! This module implements the WPILib struct serialization specification: a
//! grammar parser ([`parser`]) that turns `.schema` entry text into
//! unresolved field declarations, a registry ([`registry`]) that assigns each
//! declaration a precise bit range (packing bitfields and resolving nested
//! struct references in fixed-point fashion), and a decoder ([`decoder`])
//! that walks a compiled schema to pull typed values out of a struct-encoded
//! byte payload.

pub mod decoder;
pub mod parser;
pub mod registry;
pub mod types;

pub use decoder::{decode, decode_array, Decoded};
pub use parser::SchemaParser;
pub use registry::StructRegistry;
pub use types::*;
