//! Foundation types for the content storage bridge.
//!
//! Every other bridge crate depends on `bridge-types`. It owns the two
//! addressing schemes the bridge reconciles:
//!
//! - [`path`] -- hierarchical, `/`-separated storage paths and the path
//!   builder used to compose a root and a relative name into a canonical
//!   absolute path
//! - [`Identifier`] -- stable, location-independent entity identity

pub mod error;
pub mod identifier;
pub mod path;

pub use error::TypeError;
pub use identifier::Identifier;
