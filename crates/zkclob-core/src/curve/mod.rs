//! BabyJubjub primitives.
//!
//! ```text
//! field      FieldElement (BN254 Fr), canonical LE bytes, decimal strings
//!   │
//!   ▼
//! babyjub    Point: projective add, double-and-add, pack / unpack
//!   │
//!   ▼
//! pedersen   windowed Pedersen hash over fixed segment generators
//! ```

pub mod babyjub;
pub mod field;
pub mod pedersen;

pub use babyjub::{subgroup_order, Point};
pub use field::FieldElement;
