//! A runtime units-of-measurement engine: parse units expressions,
//! build `Quantity` values, convert between compatible units (including
//! affine temperature scales), and do dimensional algebra — all driven
//! by a loadable, line-oriented definitions format rather than a fixed
//! set of built-in units.

pub mod definitions;
pub mod errors;
pub mod expr;
pub mod numeric;
pub mod quantity;
pub mod registry;
pub mod unit_product;

pub use errors::UnitsError;
pub use numeric::MathOps;
pub use quantity::Quantity;
pub use registry::{Registry, DEFAULT_REGISTRY};
pub use unit_product::UnitProduct;
