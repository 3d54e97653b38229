//! dc-core: stable foundation for distilcol.
//!
//! Contains:
//! - units (uom SI types + constructors)
//! - numeric (Real + tolerances + float helpers)
//! - roots (bracketed 1-D root finder shared by the flash and stage solvers)
//! - ids (compact ids for components and stages)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod roots;
pub mod units;

pub use error::{DcError, DcResult};
pub use ids::*;
pub use numeric::*;
pub use roots::{RootOptions, RootResult, find_root};
pub use units::*;
