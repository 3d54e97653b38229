//! dc-thermo: component properties and phase equilibrium for distilcol.
//!
//! Provides:
//! - Component constants, vapor-pressure and density correlations
//! - Validated property tables and a small built-in catalog
//! - Compositions and immutable stream snapshots
//! - Activity models (ideal, NRTL) behind the `ActivityModel` trait
//! - Equilibrium engine: K-values, bubble/dew points, Rachford-Rice,
//!   liquid-liquid stability and split, vapor-liquid-liquid flash
//!
//! Every calculation takes the `PropertyPackage` explicitly; nothing here
//! holds global or mutable state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dc_core::units::pa;
//! use dc_thermo::{Composition, PropertyPackage, bubble_point, catalog};
//!
//! let table = Arc::new(catalog::benzene_toluene_xylene().unwrap());
//! let package = PropertyPackage::ideal(table);
//! let feed = Composition::new(vec![0.5, 0.3, 0.2]).unwrap();
//! let bubble = bubble_point(&package, &feed, pa(101_325.0)).unwrap();
//! println!("Bubble point: {:.2} K", bubble.temperature.value);
//! ```

pub mod activity;
pub mod bubble_dew;
pub mod catalog;
pub mod component;
pub mod composition;
pub mod enthalpy;
pub mod equilibrium;
pub mod error;
pub mod flash;
pub mod jacobian;
pub mod multiphase;
pub mod newton;
pub mod package;
pub mod stability;
pub mod state;
pub mod table;

pub use activity::{ActivityModel, IdealSolution, Nrtl};
pub use bubble_dew::{SaturationPoint, bubble_point, dew_point};
pub use component::{Component, LiquidDensity, VaporPressure};
pub use composition::{COMPOSITION_EPSILON, Composition};
pub use equilibrium::{EquilibriumResult, equilibrate, equilibrate_single_liquid};
pub use error::{ThermoError, ThermoResult};
pub use flash::{
    FixedFractionFlash, FlashOutcome, FlashSplit, fixed_fraction_flash, isothermal_flash,
    isothermal_flash_from, rachford_rice, rachford_rice_residual,
};
pub use multiphase::{PhaseAmount, PhaseEquilibrium, multiphase_flash};
pub use package::PropertyPackage;
pub use stability::{LiquidSplit, StabilityResult, find_liquid_split, liquid_stability};
pub use state::{MixtureState, Phase};
pub use table::PropertyTable;
