//! Pure-component physical constants and correlations.

use crate::error::{ThermoError, ThermoResult};
use dc_core::units::constants::R_GAS;

/// Vapor-pressure correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum VaporPressure {
    /// `ln(P / Pa) = a - b / (T / K + c)`
    Antoine { a: f64, b: f64, c: f64 },
    /// Integrated Clausius-Clapeyron anchored at `(t_ref_k, p_ref_pa)`,
    /// using the component's heat of vaporization as a constant slope.
    ClausiusClapeyron { p_ref_pa: f64, t_ref_k: f64 },
}

/// Liquid density correlation.
#[derive(Debug, Clone, PartialEq)]
pub enum LiquidDensity {
    Constant { kg_per_m3: f64 },
    /// DIPPR 105: `rho [kmol/m3] = a / b^(1 + (1 - T/c)^d)`
    Dippr105 { a: f64, b: f64, c: f64, d: f64 },
}

/// Physical constants of one chemical species.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    /// g/mol
    pub molecular_weight: f64,
    /// J/mol at the enthalpy reference temperature
    pub heat_of_vaporization: f64,
    pub vapor_pressure: VaporPressure,
    /// Lower end of the vapor-pressure validity range, K
    pub t_min_k: f64,
    /// Upper end of the vapor-pressure validity range, K
    pub t_max_k: f64,
    pub liquid_density: LiquidDensity,
    /// J/(mol K)
    pub cp_liquid: f64,
    /// J/(mol K)
    pub cp_vapor: f64,
}

impl Component {
    /// Saturation pressure in Pa. Callers check the validity range.
    pub fn vapor_pressure_pa(&self, t_k: f64) -> f64 {
        match self.vapor_pressure {
            VaporPressure::Antoine { a, b, c } => (a - b / (t_k + c)).exp(),
            VaporPressure::ClausiusClapeyron { p_ref_pa, t_ref_k } => {
                p_ref_pa
                    * (-self.heat_of_vaporization / R_GAS * (1.0 / t_k - 1.0 / t_ref_k)).exp()
            }
        }
    }

    pub fn in_range(&self, t_k: f64) -> bool {
        t_k >= self.t_min_k && t_k <= self.t_max_k
    }

    /// Liquid density in kg/m3.
    pub fn liquid_density_kg_m3(&self, t_k: f64) -> f64 {
        match self.liquid_density {
            LiquidDensity::Constant { kg_per_m3 } => kg_per_m3,
            LiquidDensity::Dippr105 { a, b, c, d } => {
                let tau = (1.0 - t_k / c).max(0.0);
                // kmol/m3 times kg/kmol
                a / b.powf(1.0 + tau.powf(d)) * self.molecular_weight
            }
        }
    }

    pub fn validate(&self) -> ThermoResult<()> {
        let bad = |what: &'static str| ThermoError::InvalidProperty {
            component: self.name.clone(),
            what,
        };

        if self.name.trim().is_empty() {
            return Err(bad("empty name"));
        }
        if !(self.molecular_weight.is_finite() && self.molecular_weight > 0.0) {
            return Err(bad("molecular weight must be positive"));
        }
        if !(self.heat_of_vaporization.is_finite() && self.heat_of_vaporization > 0.0) {
            return Err(bad("heat of vaporization must be positive"));
        }
        if !(self.cp_liquid.is_finite() && self.cp_liquid > 0.0) {
            return Err(bad("liquid heat capacity must be positive"));
        }
        if !(self.cp_vapor.is_finite() && self.cp_vapor > 0.0) {
            return Err(bad("vapor heat capacity must be positive"));
        }
        if !(self.t_min_k.is_finite() && self.t_max_k.is_finite() && self.t_min_k > 0.0) {
            return Err(bad("validity range must be finite and positive"));
        }
        if self.t_min_k >= self.t_max_k {
            return Err(bad("validity range is empty"));
        }

        match self.vapor_pressure {
            VaporPressure::Antoine { a, b, c } => {
                if !(a.is_finite() && b.is_finite() && c.is_finite()) {
                    return Err(bad("non-finite Antoine coefficient"));
                }
                if self.t_min_k + c <= 0.0 {
                    return Err(bad("Antoine pole inside validity range"));
                }
            }
            VaporPressure::ClausiusClapeyron { p_ref_pa, t_ref_k } => {
                if !(p_ref_pa.is_finite() && p_ref_pa > 0.0 && t_ref_k.is_finite() && t_ref_k > 0.0)
                {
                    return Err(bad("Clausius-Clapeyron anchor must be positive"));
                }
            }
        }

        // Positive and strictly increasing over the stated range.
        const SAMPLES: usize = 32;
        let mut last = 0.0;
        for i in 0..=SAMPLES {
            let t = self.t_min_k + (self.t_max_k - self.t_min_k) * i as f64 / SAMPLES as f64;
            let p = self.vapor_pressure_pa(t);
            if !(p.is_finite() && p > 0.0) {
                return Err(bad("vapor pressure not positive over validity range"));
            }
            if i > 0 && p <= last {
                return Err(bad("vapor pressure not increasing over validity range"));
            }
            last = p;
        }

        for t in [self.t_min_k, self.t_max_k] {
            let rho = self.liquid_density_kg_m3(t);
            if !(rho.is_finite() && rho > 0.0) {
                return Err(bad("liquid density must be positive"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> Component {
        Component {
            name: "light".into(),
            molecular_weight: 78.11,
            heat_of_vaporization: 30_000.0,
            vapor_pressure: VaporPressure::ClausiusClapeyron {
                p_ref_pa: 101_325.0,
                t_ref_k: 350.0,
            },
            t_min_k: 250.0,
            t_max_k: 500.0,
            liquid_density: LiquidDensity::Constant { kg_per_m3: 800.0 },
            cp_liquid: 140.0,
            cp_vapor: 90.0,
        }
    }

    #[test]
    fn clausius_clapeyron_passes_through_anchor() {
        let c = light();
        assert!((c.vapor_pressure_pa(350.0) - 101_325.0).abs() < 1e-6);
        assert!(c.vapor_pressure_pa(360.0) > 101_325.0);
    }

    #[test]
    fn antoine_in_natural_log_pascal_form() {
        let mut c = light();
        c.vapor_pressure = VaporPressure::Antoine {
            a: 20.79362,
            b: 2788.507,
            c: -52.36,
        };
        // benzene normal boiling point
        let p = c.vapor_pressure_pa(353.25);
        assert!((p - 101_325.0).abs() / 101_325.0 < 1e-3);
        c.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_data() {
        let mut c = light();
        c.molecular_weight = 0.0;
        assert!(c.validate().is_err());

        let mut c = light();
        c.t_min_k = 600.0;
        assert!(c.validate().is_err());

        let mut c = light();
        c.vapor_pressure = VaporPressure::Antoine {
            a: 20.0,
            b: -100.0,
            c: 0.0,
        };
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("increasing"));
    }

    #[test]
    fn dippr_density_is_mass_based() {
        let mut c = light();
        c.liquid_density = LiquidDensity::Dippr105 {
            a: 1.0259,
            b: 0.266_66,
            c: 562.05,
            d: 0.283_94,
        };
        let rho = c.liquid_density_kg_m3(298.15);
        assert!(rho > 800.0 && rho < 950.0, "rho = {rho}");
    }
}
