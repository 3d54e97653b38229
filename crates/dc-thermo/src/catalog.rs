//! Built-in component data for common aromatic separations.
//!
//! Antoine constants are the classic mmHg/degC sets rewritten for
//! `ln(P / Pa) = a - b / (T / K + c)`.

use crate::component::{Component, LiquidDensity, VaporPressure};
use crate::error::{ThermoError, ThermoResult};
use crate::table::PropertyTable;

/// Catalog entry: name plus constructor.
pub struct CatalogEntry {
    pub name: &'static str,
    pub formula: &'static str,
    build: fn() -> Component,
}

impl CatalogEntry {
    pub fn component(&self) -> Component {
        (self.build)()
    }
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        name: "benzene",
        formula: "C6H6",
        build: benzene,
    },
    CatalogEntry {
        name: "toluene",
        formula: "C7H8",
        build: toluene,
    },
    CatalogEntry {
        name: "o-xylene",
        formula: "C8H10",
        build: o_xylene,
    },
];

pub fn entries() -> &'static [CatalogEntry] {
    ENTRIES
}

pub fn lookup(name: &str) -> Option<Component> {
    ENTRIES
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .map(CatalogEntry::component)
}

/// Build a table from catalog names, in the given order.
pub fn table_from_names(names: &[&str]) -> ThermoResult<PropertyTable> {
    let components = names
        .iter()
        .map(|name| {
            lookup(name).ok_or_else(|| ThermoError::InvalidTable {
                what: format!("unknown catalog component '{name}'"),
            })
        })
        .collect::<ThermoResult<Vec<_>>>()?;
    PropertyTable::new(components)
}

pub fn benzene_toluene_xylene() -> ThermoResult<PropertyTable> {
    table_from_names(&["benzene", "toluene", "o-xylene"])
}

fn benzene() -> Component {
    Component {
        name: "benzene".into(),
        molecular_weight: 78.11,
        heat_of_vaporization: 33_830.0,
        vapor_pressure: VaporPressure::Antoine {
            a: 20.793_62,
            b: 2_788.507,
            c: -52.36,
        },
        t_min_k: 273.15,
        t_max_k: 473.15,
        liquid_density: LiquidDensity::Constant { kg_per_m3: 876.5 },
        cp_liquid: 136.0,
        cp_vapor: 82.4,
    }
}

fn toluene() -> Component {
    Component {
        name: "toluene".into(),
        molecular_weight: 92.14,
        heat_of_vaporization: 38_010.0,
        vapor_pressure: VaporPressure::Antoine {
            a: 20.906_42,
            b: 3_096.516,
            c: -53.668,
        },
        t_min_k: 273.15,
        t_max_k: 473.15,
        liquid_density: LiquidDensity::Constant { kg_per_m3: 866.9 },
        cp_liquid: 157.3,
        cp_vapor: 103.7,
    }
}

fn o_xylene() -> Component {
    Component {
        name: "o-xylene".into(),
        molecular_weight: 106.17,
        heat_of_vaporization: 43_430.0,
        vapor_pressure: VaporPressure::Antoine {
            a: 21.008_36,
            b: 3_395.574,
            c: -59.464,
        },
        t_min_k: 273.15,
        t_max_k: 473.15,
        liquid_density: LiquidDensity::Constant { kg_per_m3: 880.2 },
        cp_liquid: 187.7,
        cp_vapor: 133.3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_validates() {
        for entry in entries() {
            entry.component().validate().unwrap();
        }
    }

    #[test]
    fn normal_boiling_points_are_ordered() {
        let table = benzene_toluene_xylene().unwrap();
        let p = table.vapor_pressures(383.78).unwrap();
        // toluene boils at ~383.8 K
        assert!((p[1] - 101_325.0).abs() / 101_325.0 < 2e-3);
        assert!(p[0] > p[1] && p[1] > p[2]);
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = table_from_names(&["benzene", "unobtainium"]).unwrap_err();
        assert!(err.to_string().contains("unobtainium"));
    }
}
