//! Property table plus liquid activity model.

use crate::activity::{ActivityModel, IdealSolution};
use crate::error::{ThermoError, ThermoResult};
use crate::table::PropertyTable;
use std::sync::Arc;

/// Everything the equilibrium engine needs besides the state itself.
///
/// Cheap to clone; both halves are shared read-only.
#[derive(Debug, Clone)]
pub struct PropertyPackage {
    table: Arc<PropertyTable>,
    activity: Arc<dyn ActivityModel>,
}

impl PropertyPackage {
    /// Raoult's law package.
    pub fn ideal(table: Arc<PropertyTable>) -> Self {
        Self {
            table,
            activity: Arc::new(IdealSolution),
        }
    }

    pub fn new(table: Arc<PropertyTable>, activity: Arc<dyn ActivityModel>) -> ThermoResult<Self> {
        if let Some(n) = activity.component_count()
            && n != table.len()
        {
            return Err(ThermoError::InvalidTable {
                what: format!(
                    "{} model covers {n} components, table has {}",
                    activity.name(),
                    table.len()
                ),
            });
        }
        Ok(Self { table, activity })
    }

    pub fn table(&self) -> &PropertyTable {
        &self.table
    }

    pub fn shared_table(&self) -> Arc<PropertyTable> {
        Arc::clone(&self.table)
    }

    pub fn activity(&self) -> &dyn ActivityModel {
        self.activity.as_ref()
    }

    pub fn component_count(&self) -> usize {
        self.table.len()
    }

    pub fn is_ideal(&self) -> bool {
        self.activity.is_ideal()
    }
}
