use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::types::UnitId;

/// A registered boat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UnitInfo {
    #[schema(value_type = String)]
    pub id: UnitId,
    pub name: String,
    #[serde(default)]
    pub registration_number: Option<String>,
}

/// Known units, keyed by id. An empty registry places no restriction on the live feed.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: HashMap<UnitId, UnitInfo>,
}

impl UnitRegistry {
    pub fn new(units: impl IntoIterator<Item = UnitInfo>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn accepts(&self, unit_id: &str) -> bool {
        self.units.is_empty() || self.units.contains_key(unit_id)
    }

    pub fn name(&self, unit_id: &str) -> Option<&str> {
        self.units.get(unit_id).map(|u| u.name.as_str())
    }

    pub fn get(&self, unit_id: &str) -> Option<&UnitInfo> {
        self.units.get(unit_id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
