//! State-year panel rows and the versioned field schema
//!
//! The panel is owned by the ingestion collaborator; the engine only reads
//! named numeric fields from it. Field names and the notification fallback
//! order are part of the contract and are listed here, not sniffed from
//! whatever columns happen to exist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};

/// One state x year row of raw panel indicators
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateYearRecord {
    pub state: String,
    pub year: Option<i32>,
    values: BTreeMap<String, f64>,
}

impl StateYearRecord {
    /// Create a row with no values
    #[must_use]
    pub fn new(state: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            state: state.into(),
            year,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter for a numeric field
    #[must_use]
    pub fn with(mut self, field: &str, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Set a numeric field; non-finite values are stored as absent
    pub fn set(&mut self, field: &str, value: f64) {
        if value.is_finite() {
            self.values.insert(field.to_string(), value);
        } else {
            self.values.remove(field);
        }
    }

    /// Value of a field, `None` when absent
    #[must_use]
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// First present value along a fallback chain of fields
    #[must_use]
    pub fn get_first(&self, fields: &[&str]) -> Option<f64> {
        fields.iter().find_map(|f| self.get(f))
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Names of all present fields
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Named panel fields read by the proxy feature builder
pub mod fields {
    pub const POPULATION: &str = "census_population";
    pub const HOUSEHOLDS: &str = "census_households";
    pub const NOTIFIED_2025: &str = "india_tb_notifications_2025_total_notified_2025";
    pub const NOTIFIED_2024: &str = "india_tb_reports_2024__tb_patients_notified";
    pub const NOTIFIED_2023: &str = "india_tb_reports_2023__tb_patients_notified";
    pub const TB_DEATHS: &str = "india_tb_reports_tb_deaths__2024_january_to_october";
    pub const TREATED_SUCCESSFULLY_2023: &str = "india_tb_reports_2023__treated_successfully";
    pub const IMPROVED_SANITATION_PCT: &str =
        "nfhs_population_living_in_households_that_use_an_improved_sanitation_facility2_(%)";
    pub const ASSET_HOUSEHOLDS: &str =
        "census_households_with_tv_computer_laptop_telephone_mobile_phone_and_scooter_car";
    pub const LITERACY_PCT: &str = "census_literacy_rate_pct";
    pub const CLEAN_FUEL_PCT: &str = "nfhs_households_using_clean_fuel_for_cooking3_(%)";
}

/// Versioned description of the panel fields the engine reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSchema {
    pub version: String,
    /// Notification counts, most recent vintage first
    pub notification_chain: Vec<String>,
    /// Fields that must be present for at least one row
    pub required: Vec<String>,
}

impl Default for PanelSchema {
    fn default() -> Self {
        Self {
            version: "2025.1".to_string(),
            notification_chain: vec![
                fields::NOTIFIED_2025.to_string(),
                fields::NOTIFIED_2024.to_string(),
                fields::NOTIFIED_2023.to_string(),
            ],
            required: vec![fields::POPULATION.to_string(), fields::HOUSEHOLDS.to_string()],
        }
    }
}

impl PanelSchema {
    /// Fail with [`SynthesisError::MissingFeature`] if a required field is
    /// absent from every row
    pub fn check_required(&self, panel: &[StateYearRecord]) -> Result<()> {
        for field in &self.required {
            if !panel.iter().any(|row| row.has(field)) {
                return Err(SynthesisError::MissingFeature {
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Notification count of a row following the fallback chain
    #[must_use]
    pub fn notifications(&self, row: &StateYearRecord) -> Option<f64> {
        self.notification_chain.iter().find_map(|f| row.get(f))
    }
}
