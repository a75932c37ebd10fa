//! Köppen-Geiger climate classification against a loaded raster

pub mod raster;

use serde::Serialize;

use crate::models::Coordinate;
pub use raster::{GridGeometry, RasterGrid, load_raster};

pub const UNKNOWN_CLIMATE: &str = "Unknown";

/// Köppen-Geiger legend, indexed by `code - 1`
const KOPPEN_CLASSES: [&str; 30] = [
    "Af (Tropical, rainforest)",
    "Am (Tropical, monsoon)",
    "Aw (Tropical, savannah)",
    "BWh (Arid, desert, hot)",
    "BWk (Arid, desert, cold)",
    "BSh (Arid, steppe, hot)",
    "BSk (Arid, steppe, cold)",
    "Csa (Temperate, dry summer, hot summer)",
    "Csb (Temperate, dry summer, warm summer)",
    "Csc (Temperate, dry summer, cold summer)",
    "Cwa (Temperate, dry winter, hot summer)",
    "Cwb (Temperate, dry winter, warm summer)",
    "Cwc (Temperate, dry winter, cold summer)",
    "Cfa (Temperate, no dry season, hot summer)",
    "Cfb (Temperate, no dry season, warm summer)",
    "Cfc (Temperate, no dry season, cold summer)",
    "Dsa (Cold, dry summer, hot summer)",
    "Dsb (Cold, dry summer, warm summer)",
    "Dsc (Cold, dry summer, cold summer)",
    "Dsd (Cold, dry summer, very cold winter)",
    "Dwa (Cold, dry winter, hot summer)",
    "Dwb (Cold, dry winter, warm summer)",
    "Dwc (Cold, dry winter, cold summer)",
    "Dwd (Cold, dry winter, very cold winter)",
    "Dfa (Cold, no dry season, hot summer)",
    "Dfb (Cold, no dry season, warm summer)",
    "Dfc (Cold, no dry season, cold summer)",
    "Dfd (Cold, no dry season, very cold winter)",
    "ET (Polar, tundra)",
    "EF (Polar, frost)",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClimateClassification {
    pub code: Option<i32>,
    pub name: String,
}

impl ClimateClassification {
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            code: None,
            name: UNKNOWN_CLIMATE.to_string(),
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            name: climate_name(code),
        }
    }
}

/// Label for a raster code; codes outside the legend become `"Code N"`
#[must_use]
pub fn climate_name(code: i32) -> String {
    usize::try_from(code)
        .ok()
        .and_then(|c| c.checked_sub(1))
        .and_then(|i| KOPPEN_CLASSES.get(i))
        .map_or_else(|| format!("Code {code}"), |name| (*name).to_string())
}

/// Classify `coordinate`. A missing grid, an out-of-bounds cell and a
/// no-data cell all yield `Unknown`.
#[must_use]
pub fn classify(coordinate: Coordinate, grid: Option<&RasterGrid>) -> ClimateClassification {
    grid.and_then(|g| g.lookup(coordinate))
        .map_or_else(ClimateClassification::unknown, ClimateClassification::from_code)
}
