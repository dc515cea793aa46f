//! Static column schema of the fire-incident dataset.
//!
//! Column names are the canonical (post-cleaning) names. Some carry the
//! source dataset's own misspellings and must stay that way to match.

/// Declared semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Integer,
    Float,
    Text,
}

/// Expected columns and their types.
pub const EXPECTED_COLUMNS: &[(&str, SemanticType)] = &[
    ("incident_number", SemanticType::Text),
    ("exposure_number", SemanticType::Integer),
    ("id", SemanticType::Text),
    ("address", SemanticType::Text),
    ("incident_date", SemanticType::Text),
    ("call_number", SemanticType::Text),
    ("alarm_dttm", SemanticType::Text),
    ("arrival_dttm", SemanticType::Text),
    ("close_dttm", SemanticType::Text),
    ("city", SemanticType::Text),
    ("zipcode", SemanticType::Text),
    ("battalion", SemanticType::Text),
    ("station_area", SemanticType::Text),
    ("box", SemanticType::Text),
    ("suppression_units", SemanticType::Integer),
    ("suppression_personnel", SemanticType::Integer),
    ("ems_units", SemanticType::Integer),
    ("ems_personnel", SemanticType::Integer),
    ("other_units", SemanticType::Integer),
    ("other_personnel", SemanticType::Integer),
    ("first_unit_on_scene", SemanticType::Text),
    ("estimated_property_loss", SemanticType::Float),
    ("estimated_contents_loss", SemanticType::Float),
    ("fire_fatalities", SemanticType::Integer),
    ("fire_injuries", SemanticType::Integer),
    ("civilian_fatalities", SemanticType::Integer),
    ("civilian_injuries", SemanticType::Integer),
    ("number_of_alarms", SemanticType::Integer),
    ("primary_situation", SemanticType::Text),
    ("mutual_aid", SemanticType::Text),
    ("action_taken_primary", SemanticType::Text),
    ("action_taken_secondary", SemanticType::Text),
    ("action_taken_other", SemanticType::Text),
    ("detector_alerted_occupants", SemanticType::Text),
    ("property_use", SemanticType::Text),
    ("area_of_fire_origin", SemanticType::Text),
    ("ignition_cause", SemanticType::Text),
    ("ignition_factor_primary", SemanticType::Text),
    ("ignition_factor_secondary", SemanticType::Text),
    ("heat_source", SemanticType::Text),
    ("item_first_ignited", SemanticType::Text),
    ("human_factors_associated_with_ignition", SemanticType::Text),
    ("structure_type", SemanticType::Text),
    ("structure_status", SemanticType::Text),
    ("floor_of_fire_origin", SemanticType::Integer),
    ("fire_spread", SemanticType::Text),
    ("no_flame_spead", SemanticType::Text),
    ("number_of_floors_with_minimum_damage", SemanticType::Integer),
    ("number_of_floors_with_significant_damage", SemanticType::Integer),
    ("number_of_floors_with_heavy_damage", SemanticType::Integer),
    ("number_of_floors_with_extreme_damage", SemanticType::Integer),
    ("detectors_present", SemanticType::Text),
    ("detector_type", SemanticType::Text),
    ("detector_operation", SemanticType::Text),
    ("detector_effectiveness", SemanticType::Text),
    ("detector_failure_reason", SemanticType::Text),
    ("automatic_extinguishing_system_present", SemanticType::Text),
    ("automatic_extinguishing_sytem_type", SemanticType::Text),
    ("automatic_extinguishing_sytem_perfomance", SemanticType::Text),
    ("automatic_extinguishing_sytem_failure_reason", SemanticType::Text),
    ("number_of_sprinkler_heads_operating", SemanticType::Integer),
    ("supervisor_district", SemanticType::Text),
    ("neighborhood_district", SemanticType::Text),
    ("point", SemanticType::Text),
    ("data_as_of", SemanticType::Text),
    ("data_loaded_at", SemanticType::Text),
];

/// Columns re-rendered in the canonical timestamp layout.
pub const TIMESTAMP_COLUMNS: &[&str] = &[
    "incident_date",
    "alarm_dttm",
    "arrival_dttm",
    "close_dttm",
    "data_as_of",
];

/// Declared type of a canonical column, if it is part of the schema.
#[must_use]
pub fn expected_type(column: &str) -> Option<SemanticType> {
    EXPECTED_COLUMNS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, ty)| *ty)
}

/// Integer count columns that can never legitimately be negative.
pub fn count_columns() -> impl Iterator<Item = &'static str> {
    EXPECTED_COLUMNS
        .iter()
        .filter(|(_, ty)| *ty == SemanticType::Integer)
        .map(|(name, _)| *name)
}
