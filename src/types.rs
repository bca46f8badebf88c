use serde::Serialize;

// ---------- Request field names ----------

pub const SPEED_LIMIT: &str = "Speed_limit";
pub const HOURS: &str = "Hours";
pub const MINUTE: &str = "Minute";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";
pub const NUMBER_OF_VEHICLES: &str = "Number_of_Vehicles";

pub const DAY_OF_WEEK: &str = "Day_of_Week";
pub const WEATHER_CONDITIONS: &str = "Weather_Conditions";
pub const ROAD_TYPE: &str = "Road_Type";
pub const LIGHT_CONDITIONS: &str = "Light_Conditions";
pub const JUNCTION_DETAIL: &str = "Junction_Detail";
pub const VEHICLE_GROUP: &str = "Vehicle_Group";
pub const CARRIAGEWAY_HAZARD: &str = "Carriageway_Hazard";

/// Continuous fields parsed as floats; each column shares the field's name.
pub const FLOAT_FIELDS: [&str; 5] = [SPEED_LIMIT, HOURS, MINUTE, LATITUDE, LONGITUDE];

// ---------- Closed categorical vocabularies ----------

/// Weather as seen by the model. `Fine` is the reference category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Fine,
    FogOrMist,
    HighWind,
    Raining,
    Snowing,
    Other,
}

impl Weather {
    /// Anything unrecognized collapses to the reference category.
    pub fn parse(s: &str) -> Self {
        match s {
            "Fog or mist" => Weather::FogOrMist,
            "High_Wind" => Weather::HighWind,
            "Raining" => Weather::Raining,
            "Snowing" => Weather::Snowing,
            "Other" => Weather::Other,
            _ => Weather::Fine,
        }
    }

    pub fn column(&self) -> Option<&'static str> {
        match self {
            Weather::Fine => None,
            Weather::FogOrMist => Some("Weather_Fog or mist"),
            // trained as its own flag, no Weather_ prefix
            Weather::HighWind => Some("High_Wind"),
            Weather::Raining => Some("Weather_Raining"),
            Weather::Snowing => Some("Weather_Snowing"),
            Weather::Other => Some("Weather_Other"),
        }
    }
}

/// Carriageway hazard. Unlisted values fall into `Reference` (all zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarriagewayHazard {
    NoHazard,
    PedestrianNotInjured,
    OtherObjectOnRoad,
    PreviousAccident,
    VehicleLoadOnRoad,
    Reference,
}

impl CarriagewayHazard {
    pub fn parse(s: &str) -> Self {
        match s {
            "No Hazard" => CarriagewayHazard::NoHazard,
            "Pedestrian in carriageway - not injured" => CarriagewayHazard::PedestrianNotInjured,
            "Other object on road" => CarriagewayHazard::OtherObjectOnRoad,
            "Previous accident" => CarriagewayHazard::PreviousAccident,
            "Vehicle load on road" => CarriagewayHazard::VehicleLoadOnRoad,
            _ => CarriagewayHazard::Reference,
        }
    }

    /// The first two keep their spaces; the schema was built that way.
    pub fn column(&self) -> Option<&'static str> {
        match self {
            CarriagewayHazard::NoHazard => Some("CH_No Hazard"),
            CarriagewayHazard::PedestrianNotInjured => {
                Some("CH_Pedestrian in carriageway - not injured")
            }
            CarriagewayHazard::OtherObjectOnRoad => Some("CH_Other_object_on_road"),
            CarriagewayHazard::PreviousAccident => Some("CH_Previous_accident"),
            CarriagewayHazard::VehicleLoadOnRoad => Some("CH_Vehicle_load_on_road"),
            CarriagewayHazard::Reference => None,
        }
    }
}

/// Open-vocabulary categorical field: column is `prefix + value`, optionally
/// with spaces turned into underscores. Values without a schema column are
/// the field's reference category.
#[derive(Debug, Clone, Copy)]
pub struct PrefixedField {
    pub field: &'static str,
    pub prefix: &'static str,
    pub underscore_spaces: bool,
}

impl PrefixedField {
    pub fn column(&self, value: &str) -> String {
        if self.underscore_spaces {
            format!("{}{}", self.prefix, value.replace(' ', "_"))
        } else {
            format!("{}{}", self.prefix, value)
        }
    }
}

pub const PREFIXED_FIELDS: [PrefixedField; 5] = [
    PrefixedField { field: DAY_OF_WEEK, prefix: "DoW_", underscore_spaces: false },
    PrefixedField { field: ROAD_TYPE, prefix: "RT_", underscore_spaces: true },
    PrefixedField { field: LIGHT_CONDITIONS, prefix: "LC_", underscore_spaces: false },
    PrefixedField { field: JUNCTION_DETAIL, prefix: "JD_", underscore_spaces: false },
    // "Car" has no column and reads as all zeros
    PrefixedField { field: VEHICLE_GROUP, prefix: "vg_", underscore_spaces: false },
];

// ---------- Prediction output ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Slight,
    Serious,
    Fatal,
    Unknown,
}

impl Severity {
    pub fn from_class(class: i64) -> Self {
        match class {
            1 => Severity::Slight,
            2 => Severity::Serious,
            3 => Severity::Fatal,
            _ => Severity::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Slight => "Slight",
            Severity::Serious => "Serious",
            Severity::Fatal => "Fatal",
            Severity::Unknown => "Unknown",
        }
    }
}

/// Response body for a successful `/predict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOut {
    pub prediction: i64,
    pub prediction_label: String,
}

impl PredictionOut {
    pub fn from_class(class: i64) -> Self {
        Self {
            prediction: class,
            prediction_label: Severity::from_class(class).label().to_string(),
        }
    }
}
