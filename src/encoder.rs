//! Feature-vector reconstruction.
//!
//! Turns the loosely typed request object into the dense vector the
//! classifier was trained on. Every slot is addressed through the schema's
//! name→position table, so the output is always in schema order and has
//! exactly `schema.len()` entries.

use serde_json::{Map, Value};

use crate::{
    error::ValidationError,
    schema::Schema,
    types::{
        CarriagewayHazard, Weather, CARRIAGEWAY_HAZARD, FLOAT_FIELDS, NUMBER_OF_VEHICLES,
        PREFIXED_FIELDS, WEATHER_CONDITIONS,
    },
};

/// Request body as received: field name → JSON value.
pub type RawInput = Map<String, Value>;

/// Dense feature row aligned to a [`Schema`].
#[derive(Debug, Clone)]
pub struct FeatureVector<'a> {
    schema: &'a Schema,
    values: Vec<f32>,
    defaulted: Vec<(&'static str, String)>,
}

impl<'a> FeatureVector<'a> {
    fn zeros(schema: &'a Schema) -> Self {
        Self {
            schema,
            values: vec![0.0; schema.len()],
            defaulted: Vec::new(),
        }
    }

    /// Sets `column` if the schema has it; returns whether it did.
    fn set(&mut self, column: &str, value: f32) -> bool {
        match self.schema.position(column) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, column: &str) -> Option<f32> {
        self.schema.position(column).map(|i| self.values[i])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (column, value) pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Categorical fields that fell through to their reference category.
    pub fn defaulted(&self) -> &[(&'static str, String)] {
        &self.defaulted
    }

    pub fn nonzero(&self) -> usize {
        self.values.iter().filter(|x| **x != 0.0).count()
    }
}

fn required<'v>(raw: &'v RawInput, field: &'static str) -> Result<&'v Value, ValidationError> {
    raw.get(field).ok_or(ValidationError::MissingField(field))
}

fn parse_float(raw: &RawInput, field: &'static str) -> Result<f64, ValidationError> {
    let v = required(raw, field)?;
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // the row is f32: nan, inf and anything that overflows f32 are rejected
    parsed
        .filter(|x| x.is_finite() && (*x as f32).is_finite())
        .ok_or_else(|| ValidationError::NotNumeric {
            field,
            got: v.to_string(),
        })
}

fn parse_int(raw: &RawInput, field: &'static str) -> Result<i64, ValidationError> {
    let v = required(raw, field)?;
    let parsed = match v {
        Value::Number(n) => n
            .as_i64()
            // floats truncate toward zero
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ValidationError::NotInteger {
        field,
        got: v.to_string(),
    })
}

fn parse_text<'v>(raw: &'v RawInput, field: &'static str) -> Result<&'v str, ValidationError> {
    let v = required(raw, field)?;
    v.as_str().ok_or_else(|| ValidationError::NotText {
        field,
        got: v.to_string(),
    })
}

/// Build the feature row for one request.
///
/// Continuous fields overwrite their same-named columns. Each categorical
/// field derives one candidate column and sets it to 1 when the schema has
/// it; otherwise the field stays all-zero (its reference category). Unknown
/// category values are not errors.
pub fn encode<'a>(raw: &RawInput, schema: &'a Schema) -> Result<FeatureVector<'a>, ValidationError> {
    let mut fv = FeatureVector::zeros(schema);

    for field in FLOAT_FIELDS {
        let x = parse_float(raw, field)?;
        fv.set(field, x as f32);
    }
    let n_vehicles = parse_int(raw, NUMBER_OF_VEHICLES)?;
    fv.set(NUMBER_OF_VEHICLES, n_vehicles as f32);

    // Field order matches the form, so the first missing field is the one reported.
    let day = PREFIXED_FIELDS[0];
    fv.categorical(raw, day.field, |v| Some(day.column(v)))?;

    fv.categorical(raw, WEATHER_CONDITIONS, |v| {
        Weather::parse(v).column().map(str::to_string)
    })?;

    // road type values get rewritten, so anything but text is a client error
    let road = PREFIXED_FIELDS[1];
    let road_value = parse_text(raw, road.field)?;
    fv.one_hot(road.field, road_value, Some(road.column(road_value)));

    for rule in &PREFIXED_FIELDS[2..] {
        fv.categorical(raw, rule.field, |v| Some(rule.column(v)))?;
    }

    fv.categorical(raw, CARRIAGEWAY_HAZARD, |v| {
        CarriagewayHazard::parse(v).column().map(str::to_string)
    })?;

    Ok(fv)
}

impl FeatureVector<'_> {
    /// Non-string values (null, numbers) have no column and read as the reference category.
    fn categorical<F>(
        &mut self,
        raw: &RawInput,
        field: &'static str,
        column: F,
    ) -> Result<(), ValidationError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let v = required(raw, field)?;
        match v.as_str() {
            Some(text) => self.one_hot(field, text, column(text)),
            None => self.one_hot(field, &v.to_string(), None),
        }
        Ok(())
    }

    fn one_hot(&mut self, field: &'static str, value: &str, column: Option<String>) {
        let hit = column.as_deref().is_some_and(|c| self.set(c, 1.0));
        if !hit {
            tracing::debug!(field, value, column = ?column, "category encoded as reference (all zero)");
            self.defaulted.push((field, value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        let cols = [
            "Speed_limit",
            "Hours",
            "Minute",
            "Latitude",
            "Longitude",
            "Number_of_Vehicles",
            "DoW_Monday",
            "DoW_Saturday",
            "DoW_Sunday",
            "Weather_Fog or mist",
            "Weather_Other",
            "Weather_Raining",
            "Weather_Snowing",
            "High_Wind",
            "RT_Dual_carriageway",
            "RT_Single_carriageway",
            "RT_Roundabout",
            "LC_Darkness_lights_lit",
            "LC_Daylight",
            "JD_T_or_staggered_junction",
            "JD_Crossroads",
            "vg_Motorcycle",
            "vg_Goods",
            "CH_No Hazard",
            "CH_Pedestrian in carriageway - not injured",
            "CH_Other_object_on_road",
            "CH_Previous_accident",
            "CH_Vehicle_load_on_road",
        ];
        Schema::new(cols.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn input() -> RawInput {
        let v = json!({
            "Speed_limit": "30",
            "Hours": 17,
            "Minute": "45",
            "Latitude": 51.5072,
            "Longitude": "-0.1276",
            "Number_of_Vehicles": "2",
            "Day_of_Week": "Monday",
            "Weather_Conditions": "Fine",
            "Road_Type": "Single carriageway",
            "Light_Conditions": "Daylight",
            "Junction_Detail": "T_or_staggered_junction",
            "Vehicle_Group": "Car",
            "Carriageway_Hazard": "No Hazard"
        });
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn with(field: &str, value: Value) -> RawInput {
        let mut raw = input();
        raw.insert(field.to_string(), value);
        raw
    }

    fn hot_with_prefix(fv: &FeatureVector, prefix: &str) -> Vec<String> {
        fv.iter()
            .filter(|(c, v)| c.starts_with(prefix) && *v == 1.0)
            .map(|(c, _)| c.to_string())
            .collect()
    }

    #[test]
    fn key_set_equals_schema() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(fv.len(), s.len());
        let names: Vec<&str> = fv.iter().map(|(c, _)| c).collect();
        let expected: Vec<&str> = s.columns().iter().map(String::as_str).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn continuous_values_land_in_their_columns() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(fv.get("Speed_limit"), Some(30.0));
        assert_eq!(fv.get("Hours"), Some(17.0));
        assert_eq!(fv.get("Minute"), Some(45.0));
        assert!((fv.get("Latitude").unwrap() - 51.5072).abs() < 1e-4);
        assert!((fv.get("Longitude").unwrap() + 0.1276).abs() < 1e-4);
        assert_eq!(fv.get("Number_of_Vehicles"), Some(2.0));
        assert_eq!(fv.as_slice()[0], 30.0);
    }

    #[test]
    fn day_of_week_one_hot() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(hot_with_prefix(&fv, "DoW_"), vec!["DoW_Monday"]);
    }

    #[test]
    fn fine_weather_sets_nothing() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert!(hot_with_prefix(&fv, "Weather_").is_empty());
        assert_eq!(fv.get("High_Wind"), Some(0.0));
        assert!(fv.defaulted().iter().any(|(f, v)| *f == "Weather_Conditions" && v == "Fine"));
    }

    #[test]
    fn high_wind_has_no_prefix() {
        let s = schema();
        let fv = encode(&with("Weather_Conditions", json!("High_Wind")), &s).unwrap();
        assert_eq!(fv.get("High_Wind"), Some(1.0));
        assert!(hot_with_prefix(&fv, "Weather_").is_empty());
    }

    #[test]
    fn fog_keeps_its_space() {
        let s = schema();
        let fv = encode(&with("Weather_Conditions", json!("Fog or mist")), &s).unwrap();
        assert_eq!(fv.get("Weather_Fog or mist"), Some(1.0));
    }

    #[test]
    fn no_hazard_keeps_its_space() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(hot_with_prefix(&fv, "CH_"), vec!["CH_No Hazard"]);
    }

    #[test]
    fn other_hazards_use_underscores() {
        let s = schema();
        let fv = encode(&with("Carriageway_Hazard", json!("Previous accident")), &s).unwrap();
        assert_eq!(hot_with_prefix(&fv, "CH_"), vec!["CH_Previous_accident"]);

        let fv = encode(&with("Carriageway_Hazard", json!("Any animal in carriageway")), &s).unwrap();
        assert!(hot_with_prefix(&fv, "CH_").is_empty());
    }

    #[test]
    fn road_type_spaces_become_underscores() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(hot_with_prefix(&fv, "RT_"), vec!["RT_Single_carriageway"]);
    }

    #[test]
    fn light_and_junction_are_not_rewritten() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(hot_with_prefix(&fv, "LC_"), vec!["LC_Daylight"]);
        assert_eq!(hot_with_prefix(&fv, "JD_"), vec!["JD_T_or_staggered_junction"]);

        // a spaced value does not match the underscored column
        let fv = encode(&with("Light_Conditions", json!("Darkness lights lit")), &s).unwrap();
        assert!(hot_with_prefix(&fv, "LC_").is_empty());
    }

    #[test]
    fn unknown_vehicle_group_is_silent_default() {
        let s = schema();
        let fv = encode(&with("Vehicle_Group", json!("Spaceship")), &s).unwrap();
        assert!(hot_with_prefix(&fv, "vg_").is_empty());

        let fv = encode(&with("Vehicle_Group", json!("Motorcycle")), &s).unwrap();
        assert_eq!(hot_with_prefix(&fv, "vg_"), vec!["vg_Motorcycle"]);
    }

    #[test]
    fn exactly_one_hot_per_matched_field() {
        let s = schema();
        let fv = encode(&input(), &s).unwrap();
        // DoW, RT, LC, JD, CH are matched; weather and vehicle are reference
        let ones = fv.iter().filter(|(c, v)| *v == 1.0 && *c != "Number_of_Vehicles").count();
        assert_eq!(ones, 5);
        assert_eq!(fv.defaulted().len(), 2);
    }

    #[test]
    fn continuous_column_absent_from_schema_is_ignored() {
        let s = Schema::new(vec!["Hours".into(), "DoW_Monday".into()]).unwrap();
        let fv = encode(&input(), &s).unwrap();
        assert_eq!(fv.as_slice(), &[17.0, 1.0]);
    }

    #[test]
    fn missing_field_is_validation_error() {
        let s = schema();
        let mut raw = input();
        raw.remove("Speed_limit");
        assert_eq!(
            encode(&raw, &s).unwrap_err(),
            ValidationError::MissingField("Speed_limit")
        );

        let mut raw = input();
        raw.remove("Carriageway_Hazard");
        assert_eq!(
            encode(&raw, &s).unwrap_err(),
            ValidationError::MissingField("Carriageway_Hazard")
        );
    }

    #[test]
    fn non_numeric_is_validation_error() {
        let s = schema();
        let err = encode(&with("Hours", json!("five")), &s).unwrap_err();
        assert!(matches!(err, ValidationError::NotNumeric { field: "Hours", .. }));

        let err = encode(&with("Latitude", Value::Null), &s).unwrap_err();
        assert!(matches!(err, ValidationError::NotNumeric { field: "Latitude", .. }));
    }

    #[test]
    fn vehicle_count_parsing() {
        let s = schema();
        let fv = encode(&with("Number_of_Vehicles", json!(3.9)), &s).unwrap();
        assert_eq!(fv.get("Number_of_Vehicles"), Some(3.0));

        let fv = encode(&with("Number_of_Vehicles", json!(" 4 ")), &s).unwrap();
        assert_eq!(fv.get("Number_of_Vehicles"), Some(4.0));

        let err = encode(&with("Number_of_Vehicles", json!("2.5")), &s).unwrap_err();
        assert!(matches!(err, ValidationError::NotInteger { .. }));
    }

    #[test]
    fn road_type_must_be_text() {
        let s = schema();
        let err = encode(&with("Road_Type", json!(3)), &s).unwrap_err();
        assert!(matches!(err, ValidationError::NotText { field: "Road_Type", .. }));

        let err = encode(&with("Road_Type", Value::Null), &s).unwrap_err();
        assert!(matches!(err, ValidationError::NotText { field: "Road_Type", .. }));
    }

    #[test]
    fn non_text_categories_read_as_reference() {
        let s = schema();
        let fields = [
            ("Day_of_Week", "DoW_"),
            ("Weather_Conditions", "Weather_"),
            ("Light_Conditions", "LC_"),
            ("Junction_Detail", "JD_"),
            ("Vehicle_Group", "vg_"),
            ("Carriageway_Hazard", "CH_"),
        ];
        for (field, prefix) in fields {
            for value in [Value::Null, json!(3), json!(true)] {
                let fv = encode(&with(field, value.clone()), &s)
                    .unwrap_or_else(|e| panic!("{}={} rejected: {}", field, value, e));
                assert!(hot_with_prefix(&fv, prefix).is_empty(), "{}={}", field, value);
                assert!(fv
                    .defaulted()
                    .iter()
                    .any(|(f, v)| *f == field && *v == value.to_string()));
            }
        }
        let fv = encode(&with("Weather_Conditions", Value::Null), &s).unwrap();
        assert_eq!(fv.get("High_Wind"), Some(0.0));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let s = schema();
        for bad in ["nan", "NaN", "inf", "-infinity", "1e300", "-1e39"] {
            let err = encode(&with("Speed_limit", json!(bad)), &s).unwrap_err();
            assert!(
                matches!(err, ValidationError::NotNumeric { field: "Speed_limit", .. }),
                "{} gave {:?}",
                bad,
                err
            );
        }
        let err = encode(&with("Latitude", json!(1e300)), &s).unwrap_err();
        assert!(matches!(err, ValidationError::NotNumeric { field: "Latitude", .. }));

        // largest f32 still fits
        let fv = encode(&with("Hours", json!("3.4e38")), &s).unwrap();
        assert!(fv.get("Hours").unwrap().is_finite());
    }

    #[test]
    fn remaining_weather_mappings() {
        let s = schema();
        for (value, column) in [
            ("Raining", "Weather_Raining"),
            ("Snowing", "Weather_Snowing"),
            ("Other", "Weather_Other"),
        ] {
            let fv = encode(&with("Weather_Conditions", json!(value)), &s).unwrap();
            assert_eq!(hot_with_prefix(&fv, "Weather_"), vec![column]);
            assert_eq!(fv.get("High_Wind"), Some(0.0));
        }
    }

    #[test]
    fn remaining_hazard_mappings() {
        let s = schema();
        for (value, column) in [
            (
                "Pedestrian in carriageway - not injured",
                "CH_Pedestrian in carriageway - not injured",
            ),
            ("Other object on road", "CH_Other_object_on_road"),
            ("Vehicle load on road", "CH_Vehicle_load_on_road"),
        ] {
            let fv = encode(&with("Carriageway_Hazard", json!(value)), &s).unwrap();
            assert_eq!(hot_with_prefix(&fv, "CH_"), vec![column]);
        }
    }
}
