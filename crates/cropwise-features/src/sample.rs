//! The seven bounded measurements behind every recommendation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FeatureError, FieldError, FieldErrorKind};

/// Inclusive range of one input field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBounds {
    /// Field name in requests and in the dataset header.
    pub name: &'static str,
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
    /// Unit shown to users.
    pub unit: &'static str,
}

/// Accepted range of every field, in feature order.
pub const FIELD_BOUNDS: [FieldBounds; 7] = [
    FieldBounds { name: "N", min: 0.0, max: 140.0, unit: "kg/ha" },
    FieldBounds { name: "P", min: 5.0, max: 145.0, unit: "kg/ha" },
    FieldBounds { name: "K", min: 5.0, max: 205.0, unit: "kg/ha" },
    FieldBounds { name: "temperature", min: 8.0, max: 44.0, unit: "°C" },
    FieldBounds { name: "humidity", min: 14.0, max: 100.0, unit: "%" },
    FieldBounds { name: "ph", min: 3.5, max: 10.0, unit: "pH" },
    FieldBounds { name: "rainfall", min: 20.0, max: 300.0, unit: "mm" },
];

/// Raw field names in feature order.
pub const RAW_FEATURE_NAMES: [&str; 7] = ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"];

/// Soil and climate measurements for one field.
///
/// Values built through [`CropSample::new`] or [`CropSample::from_json`]
/// are within [`FIELD_BOUNDS`]. Rows read from a training dataset are only
/// checked for finiteness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSample {
    /// Soil nitrogen.
    #[serde(rename = "N")]
    pub n: f64,
    /// Soil phosphorus.
    #[serde(rename = "P")]
    pub p: f64,
    /// Soil potassium.
    #[serde(rename = "K")]
    pub k: f64,
    /// Air temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
    /// Soil pH.
    pub ph: f64,
    /// Rainfall in mm.
    pub rainfall: f64,
}

impl CropSample {
    /// Build a bounds-checked sample.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Validation`] listing every field that is
    /// non-finite or out of range.
    pub fn new(n: f64, p: f64, k: f64, temperature: f64, humidity: f64, ph: f64, rainfall: f64) -> Result<Self, FeatureError> {
        Self::from_array([n, p, k, temperature, humidity, ph, rainfall])
    }

    /// Build a bounds-checked sample from values in [`RAW_FEATURE_NAMES`] order.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Validation`] listing every rejected field.
    pub fn from_array(values: [f64; 7]) -> Result<Self, FeatureError> {
        let errors: Vec<FieldError> = FIELD_BOUNDS
            .iter()
            .zip(values)
            .filter_map(|(bounds, value)| check_bounds(bounds, value).err())
            .collect();
        if !errors.is_empty() {
            return Err(FeatureError::Validation { errors });
        }
        Ok(Self::from_array_unchecked(values))
    }

    /// Build a sample without range checks, for dataset rows.
    #[must_use]
    pub fn from_array_unchecked(values: [f64; 7]) -> Self {
        let [n, p, k, temperature, humidity, ph, rainfall] = values;
        Self { n, p, k, temperature, humidity, ph, rainfall }
    }

    /// Parse and validate a JSON request body.
    ///
    /// Each field may be a number or a numeric string; surrounding
    /// whitespace in strings is ignored. Extra keys are ignored.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::NotAnObject`] | `body` is not a JSON object |
    /// | [`FeatureError::Validation`] | any field is missing, non-numeric, non-finite or out of range |
    pub fn from_json(body: &Value) -> Result<Self, FeatureError> {
        let object = body.as_object().ok_or(FeatureError::NotAnObject)?;
        let mut values = [0.0f64; 7];
        let mut errors = Vec::new();
        for (slot, bounds) in values.iter_mut().zip(&FIELD_BOUNDS) {
            match parse_field(object, bounds.name).and_then(|v| check_bounds(bounds, v)) {
                Ok(v) => *slot = v,
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(FeatureError::Validation { errors });
        }
        Ok(Self::from_array_unchecked(values))
    }

    /// Values in [`RAW_FEATURE_NAMES`] order.
    #[must_use]
    pub fn to_array(&self) -> [f64; 7] {
        [self.n, self.p, self.k, self.temperature, self.humidity, self.ph, self.rainfall]
    }

    /// Values keyed by field name, for echoing back to clients.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        RAW_FEATURE_NAMES
            .iter()
            .zip(self.to_array())
            .map(|(name, v)| ((*name).to_string(), Value::from(v)))
            .collect()
    }
}

fn parse_field(object: &Map<String, Value>, field: &str) -> Result<f64, FieldError> {
    match object.get(field) {
        None => Err(FieldError::new(field, FieldErrorKind::Missing, "Field required")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FieldError::new(field, FieldErrorKind::NotANumber, "Input should be a valid number")),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            FieldError::new(
                field,
                FieldErrorKind::NotANumber,
                "Input should be a valid number, unable to parse string as a number",
            )
        }),
        Some(_) => Err(FieldError::new(field, FieldErrorKind::NotANumber, "Input should be a valid number")),
    }
}

fn check_bounds(bounds: &FieldBounds, value: f64) -> Result<f64, FieldError> {
    if !value.is_finite() {
        return Err(FieldError::new(bounds.name, FieldErrorKind::NotFinite, "Input should be a finite number"));
    }
    if value < bounds.min {
        return Err(FieldError::new(
            bounds.name,
            FieldErrorKind::BelowMin,
            format!("Input should be greater than or equal to {}", bounds.min),
        ));
    }
    if value > bounds.max {
        return Err(FieldError::new(
            bounds.name,
            FieldErrorKind::AboveMax,
            format!("Input should be less than or equal to {}", bounds.max),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rice() -> Value {
        json!({"N": 90, "P": 42, "K": 43, "temperature": 20.88, "humidity": 82.0, "ph": 6.5, "rainfall": 202.9})
    }

    fn field_errors(err: FeatureError) -> Vec<FieldError> {
        match err {
            FeatureError::Validation { errors } => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn parses_valid_body() {
        let sample = CropSample::from_json(&rice()).unwrap();
        assert_eq!(sample.n, 90.0);
        assert_eq!(sample.rainfall, 202.9);
        assert_eq!(sample.to_map()["ph"], json!(6.5));
    }

    #[test]
    fn accepts_trimmed_numeric_strings() {
        let mut body = rice();
        body["ph"] = json!("  6.8 ");
        body["N"] = json!("0");
        let sample = CropSample::from_json(&body).unwrap();
        assert_eq!(sample.ph, 6.8);
        assert_eq!(sample.n, 0.0);
    }

    #[test]
    fn bounds_are_inclusive() {
        let lo: Vec<f64> = FIELD_BOUNDS.iter().map(|b| b.min).collect();
        let hi: Vec<f64> = FIELD_BOUNDS.iter().map(|b| b.max).collect();
        assert!(CropSample::from_array(lo.try_into().unwrap()).is_ok());
        assert!(CropSample::from_array(hi.try_into().unwrap()).is_ok());
    }

    #[test]
    fn collects_every_failure() {
        let body = json!({"N": 141, "P": "abc", "K": null, "temperature": 7.9, "humidity": 50, "ph": 6.5});
        let errors = field_errors(CropSample::from_json(&body).unwrap_err());
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["N", "P", "K", "temperature", "rainfall"]);
        assert_eq!(errors[0].message, "Input should be less than or equal to 140");
        assert_eq!(errors[1].kind, FieldErrorKind::NotANumber);
        assert_eq!(errors[2].message, "Input should be a valid number");
        assert_eq!(errors[3].message, "Input should be greater than or equal to 8");
        assert_eq!(errors[4].message, "Field required");
    }

    #[test]
    fn ph_lower_bound_keeps_fraction() {
        let err = CropSample::new(50.0, 50.0, 50.0, 25.0, 70.0, 3.4, 100.0).unwrap_err();
        assert_eq!(field_errors(err)[0].message, "Input should be greater than or equal to 3.5");
    }

    #[test]
    fn non_finite_rejected() {
        let mut body = rice();
        body["humidity"] = json!("NaN");
        let errors = field_errors(CropSample::from_json(&body).unwrap_err());
        assert_eq!(errors[0].kind, FieldErrorKind::NotFinite);
    }

    #[test]
    fn non_object_rejected() {
        assert!(matches!(CropSample::from_json(&json!([1, 2])).unwrap_err(), FeatureError::NotAnObject));
    }

    #[test]
    fn serde_uses_request_field_names() {
        let sample = CropSample::from_json(&rice()).unwrap();
        let value = serde_json::to_value(sample).unwrap();
        assert_eq!(value["N"], json!(90.0));
        assert!(value.get("n").is_none());
    }
}
