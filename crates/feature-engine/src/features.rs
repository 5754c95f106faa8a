//! Feature Vector Assembly

use data_validator::{parse_decimal, ValidationConfig, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Number of features the model was fitted with
pub const FEATURE_DIMENSION: usize = 9;

/// Biomechanical measurement, in canonical model order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Hip flexion angle
    HipFlexionAngle,
    /// Knee flexion angle
    KneeFlexionAngle,
    /// Hip adduction angle
    HipAdductionAngle,
    /// Knee valgus angle
    KneeValgusAngle,
    /// Ankle valgus angle
    AnkleValgusAngle,
    /// Knee valgus moment
    KneeValgusMoment,
    /// Knee flexion moment
    KneeFlexionMoment,
    /// Anterior tibial shear force
    AnteriorTibialShearForce,
    /// Hamstring to quadriceps ratio
    HamstringQuadricepsRatio,
}

impl Feature {
    /// All features in canonical order
    pub const ALL: [Feature; FEATURE_DIMENSION] = [
        Feature::HipFlexionAngle,
        Feature::KneeFlexionAngle,
        Feature::HipAdductionAngle,
        Feature::KneeValgusAngle,
        Feature::AnkleValgusAngle,
        Feature::KneeValgusMoment,
        Feature::KneeFlexionMoment,
        Feature::AnteriorTibialShearForce,
        Feature::HamstringQuadricepsRatio,
    ];

    /// Position in the model's input vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Feature at a canonical position
    pub fn from_index(index: usize) -> Option<Feature> {
        Self::ALL.get(index).copied()
    }

    /// Full label as shown next to the input field
    pub fn label(&self) -> &'static str {
        match self {
            Feature::HipFlexionAngle => "Hip Flexion Angle(HFA)",
            Feature::KneeFlexionAngle => "Knee Flexion Angle(KFA)",
            Feature::HipAdductionAngle => "Hip Adduction Angle(HAA)",
            Feature::KneeValgusAngle => "Knee Valgus Angle(KVA)",
            Feature::AnkleValgusAngle => "Ankle Valgus Angle(AVA)",
            Feature::KneeValgusMoment => "Knee Valgus Moment(KVM)",
            Feature::KneeFlexionMoment => "Knee Flexion moment(KFM)",
            Feature::AnteriorTibialShearForce => "Anterior Tibial Shear Force(ASF)",
            Feature::HamstringQuadricepsRatio => "Hamstring/Quadriceps(H/Q)",
        }
    }

    /// Abbreviation used on charts
    pub fn short_name(&self) -> &'static str {
        match self {
            Feature::HipFlexionAngle => "HFA",
            Feature::KneeFlexionAngle => "KFA",
            Feature::HipAdductionAngle => "HAA",
            Feature::KneeValgusAngle => "KVA",
            Feature::AnkleValgusAngle => "AVA",
            Feature::KneeValgusMoment => "KVM",
            Feature::KneeFlexionMoment => "KFM",
            Feature::AnteriorTibialShearForce => "ASF",
            Feature::HamstringQuadricepsRatio => "H/Q",
        }
    }

    /// Stable lowercase key for form fields and JSON objects
    pub fn key(&self) -> &'static str {
        match self {
            Feature::HipFlexionAngle => "hfa",
            Feature::KneeFlexionAngle => "kfa",
            Feature::HipAdductionAngle => "haa",
            Feature::KneeValgusAngle => "kva",
            Feature::AnkleValgusAngle => "ava",
            Feature::KneeValgusMoment => "kvm",
            Feature::KneeFlexionMoment => "kfm",
            Feature::AnteriorTibialShearForce => "asf",
            Feature::HamstringQuadricepsRatio => "hq",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Validated feature vector for one inference request.
///
/// Always holds exactly [`FEATURE_DIMENSION`] finite values in canonical
/// order; there is no way to build one otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: [f64; FEATURE_DIMENSION],
}

impl FeatureVector {
    fn validator() -> Validator {
        Validator::new(ValidationConfig::strict(FEATURE_DIMENSION))
    }

    /// Build from raw values in canonical order
    pub fn from_slice(values: &[f64]) -> Result<Self, ValidationError> {
        let names: Vec<&str> = Feature::ALL.iter().map(|f| f.short_name()).collect();
        Self::validator().validate(values, &names)?;

        let mut out = [0.0; FEATURE_DIMENSION];
        out.copy_from_slice(values);
        Ok(Self { values: out })
    }

    /// Build from text fields, looked up by feature.
    ///
    /// `field` returns the raw text typed for a feature, or `None` when the
    /// field was not submitted.
    pub fn parse_fields<'a, F>(mut field: F) -> Result<Self, ValidationError>
    where
        F: FnMut(Feature) -> Option<&'a str>,
    {
        let mut values = [0.0; FEATURE_DIMENSION];
        for feature in Feature::ALL {
            let text = field(feature)
                .ok_or_else(|| ValidationError::MissingField(feature.short_name().to_string()))?;
            values[feature.index()] = parse_decimal(feature.short_name(), text)?;
        }

        debug!("Parsed feature fields: {:?}", values);
        Self::from_slice(&values)
    }

    /// All-zero vector (the form's initial state)
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_DIMENSION],
        }
    }

    /// Values in canonical order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of one feature
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// Copy with one feature replaced.
    ///
    /// The replacement must be finite.
    pub fn with(&self, feature: Feature, value: f64) -> Result<Self, ValidationError> {
        Self::validator().validate_value(feature.short_name(), value)?;
        let mut values = self.values;
        values[feature.index()] = value;
        Ok(Self { values })
    }

    /// Iterate `(feature, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(move |f| (f, self.values[f.index()]))
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = ValidationError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        Self::from_slice(values)
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values = Vec::<f64>::deserialize(deserializer)?;
        Self::from_slice(&values).map_err(serde::de::Error::custom)
    }
}
