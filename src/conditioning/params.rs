//! Method parameters: values, declared schemas and validation.
//!
//! Callers pass a sorted `name → value` map; every method declares a static
//! schema of `ParamSpec`s. Validation rejects unknown names, values of the
//! wrong kind, numbers outside the declared range and strings outside the
//! declared options. Missing entries take the schema default.
use crate::error::ConditioningError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<f64>),
}

impl ParamValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Canonical text used for cache-key hashing.
    pub(crate) fn canonical(&self) -> String {
        match self {
            Self::Bool(v) => format!("b:{v}"),
            Self::Int(v) => format!("i:{v}"),
            Self::Float(v) => format!("f:{v:?}"),
            Self::Str(v) => format!("s:{v}"),
            Self::List(v) => format!("l:{v:?}"),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::List(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        Self::List(v)
    }
}

/// Sorted parameter map; ordering keeps key derivation deterministic.
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    /// String restricted to `options`.
    Choice,
    FloatList,
}

/// Declared parameter: name, kind, default, inclusive numeric range and
/// string options.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub options: &'static [&'static str],
}

impl ParamSpec {
    pub fn int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
            default: ParamValue::Int(default),
            range: Some((min as f64, max as f64)),
            options: &[],
        }
    }

    pub fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            range: Some((min, max)),
            options: &[],
        }
    }

    pub fn flag(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: ParamValue::Bool(default),
            range: None,
            options: &[],
        }
    }

    pub fn choice(name: &'static str, default: &'static str, options: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: ParamKind::Choice,
            default: ParamValue::Str(default.to_string()),
            range: None,
            options,
        }
    }

    /// List of floats; `range` bounds every element.
    pub fn float_list(name: &'static str, default: &[f64], min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::FloatList,
            default: ParamValue::List(default.to_vec()),
            range: Some((min, max)),
            options: &[],
        }
    }

    fn check(&self, value: &ParamValue) -> Result<ParamValue, ConditioningError> {
        let invalid = |what: String| {
            ConditioningError::Validation(format!("invalid parameter '{}': {what}", self.name))
        };
        let in_range = |v: f64| match self.range {
            Some((lo, hi)) => v >= lo && v <= hi,
            None => true,
        };
        let range_text = || match self.range {
            Some((lo, hi)) => format!("[{lo}, {hi}]"),
            None => String::new(),
        };
        match (self.kind, value) {
            (ParamKind::Bool, ParamValue::Bool(_)) => Ok(value.clone()),
            (ParamKind::Int, ParamValue::Int(v)) => {
                if in_range(*v as f64) {
                    Ok(value.clone())
                } else {
                    Err(invalid(format!("{v} outside {}", range_text())))
                }
            }
            (ParamKind::Int, ParamValue::Float(v)) if v.fract() == 0.0 => {
                self.check(&ParamValue::Int(*v as i64))
            }
            (ParamKind::Float, ParamValue::Int(_) | ParamValue::Float(_)) => {
                let v = value.as_f64().unwrap_or(f64::NAN);
                if v.is_finite() && in_range(v) {
                    Ok(ParamValue::Float(v))
                } else {
                    Err(invalid(format!("{v} outside {}", range_text())))
                }
            }
            (ParamKind::Choice, ParamValue::Str(s)) => {
                if self.options.contains(&s.as_str()) {
                    Ok(value.clone())
                } else {
                    Err(invalid(format!(
                        "'{s}' is not one of {}",
                        self.options.join(", ")
                    )))
                }
            }
            (ParamKind::FloatList, ParamValue::List(items)) => {
                if items.is_empty() {
                    return Err(invalid("list must not be empty".to_string()));
                }
                match items.iter().find(|v| !v.is_finite() || !in_range(**v)) {
                    Some(bad) => Err(invalid(format!("{bad} outside {}", range_text()))),
                    None => Ok(value.clone()),
                }
            }
            (kind, other) => Err(invalid(format!("expected {kind:?}, got {other}"))),
        }
    }
}

/// Parameters after validation, with defaults filled in.
#[derive(Clone, Debug, Default)]
pub struct ResolvedParams {
    values: BTreeMap<&'static str, ParamValue>,
}

impl ResolvedParams {
    pub fn resolve(schema: &[ParamSpec], params: &Params) -> Result<Self, ConditioningError> {
        if let Some(unknown) = params.keys().find(|k| !schema.iter().any(|s| s.name == k.as_str())) {
            return Err(ConditioningError::Validation(format!(
                "unknown parameter '{unknown}'"
            )));
        }
        let mut values = BTreeMap::new();
        for spec in schema {
            let value = match params.get(spec.name) {
                Some(v) => spec.check(v)?,
                None => spec.default.clone(),
            };
            values.insert(spec.name, value);
        }
        Ok(Self { values })
    }

    pub fn float(&self, name: &str) -> f32 {
        self.values.get(name).and_then(ParamValue::as_f64).unwrap_or(0.0) as f32
    }

    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) => *v as i64,
            _ => 0,
        }
    }

    pub fn usize(&self, name: &str) -> usize {
        self.int(name).max(0) as usize
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ParamValue::Bool(true)))
    }

    pub fn text(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => s,
            _ => "",
        }
    }

    pub fn list(&self, name: &str) -> Vec<f32> {
        match self.values.get(name) {
            Some(ParamValue::List(v)) => v.iter().map(|&x| x as f32).collect(),
            _ => Vec::new(),
        }
    }

    /// Schema-typed values keyed by name, defaults included.
    pub fn to_params(&self) -> Params {
        self.values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Optional integer: values below zero mean "unset".
    pub fn optional_seed(&self, name: &str) -> Option<u64> {
        let v = self.int(name);
        (v >= 0).then_some(v as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("low", 100, 0, 255),
            ParamSpec::float("sigma", 0.33, 0.0, 1.0),
            ParamSpec::choice("mode", "max", &["max", "mean"]),
            ParamSpec::float_list("scales", &[0.5, 1.0], 0.1, 4.0),
        ]
    }

    #[test]
    fn defaults_fill_missing_entries() {
        let resolved = ResolvedParams::resolve(&schema(), &Params::new()).unwrap();
        assert_eq!(resolved.int("low"), 100);
        assert_eq!(resolved.text("mode"), "max");
        assert_eq!(resolved.list("scales"), vec![0.5, 1.0]);
    }

    #[test]
    fn rejects_unknown_and_out_of_range() {
        let mut p = Params::new();
        p.insert("bogus".into(), ParamValue::Int(1));
        assert!(ResolvedParams::resolve(&schema(), &p).is_err());

        let mut p = Params::new();
        p.insert("low".into(), ParamValue::Int(300));
        let err = ResolvedParams::resolve(&schema(), &p).unwrap_err();
        assert!(err.to_string().contains("low"));

        let mut p = Params::new();
        p.insert("mode".into(), "median".into());
        assert!(ResolvedParams::resolve(&schema(), &p).is_err());
    }

    #[test]
    fn numeric_spellings_resolve_to_schema_kind() {
        let mut as_int = Params::new();
        as_int.insert("low".into(), ParamValue::Int(50));
        as_int.insert("sigma".into(), ParamValue::Int(1));
        let mut as_float = Params::new();
        as_float.insert("low".into(), ParamValue::Float(50.0));
        as_float.insert("sigma".into(), ParamValue::Float(1.0));
        let a = ResolvedParams::resolve(&schema(), &as_int).unwrap().to_params();
        let b = ResolvedParams::resolve(&schema(), &as_float).unwrap().to_params();
        assert_eq!(a, b);
        assert_eq!(a["low"], ParamValue::Int(50));
        assert_eq!(a["sigma"], ParamValue::Float(1.0));
        assert_eq!(a["mode"], ParamValue::Str("max".into()));
    }

    #[test]
    fn ints_widen_to_floats() {
        let mut p = Params::new();
        p.insert("sigma".into(), ParamValue::Int(1));
        let resolved = ResolvedParams::resolve(&schema(), &p).unwrap();
        assert_eq!(resolved.float("sigma"), 1.0);
    }

    #[test]
    fn untagged_json_decodes_to_values() {
        let p: Params = serde_json::from_str(r#"{"low": 50, "sigma": 0.5, "scales": [1.0, 2.0]}"#).unwrap();
        assert_eq!(p["low"], ParamValue::Int(50));
        assert_eq!(p["sigma"], ParamValue::Float(0.5));
        assert_eq!(p["scales"], ParamValue::List(vec![1.0, 2.0]));
    }
}
