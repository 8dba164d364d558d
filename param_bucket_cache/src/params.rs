//! Scalar statement parameters and the padded binding step.

use std::fmt;

use crate::{bucket::BucketSpec, error::Error};

/// A scalar value bound to one placeholder of a membership predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// SQL null.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An unsigned integer.
    UInt64(u64),
    /// A signed integer.
    Int64(i64),
    /// A double-precision float.
    Float64(f64),
    /// A UTF-8 string.
    String(String),
}

impl ParamValue {
    /// Name of the variant, usable in error messages and logs.
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::UInt64(_) => "UInt64",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
        }
    }
}

/// Formats the value as a SQL-style literal, strings single-quoted with quotes doubled.
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::UInt64(value) => write!(f, "{value}"),
            Self::Int64(value) => write!(f, "{value}"),
            Self::Float64(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "'{}'", value.replace('\'', "''")),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int64(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// Strategy for choosing the value that fills the padding slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PaddingPolicy {
    /// Repeat the last real value.
    ///
    /// Repeating an existing element is the only generally safe choice: `x IN (a, b, b)`
    /// selects exactly the rows of `x IN (a, b)`, while any invented sentinel could
    /// collide with real data.
    #[default]
    RepeatLast,
}

/// An ordered, type-homogeneous list of scalar values for one membership predicate.
///
/// Homogeneity is validated at construction, the earliest layer of the pipeline. The list
/// is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList(Vec<ParamValue>);

impl ValueList {
    /// Create a list, validating that all values share one scalar type.
    ///
    /// An empty list is accepted here; rejecting it is the job of the bucketing step,
    /// which sees the length before any cache interaction.
    pub fn new(values: Vec<ParamValue>) -> Result<Self, Error> {
        if let Some(first) = values.first() {
            for value in &values {
                if value.variant() != first.variant() {
                    return Err(Error::invalid_argument(format!(
                        "mixed value types in list: {} and {}",
                        first.variant(),
                        value.variant(),
                    )));
                }
            }
        }
        Ok(Self(values))
    }

    /// Create a list from anything convertible to [`ParamValue`]s.
    pub fn try_from_iter<I, T>(values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<ParamValue>,
    {
        Self::new(values.into_iter().map(Into::into).collect())
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list holds no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The values, in caller order.
    pub fn values(&self) -> &[ParamValue] {
        &self.0
    }

    /// Bind this list to a bucket: all real values in caller order, then padding chosen
    /// per `policy` until the padded count is reached.
    ///
    /// The output length is exactly [`BucketSpec::padded_count`]. Padding only repeats a
    /// value that is already in the list, so the set of matched rows is unchanged.
    /// Binding an already-padded list to the same spec is a no-op.
    pub fn bind(&self, spec: &BucketSpec, policy: PaddingPolicy) -> Result<Self, Error> {
        if spec.raw_count() != self.len() {
            return Err(Error::invalid_argument(format!(
                "bucket was computed for {} values but the list holds {}",
                spec.raw_count(),
                self.len(),
            )));
        }
        let Some(last) = self.0.last() else {
            return Err(Error::invalid_argument("cannot pad an empty value list"));
        };

        let padding = match policy {
            PaddingPolicy::RepeatLast => last.clone(),
        };
        let mut bound = Vec::with_capacity(spec.padded_count());
        bound.extend(self.0.iter().cloned());
        bound.resize(spec.padded_count(), padding);
        Ok(Self(bound))
    }
}

impl TryFrom<Vec<ParamValue>> for ValueList {
    type Error = Error;

    fn try_from(values: Vec<ParamValue>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}
