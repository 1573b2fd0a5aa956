//! Typed output containers.

use metbuf_common::{Error, Result};
use metbuf_format::TypeInfo;
use num_traits::{Bounded, NumCast};

/// Concrete container type for a materialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    String,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
}

impl ContainerKind {
    /// Picks the container from a field's merged type descriptor: string
    /// data gets the string container, integral data a signed/unsigned
    /// 32/64-bit container by width, the rest float or double by width.
    pub fn for_type_info(info: &TypeInfo) -> ContainerKind {
        if info.is_string {
            ContainerKind::String
        } else if info.is_integer() {
            match (info.is_signed(), info.is_64bit()) {
                (true, true) => ContainerKind::Int64,
                (true, false) => ContainerKind::Int32,
                (false, true) => ContainerKind::UInt64,
                (false, false) => ContainerKind::UInt32,
            }
        } else if info.is_64bit() {
            ContainerKind::Double
        } else {
            ContainerKind::Float
        }
    }

    /// Parses a caller-supplied override type name.
    ///
    /// # Errors
    ///
    /// Fails for names outside the recognized set.
    pub fn parse_override(name: &str) -> Result<ContainerKind> {
        match name {
            "int" | "int32" => Ok(ContainerKind::Int32),
            "int64" => Ok(ContainerKind::Int64),
            "float" => Ok(ContainerKind::Float),
            "double" => Ok(ContainerKind::Double),
            "string" => Ok(ContainerKind::String),
            _ => Err(Error::unknown_override_type(name)),
        }
    }

    #[inline]
    pub fn is_string(self) -> bool {
        self == ContainerKind::String
    }
}

/// Materialized values in their concrete container.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValues {
    String(Vec<String>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl DataValues {
    pub fn len(&self) -> usize {
        match self {
            DataValues::String(values) => values.len(),
            DataValues::Int32(values) => values.len(),
            DataValues::Int64(values) => values.len(),
            DataValues::UInt32(values) => values.len(),
            DataValues::UInt64(values) => values.len(),
            DataValues::Float(values) => values.len(),
            DataValues::Double(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dense multi-dimensional output array for one materialized query.
///
/// Missing readings hold [`missing_value`](DataObject::missing_value) in the
/// float containers, the element type's maximum in integer containers when
/// the sentinel does not fit, and the empty string in string containers.
#[derive(Debug, Clone)]
pub struct DataObject {
    values: DataValues,
    dims: Vec<usize>,
    field_name: String,
    group_by_field_name: String,
    dim_paths: Vec<String>,
    missing_value: f64,
}

impl DataObject {
    /// Converts the raw double harvest into the requested container.
    ///
    /// # Errors
    ///
    /// Fails when a string container is requested for numeric data or vice
    /// versa; conversions between the two are not supported.
    pub fn from_doubles(
        kind: ContainerKind,
        data: &[f64],
        source_is_string: bool,
        field_name: &str,
        missing_value: f64,
    ) -> Result<DataObject> {
        if kind.is_string() != source_is_string {
            return Err(Error::unsupported_conversion(field_name));
        }
        let values = match kind {
            ContainerKind::String => DataValues::String(
                data.iter()
                    .map(|&value| decode_chars(value, missing_value))
                    .collect(),
            ),
            ContainerKind::Int32 => DataValues::Int32(cast_values(data)),
            ContainerKind::Int64 => DataValues::Int64(cast_values(data)),
            ContainerKind::UInt32 => DataValues::UInt32(cast_values(data)),
            ContainerKind::UInt64 => DataValues::UInt64(cast_values(data)),
            ContainerKind::Float => {
                DataValues::Float(data.iter().map(|&value| value as f32).collect())
            }
            ContainerKind::Double => DataValues::Double(data.to_vec()),
        };
        Ok(DataObject {
            values,
            dims: Vec::new(),
            field_name: String::new(),
            group_by_field_name: String::new(),
            dim_paths: Vec::new(),
            missing_value,
        })
    }

    pub fn set_dims(&mut self, dims: Vec<usize>) {
        self.dims = dims;
    }

    pub fn set_field_name(&mut self, name: impl Into<String>) {
        self.field_name = name.into();
    }

    pub fn set_group_by_field_name(&mut self, name: impl Into<String>) {
        self.group_by_field_name = name.into();
    }

    pub fn set_dim_paths(&mut self, dim_paths: Vec<String>) {
        self.dim_paths = dim_paths;
    }

    pub fn values(&self) -> &DataValues {
        &self.values
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn group_by_field_name(&self) -> &str {
        &self.group_by_field_name
    }

    pub fn dim_paths(&self) -> &[String] {
        &self.dim_paths
    }

    /// The sentinel that marks absent readings in the double harvest this
    /// object was built from.
    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }
}

fn cast_values<T>(data: &[f64]) -> Vec<T>
where
    T: NumCast + Bounded + Copy,
{
    data.iter()
        .map(|&value| num_traits::cast(value.round()).unwrap_or_else(T::max_value))
        .collect()
}

/// Character leaves pack their text into the value word, low byte first; a
/// NUL closes the text early and trailing blanks are padding.
fn decode_chars(value: f64, missing_value: f64) -> String {
    if value == missing_value {
        return String::new();
    }
    let bytes = value.to_le_bytes();
    let text: Vec<u8> = bytes.iter().copied().take_while(|&byte| byte != 0).collect();
    String::from_utf8_lossy(&text).trim_end().to_string()
}

/// Packs up to eight characters into a value word, for tests and providers
/// that synthesize character data.
pub fn encode_chars(text: &str) -> f64 {
    let mut bytes = [0u8; 8];
    for (slot, byte) in bytes.iter_mut().zip(text.bytes()) {
        *slot = byte;
    }
    f64::from_le_bytes(bytes)
}
