//! Call values exchanged with a loaded module

use serde::{Deserialize, Serialize};
use std::fmt;
use wasmtime::Val;

use crate::module::traits::ModuleError;

/// Argument or result of a capability call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{}i32", v),
            Value::I64(v) => write!(f, "{}i64", v),
            Value::F32(v) => write!(f, "{}f32", v),
            Value::F64(v) => write!(f, "{}f64", v),
        }
    }
}

impl From<Value> for Val {
    fn from(value: Value) -> Self {
        match value {
            Value::I32(v) => Val::I32(v),
            Value::I64(v) => Val::I64(v),
            Value::F32(v) => Val::F32(v.to_bits()),
            Value::F64(v) => Val::F64(v.to_bits()),
        }
    }
}

impl TryFrom<&Val> for Value {
    type Error = ModuleError;

    fn try_from(val: &Val) -> Result<Self, Self::Error> {
        match val {
            Val::I32(v) => Ok(Value::I32(*v)),
            Val::I64(v) => Ok(Value::I64(*v)),
            Val::F32(bits) => Ok(Value::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Ok(Value::F64(f64::from_bits(*bits))),
            other => Err(ModuleError::CallFailed(format!(
                "Unsupported value type crossing the module boundary: {}",
                describe(other)
            ))),
        }
    }
}

fn describe(val: &Val) -> &'static str {
    match val {
        Val::V128(_) => "v128",
        Val::FuncRef(_) => "funcref",
        Val::ExternRef(_) => "externref",
        _ => "reference",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_bits_survive_boundary() {
        let original = Value::F32(-1.5);
        let raw: Val = original.into();
        assert_eq!(Value::try_from(&raw).unwrap(), original);

        let original = Value::F64(std::f64::consts::PI);
        let raw: Val = original.into();
        assert_eq!(Value::try_from(&raw).unwrap(), original);
    }

    #[test]
    fn test_reference_values_rejected() {
        let raw = Val::null_func_ref();
        let err = Value::try_from(&raw).unwrap_err();
        assert!(matches!(err, ModuleError::CallFailed(msg) if msg.contains("funcref")));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::I32(7).as_i32(), Some(7));
        assert_eq!(Value::I32(7).as_i64(), None);
        assert_eq!(Value::F32(2.0).as_f64(), Some(2.0));
    }
}
