//! Ordinal argument decoding for transaction functions

use crate::storage::TxAbort;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Positional arguments of one transaction function call
pub struct Args<'a> {
    function: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(function: &'a str, values: &'a [Value]) -> Self {
        Self { function, values }
    }

    /// Decode argument `index`, naming it `name` in errors
    pub fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, TxAbort> {
        let value = self.values.get(index).ok_or_else(|| {
            TxAbort::Invalid(format!(
                "{}: missing argument {} ({})",
                self.function, index, name
            ))
        })?;
        T::deserialize(value).map_err(|e| {
            TxAbort::Invalid(format!("{}: bad argument {} ({}): {}", self.function, index, name, e))
        })
    }
}
