//! Decision vectors ↔ candidate models.

use crate::error::EncodingError;
use crate::model::TimingModel;

/// Write `vector` onto a copy of `base`, one value per declared variable.
/// Values are rounded to the variable's resolution and clamped into its
/// range.
pub fn decode(base: &TimingModel, vector: &[f64]) -> Result<TimingModel, EncodingError> {
    let vars = &base.optimisation().variables;
    if vector.len() != vars.len() {
        return Err(EncodingError {
            expected: vars.len(),
            actual: vector.len(),
        });
    }
    let mut model = base.clone();
    for (var, &value) in vars.iter().zip(vector) {
        var.target.set(&mut model, var.quantise(value));
    }
    Ok(model)
}

/// The decision vector `model` currently sits at. Unset attributes read as
/// the variable's lower bound.
pub fn encode(model: &TimingModel) -> Vec<f64> {
    model
        .optimisation()
        .variables
        .iter()
        .map(|var| var.quantise(var.target.get(model).unwrap_or(var.lo)))
        .collect()
}
