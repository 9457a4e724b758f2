//! Input validation for caller-supplied session parameters.

use crate::error::AgentError;

const MAX_SYMBOL_LEN: usize = 12;

/// Validates a token or stablecoin symbol: non-empty alphanumeric ASCII,
/// bounded length.
pub fn validate_symbol(symbol: &str) -> Result<(), AgentError> {
    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
        return Err(AgentError::InvalidInput(format!(
            "symbol '{symbol}' must be 1-{MAX_SYMBOL_LEN} characters"
        )));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AgentError::InvalidInput(format!(
            "symbol '{symbol}' must be alphanumeric"
        )));
    }
    Ok(())
}

/// Validates a collateral amount: finite and strictly positive.
pub fn validate_amount(amount: f64) -> Result<(), AgentError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AgentError::InvalidInput(format!(
            "amount {amount} must be a positive number"
        )));
    }
    Ok(())
}
