use tracing::warn;

use crate::error::AppError;

pub fn hash_password(plain: &str, cost: u32) -> Result<String, AppError> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// Checks a password against a stored digest. A digest bcrypt cannot parse
/// counts as a mismatch rather than an error.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(valid) => valid,
        Err(err) => {
            warn!(error = %err, "Stored password hash could not be verified");
            false
        }
    }
}

/// Clamps a configured cost into the range bcrypt accepts.
pub fn clamp_cost(cost: u32) -> u32 {
    cost.clamp(4, 31)
}
