use api_types::{is_global_id, RatingRequest};

use crate::error::ValidationError;

/// Parse a signed score change such as `+5` or `-10`.
pub fn parse_score_delta(input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    let unsigned = match trimmed.strip_prefix('+') {
        Some(rest) if !rest.starts_with(&['+', '-'][..]) => rest,
        _ => trimmed,
    };
    let delta: f64 = unsigned.parse().map_err(|_| ValidationError::NotANumber)?;
    if !delta.is_finite() {
        return Err(ValidationError::NotANumber);
    }
    if delta == 0.0 {
        return Err(ValidationError::Zero);
    }
    Ok(delta)
}

/// Build the request body for a rating. Blank reasons are omitted and the
/// global view is not a server.
pub fn rating_request(
    delta_input: &str,
    reason: Option<&str>,
    server_id: Option<&str>,
) -> Result<RatingRequest, ValidationError> {
    Ok(RatingRequest {
        score_delta: parse_score_delta(delta_input)?,
        reason: reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned),
        server_id: server_id
            .filter(|id| !is_global_id(id))
            .map(str::to_owned),
    })
}
