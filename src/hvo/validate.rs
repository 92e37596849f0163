use super::{Channel, HvoArray};
use crate::error::{HvoError, Result};

/// True iff no value is NaN or infinite.
pub fn is_valid(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// The first channel holding a non-finite value, checked hit, velocity, offset.
pub fn first_invalid_channel(hvo: &HvoArray) -> Option<Channel> {
    Channel::ALL
        .into_iter()
        .find(|&channel| !is_valid(&hvo.channel(channel)))
}

/// Reject an array with non-finite values, naming where it came from.
pub fn check_sequence(hvo: &HvoArray, source_id: &str) -> Result<()> {
    match first_invalid_channel(hvo) {
        Some(channel) => Err(HvoError::InvalidSequence {
            source_id: source_id.to_string(),
            channel,
        }),
        None => Ok(()),
    }
}
