use super::HvoArray;
use crate::error::{HvoError, Result};

/// Right-pad `hvo` with all-zero rows up to exactly `target` time steps.
///
/// Existing rows are never touched and nothing is ever prepended. Fails if
/// the array is already longer than `target`.
pub fn pad(hvo: &HvoArray, target: usize) -> Result<HvoArray> {
    if hvo.steps() > target {
        return Err(HvoError::Padding {
            steps: hvo.steps(),
            target,
        });
    }

    let mut padded = hvo.clone();
    padded.extend_zero_rows(target - hvo.steps());
    Ok(padded)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> HvoArray {
        HvoArray::from_rows(&[
            vec![1.0, 0.5, 0.1, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.7, 0.0, -0.3],
        ])
        .unwrap()
    }

    #[test]
    fn appends_zero_rows_at_the_end() {
        let original = sample();
        let padded = pad(&original, 5).unwrap();

        assert_eq!(padded.steps(), 5);
        assert_eq!(padded.features(), original.features());
        assert_eq!(padded.row(0), original.row(0));
        assert_eq!(padded.row(1), original.row(1));
        for step in 2..5 {
            assert!(padded.row(step).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn padding_is_idempotent() {
        let once = pad(&sample(), 32).unwrap();
        let twice = pad(&once, 32).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn exact_length_is_unchanged() {
        let original = sample();
        assert_eq!(pad(&original, 2).unwrap(), original);
    }

    #[test]
    fn refuses_to_shrink() {
        match pad(&sample(), 1) {
            Err(HvoError::Padding { steps, target }) => {
                assert_eq!(steps, 2);
                assert_eq!(target, 1);
            }
            other => panic!("expected Padding error, got {:?}", other),
        }
    }
}
