use super::{Channel, HvoArray};
use crate::error::{HvoError, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// How a single representative hit is picked when several voices sound on one step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonoPolicy {
    /// Pick the active voice ranked highest in the priority order.
    Priority,

    /// Pick the highest velocity hit, falling back to priority order on ties.
    #[default]
    Loudest,

    /// Pick the hit with the earliest actual onset (lowest offset), falling back to priority order on ties.
    Earliest,
}

/// A total order over voices, highest priority first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct VoicePriority {
    order: Vec<usize>,
    ranks: Vec<usize>,
}

impl VoicePriority {
    /// `order` must name every voice in `0..order.len()` exactly once.
    pub fn new(order: Vec<usize>) -> Result<Self> {
        let mut ranks = vec![usize::MAX; order.len()];
        for (rank, &voice) in order.iter().enumerate() {
            if voice >= order.len() || ranks[voice] != usize::MAX {
                return Err(HvoError::Shape(format!(
                    "voice priority {:?} is not a permutation of 0..{}",
                    order,
                    order.len()
                )));
            }
            ranks[voice] = rank;
        }

        Ok(Self { order, ranks })
    }

    /// Column order: voice 0 first.
    pub fn canonical(voices: usize) -> Self {
        Self {
            order: (0..voices).collect(),
            ranks: (0..voices).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn rank(&self, voice: usize) -> usize {
        self.ranks[voice]
    }
}

impl TryFrom<Vec<usize>> for VoicePriority {
    type Error = HvoError;

    fn try_from(order: Vec<usize>) -> Result<Self> {
        Self::new(order)
    }
}

impl From<VoicePriority> for Vec<usize> {
    fn from(priority: VoicePriority) -> Self {
        priority.order
    }
}

/// Collapse a multi-voice array to a single voice, step by step.
///
/// Silent steps stay silent, a lone hit is copied as-is, and simultaneous
/// hits are resolved by `policy` with `priority` as the final tie-break.
pub fn reduce(hvo: &HvoArray, policy: MonoPolicy, priority: &VoicePriority) -> Result<HvoArray> {
    if priority.len() != hvo.voices() {
        return Err(HvoError::Shape(format!(
            "voice priority covers {} voices but the array has {}",
            priority.len(),
            hvo.voices()
        )));
    }

    let mut mono = HvoArray::zeros(hvo.steps(), 1);
    let mut contested = 0usize;

    for step in 0..hvo.steps() {
        let active: Vec<usize> = (0..hvo.voices()).filter(|&v| hvo.is_hit(step, v)).collect();
        if active.len() > 1 {
            contested += 1;
        }

        let chosen = match policy {
            MonoPolicy::Priority => active.iter().copied().min_by_key(|&v| priority.rank(v)),
            MonoPolicy::Loudest => active.iter().copied().min_by(|&a, &b| {
                let (va, vb) = (
                    hvo.get(step, a, Channel::Velocity),
                    hvo.get(step, b, Channel::Velocity),
                );
                vb.total_cmp(&va)
                    .then_with(|| priority.rank(a).cmp(&priority.rank(b)))
            }),
            MonoPolicy::Earliest => active.iter().copied().min_by(|&a, &b| {
                let (oa, ob) = (
                    hvo.get(step, a, Channel::Offset),
                    hvo.get(step, b, Channel::Offset),
                );
                oa.total_cmp(&ob)
                    .then_with(|| priority.rank(a).cmp(&priority.rank(b)))
            }),
        };

        if let Some(voice) = chosen {
            mono.set_triple(step, 0, hvo.triple(step, voice));
        }
    }

    if contested > 0 {
        debug!(
            "Reduced {} multi-voice steps to monophony according to [{:?}]",
            contested, policy
        );
    }

    Ok(mono)
}

/// Place a single-voice array into voice `column` of an otherwise silent `voices`-wide array.
pub fn embed_monotonic(mono: &HvoArray, voices: usize, column: usize) -> Result<HvoArray> {
    if mono.voices() != 1 {
        return Err(HvoError::Shape(format!(
            "expected a single-voice array, got {} voices",
            mono.voices()
        )));
    }

    if column >= voices {
        return Err(HvoError::Shape(format!(
            "monotonic column {} is out of range for {} voices",
            column, voices
        )));
    }

    let mut full = HvoArray::zeros(mono.steps(), voices);
    for step in 0..mono.steps() {
        full.set_triple(step, column, mono.triple(step, 0));
    }

    Ok(full)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn groove() -> HvoArray {
        let mut hvo = HvoArray::zeros(4, 3);
        // step 0: kick alone
        hvo.set_triple(0, 0, (1.0, 0.9, 0.1));
        // step 1: snare + hat, hat louder and earlier
        hvo.set_triple(1, 1, (1.0, 0.4, 0.2));
        hvo.set_triple(1, 2, (1.0, 0.8, -0.3));
        // step 2: silent
        // step 3: all three, kick and snare equally loud
        hvo.set_triple(3, 0, (1.0, 0.7, 0.0));
        hvo.set_triple(3, 1, (1.0, 0.7, -0.1));
        hvo.set_triple(3, 2, (1.0, 0.2, -0.4));
        hvo
    }

    #[test]
    fn output_has_one_voice_and_same_length() {
        let mono = reduce(&groove(), MonoPolicy::Loudest, &VoicePriority::canonical(3)).unwrap();
        assert_eq!(mono.steps(), 4);
        assert_eq!(mono.features(), 3);
    }

    #[test]
    fn silent_input_stays_silent() {
        let mono = reduce(
            &HvoArray::zeros(8, 9),
            MonoPolicy::Priority,
            &VoicePriority::canonical(9),
        )
        .unwrap();
        assert_eq!(mono, HvoArray::zeros(8, 1));
    }

    #[test]
    fn lone_hit_is_copied_exactly() {
        for policy in [MonoPolicy::Priority, MonoPolicy::Loudest, MonoPolicy::Earliest] {
            let mono = reduce(&groove(), policy, &VoicePriority::canonical(3)).unwrap();
            assert_eq!(mono.triple(0, 0), (1.0, 0.9, 0.1));
            assert_eq!(mono.triple(2, 0), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn priority_policy_uses_configured_order() {
        let priority = VoicePriority::new(vec![2, 0, 1]).unwrap();
        let mono = reduce(&groove(), MonoPolicy::Priority, &priority).unwrap();

        assert_eq!(mono.triple(1, 0), (1.0, 0.8, -0.3));
        assert_eq!(mono.triple(3, 0), (1.0, 0.2, -0.4));
    }

    #[test]
    fn loudest_policy_breaks_ties_by_priority() {
        let canonical = reduce(&groove(), MonoPolicy::Loudest, &VoicePriority::canonical(3)).unwrap();
        assert_eq!(canonical.triple(1, 0), (1.0, 0.8, -0.3));
        assert_eq!(canonical.triple(3, 0), (1.0, 0.7, 0.0));

        let snare_first = VoicePriority::new(vec![1, 0, 2]).unwrap();
        let reordered = reduce(&groove(), MonoPolicy::Loudest, &snare_first).unwrap();
        assert_eq!(reordered.triple(3, 0), (1.0, 0.7, -0.1));
    }

    #[test]
    fn earliest_policy_picks_lowest_offset() {
        let mono = reduce(&groove(), MonoPolicy::Earliest, &VoicePriority::canonical(3)).unwrap();
        assert_eq!(mono.triple(1, 0), (1.0, 0.8, -0.3));
        assert_eq!(mono.triple(3, 0), (1.0, 0.2, -0.4));
    }

    #[test]
    fn priority_must_be_a_permutation() {
        assert!(VoicePriority::new(vec![0, 0, 1]).is_err());
        assert!(VoicePriority::new(vec![0, 3, 1]).is_err());
        assert!(reduce(&groove(), MonoPolicy::Priority, &VoicePriority::canonical(2)).is_err());
    }

    #[test]
    fn priority_deserializes_through_validation() {
        let priority: VoicePriority = serde_json::from_str("[2, 0, 1]").unwrap();
        assert_eq!(priority.rank(2), 0);
        assert!(serde_json::from_str::<VoicePriority>("[1, 1]").is_err());
    }

    #[test]
    fn embedding_fills_only_the_chosen_column() {
        let mono = reduce(&groove(), MonoPolicy::Loudest, &VoicePriority::canonical(3)).unwrap();
        let full = embed_monotonic(&mono, 9, 2).unwrap();

        assert_eq!(full.steps(), 4);
        assert_eq!(full.features(), 27);
        for step in 0..4 {
            assert_eq!(full.triple(step, 2), mono.triple(step, 0));
            for voice in (0..9).filter(|&v| v != 2) {
                assert_eq!(full.triple(step, voice), (0.0, 0.0, 0.0));
            }
        }

        assert!(embed_monotonic(&mono, 9, 9).is_err());
        assert!(embed_monotonic(&groove(), 9, 0).is_err());
    }
}
