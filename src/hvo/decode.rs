use super::{Channel, Grid, HvoArray, check_sequence};
use crate::error::{HvoError, Result};
use crate::model::sequence::{NoteEvent, TempoContext};

/// Turn every hit of an HVO array back into a timed note.
///
/// `pitch_map[v]` is the MIDI pitch written for voice `v`. A hit with zero
/// velocity is promoted to velocity 1. Notes are ordered by onset, then voice.
pub fn decode(hvo: &HvoArray, ctx: &TempoContext, pitch_map: &[u8]) -> Result<Vec<NoteEvent>> {
    check_sequence(hvo, "<hvo array>")?;

    if pitch_map.len() != hvo.voices() {
        return Err(HvoError::Shape(format!(
            "pitch map covers {} voices but the array has {}",
            pitch_map.len(),
            hvo.voices()
        )));
    }

    let grid = Grid::new(ctx)?;
    let mut events = Vec::with_capacity(hvo.hit_count());

    for step in 0..hvo.steps() {
        let step_time = grid.step_time(step);
        let step_duration = grid.step_duration(step);

        for (voice, &pitch) in pitch_map.iter().enumerate() {
            if !hvo.is_hit(step, voice) {
                continue;
            }

            let offset = hvo.get(step, voice, Channel::Offset) as f64;
            let velocity = (hvo.get(step, voice, Channel::Velocity) * 127.0)
                .round()
                .clamp(1.0, 127.0) as u8;

            events.push(NoteEvent {
                onset_time: (step_time + offset * step_duration).max(0.0),
                voice,
                pitch,
                velocity,
            });
        }
    }

    events.sort_by(|a, b| {
        a.onset_time
            .total_cmp(&b.onset_time)
            .then_with(|| a.voice.cmp(&b.voice))
    });

    Ok(events)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hvo::{EncodeOptions, encode};
    use crate::model::mappings::output_pitches;

    fn hit(onset_time: f64, voice: usize, velocity: u8) -> NoteEvent {
        NoteEvent {
            onset_time,
            voice,
            pitch: 0,
            velocity,
        }
    }

    #[test]
    fn round_trip_within_half_a_step() {
        env_logger::try_init().unwrap_or(());

        let ctx = TempoContext::new(96.0);
        let step = ctx.beat_duration() / 4.0;
        let events = vec![
            hit(0.0, 0, 110),
            hit(0.0, 2, 70),
            hit(0.31, 1, 96),
            hit(0.95, 2, 33),
            hit(1.9, 8, 127),
            hit(2.44, 4, 1),
        ];

        let hvo = encode(&events, &ctx, &EncodeOptions::default()).unwrap();
        let decoded = decode(&hvo, &ctx, &output_pitches()).unwrap();

        assert_eq!(decoded.len(), events.len());
        for (original, back) in events.iter().zip(decoded.iter()) {
            assert_eq!(back.voice, original.voice);
            assert_eq!(back.velocity, original.velocity);
            assert!((back.onset_time - original.onset_time).abs() <= step / 2.0 + 1e-6);
        }
    }

    #[test]
    fn pitches_come_from_the_map() {
        let ctx = TempoContext::default();
        let mut hvo = HvoArray::zeros(4, 2);
        hvo.set_triple(1, 0, (1.0, 0.5, 0.0));
        hvo.set_triple(1, 1, (1.0, 0.5, 0.0));

        let decoded = decode(&hvo, &ctx, &[36, 42]).unwrap();
        assert_eq!(decoded.iter().map(|e| e.pitch).collect::<Vec<_>>(), vec![36, 42]);
        assert!(decode(&hvo, &ctx, &[36]).is_err());
    }

    #[test]
    fn zero_velocity_hit_is_promoted() {
        let mut hvo = HvoArray::zeros(1, 1);
        hvo.set_triple(0, 0, (1.0, 0.0, 0.0));

        let decoded = decode(&hvo, &TempoContext::default(), &[38]).unwrap();
        assert_eq!(decoded[0].velocity, 1);
    }

    #[test]
    fn ordered_by_onset_then_voice() {
        let ctx = TempoContext::new(120.0);
        let mut hvo = HvoArray::zeros(2, 3);
        hvo.set_triple(0, 2, (1.0, 0.5, 0.0));
        hvo.set_triple(0, 0, (1.0, 0.5, 0.4));
        hvo.set_triple(0, 1, (1.0, 0.5, 0.0));
        hvo.set_triple(1, 0, (1.0, 0.5, -0.5));

        let decoded = decode(&hvo, &ctx, &[1, 2, 3]).unwrap();
        let order: Vec<usize> = decoded.iter().map(|e| e.voice).collect();
        assert_eq!(order, vec![1, 2, 0, 0]);
        assert!(decoded.windows(2).all(|w| w[0].onset_time <= w[1].onset_time));
    }

    #[test]
    fn refuses_non_finite_arrays() {
        let mut hvo = HvoArray::zeros(1, 1);
        hvo.set_triple(0, 0, (1.0, f32::NAN, 0.0));

        assert!(matches!(
            decode(&hvo, &TempoContext::default(), &[36]),
            Err(HvoError::InvalidSequence { channel: Channel::Velocity, .. })
        ));
    }
}
