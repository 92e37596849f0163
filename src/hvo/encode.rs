use super::{Grid, HvoArray, MAX_GRID_BEATS, check_sequence};
use crate::error::{HvoError, Result};
use crate::model::mappings::VOICE_COUNT;
use crate::model::sequence::{DrumSequence, NoteEvent, TempoContext};
use log::debug;
use serde::{Deserialize, Serialize};

/// Which event keeps a grid cell when two hits of one voice snap to the same step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Highest velocity wins, then the one closer to the grid, then the earlier input event.
    #[default]
    Loudest,

    /// The later input event always wins.
    Last,
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub voices: usize,
    pub tie_break: TieBreak,
    /// Lower bound on the encoded span, in seconds. The grid always covers
    /// whole beats up to at least this point.
    pub total_time: f64,
    /// Used to name the source in validation errors.
    pub source_id: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            voices: VOICE_COUNT,
            tie_break: TieBreak::default(),
            total_time: 0.0,
            source_id: String::from("<unknown>"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    velocity: u8,
    offset: f64,
}

impl Candidate {
    fn beats(&self, held: &Candidate, tie_break: TieBreak) -> bool {
        match tie_break {
            TieBreak::Last => true,
            TieBreak::Loudest => {
                self.velocity > held.velocity
                    || (self.velocity == held.velocity && self.offset.abs() < held.offset.abs())
            }
        }
    }
}

/// Quantize timed drum hits onto the grid defined by `ctx`.
///
/// The array spans whole beats, enough to hold every event and `total_time`.
/// Offsets are clamped to `[-0.5, 0.5]` unless they are non-finite, in which
/// case they are left as-is so validation rejects the sequence.
pub fn encode(events: &[NoteEvent], ctx: &TempoContext, options: &EncodeOptions) -> Result<HvoArray> {
    let grid = Grid::new(ctx)?;

    let mut placed = Vec::with_capacity(events.len());
    for event in events.iter() {
        if event.voice >= options.voices {
            return Err(HvoError::Shape(format!(
                "event voice {} is out of range for {} voices",
                event.voice, options.voices
            )));
        }
        placed.push((event, grid.nearest_step(event.onset_time)?));
    }

    let event_beats = placed
        .iter()
        .map(|(_, placement)| grid.beat_of(placement.step) + 1)
        .max()
        .unwrap_or(0);

    let span_beats = options.total_time / grid.beat_duration();
    let span_beats = if span_beats.is_finite() && span_beats > 0.0 {
        (span_beats - 1e-9).ceil() as usize
    } else {
        0
    };

    let beats = event_beats.max(span_beats);
    if beats > MAX_GRID_BEATS {
        return Err(HvoError::Shape(format!(
            "{} spans {} beats, more than the {} allowed",
            options.source_id, beats, MAX_GRID_BEATS
        )));
    }

    let steps = grid.beat_start(beats);
    debug!(
        "Encoding {} events from {} onto {} steps ({} beats)",
        events.len(),
        options.source_id,
        steps,
        beats
    );

    let mut cells: Vec<Option<Candidate>> = vec![None; steps * options.voices];
    let mut collisions = 0usize;
    for (event, placement) in placed.into_iter() {
        let candidate = Candidate {
            velocity: event.velocity.min(127),
            offset: placement.offset,
        };

        let cell = &mut cells[placement.step * options.voices + event.voice];
        match cell {
            Some(held) => {
                collisions += 1;
                if candidate.beats(held, options.tie_break) {
                    *held = candidate;
                }
            }
            None => *cell = Some(candidate),
        }
    }

    if collisions > 0 {
        debug!(
            "{} same-voice hits collapsed onto shared steps in {} [{:?}]",
            collisions, options.source_id, options.tie_break
        );
    }

    let mut hvo = HvoArray::zeros(steps, options.voices);
    for (i, cell) in cells.iter().enumerate() {
        if let Some(candidate) = cell {
            let offset = if candidate.offset.is_finite() {
                candidate.offset.clamp(-0.5, 0.5)
            } else {
                candidate.offset
            };

            hvo.set_triple(
                i / options.voices,
                i % options.voices,
                (1.0, candidate.velocity as f32 / 127.0, offset as f32),
            );
        }
    }

    check_sequence(&hvo, &options.source_id)?;
    Ok(hvo)
}

/// Encode a parsed sequence over the full canonical voice set.
///
/// The span is taken from the onsets alone. Ringing notes past the last
/// onset don't add steps.
pub fn encode_sequence(sequence: &DrumSequence, tie_break: TieBreak) -> Result<HvoArray> {
    let options = EncodeOptions {
        voices: VOICE_COUNT,
        tie_break,
        total_time: 0.0,
        source_id: sequence
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| "<unknown>".into()),
    };

    encode(&sequence.events, &sequence.tempo, &options)
}
