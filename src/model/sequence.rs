use serde::{Deserialize, Serialize};

pub const DEFAULT_QPM: f64 = 120.0;

/// A single drum hit, already mapped onto a canonical voice.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    /// Onset in seconds from the start of the sequence.
    pub onset_time: f64,
    /// Index of the voice within the array's voice set.
    pub voice: usize,
    /// The MIDI pitch this hit was read from, or will be written as.
    pub pitch: u8,
    pub velocity: u8,
}

/// Tempo and meter that define the quantization grid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TempoContext {
    /// Quarter notes per minute.
    pub qpm: f64,
    pub numerator: u8,
    pub denominator: u8,
    /// Beat `i` is divided into `beat_division_factors[i % len]` grid steps.
    pub beat_division_factors: Vec<u32>,
}

impl TempoContext {
    pub fn new(qpm: f64) -> Self {
        Self {
            qpm,
            ..Self::default()
        }
    }

    pub fn with_division_factors(mut self, factors: Vec<u32>) -> Self {
        self.beat_division_factors = factors;
        self
    }

    /// Length of one beat (one denominator note) in seconds.
    pub fn beat_duration(&self) -> f64 {
        60.0 / self.qpm * 4.0 / self.denominator as f64
    }
}

impl Default for TempoContext {
    fn default() -> Self {
        Self {
            qpm: DEFAULT_QPM,
            numerator: 4,
            denominator: 4,
            beat_division_factors: vec![4],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SequenceMetadata {
    pub title: Option<String>,
}

/// A parsed drum performance, ready for encoding.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DrumSequence {
    pub metadata: SequenceMetadata,
    pub tempo: TempoContext,
    pub events: Vec<NoteEvent>,
}
