use serde::{Deserialize, Serialize};

/// Canonical drum roles, in HVO column order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrumVoice {
    Kick = 0,
    Snare = 1,
    ClosedHiHat = 2,
    OpenHiHat = 3,
    LowTom = 4,
    MidTom = 5,
    HighTom = 6,
    Crash = 7,
    Ride = 8,
}

impl DrumVoice {
    pub const ALL: [DrumVoice; VOICE_COUNT] = [
        DrumVoice::Kick,
        DrumVoice::Snare,
        DrumVoice::ClosedHiHat,
        DrumVoice::OpenHiHat,
        DrumVoice::LowTom,
        DrumVoice::MidTom,
        DrumVoice::HighTom,
        DrumVoice::Crash,
        DrumVoice::Ride,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<DrumVoice> {
        Self::ALL.get(index).copied()
    }

    pub fn mapping(self) -> &'static VoiceMapping {
        &MAPPINGS[self.index()]
    }

    /// The pitch written back out for this voice.
    pub fn output_pitch(self) -> u8 {
        self.mapping().pitches[0]
    }
}

/// The set of GM pitches that collapse onto one voice.
#[derive(Debug, Clone, Copy)]
pub struct VoiceMapping {
    pub voice: DrumVoice,
    /// First entry is the canonical output pitch.
    pub pitches: &'static [u8],
    pub label: &'static str,
}

pub const VOICE_COUNT: usize = 9;

// -----------------------------------------------------------------------------
// Reduced Roland TD-11 mapping: 9 voices, 27 HVO features.
// Pitches not listed here are dropped on import.
// -----------------------------------------------------------------------------

pub const MAPPINGS: &[VoiceMapping; VOICE_COUNT] = &[
    VoiceMapping {
        voice: DrumVoice::Kick,
        pitches: &[36],
        label: "KICK",
    },
    VoiceMapping {
        voice: DrumVoice::Snare,
        pitches: &[38, 37, 40],
        label: "SNARE",
    },
    VoiceMapping {
        voice: DrumVoice::ClosedHiHat,
        pitches: &[42, 22, 44],
        label: "HH_CLOSED",
    },
    VoiceMapping {
        voice: DrumVoice::OpenHiHat,
        pitches: &[46, 26],
        label: "HH_OPEN",
    },
    VoiceMapping {
        voice: DrumVoice::LowTom,
        pitches: &[43, 58],
        label: "TOM_3_LO",
    },
    VoiceMapping {
        voice: DrumVoice::MidTom,
        pitches: &[47, 45],
        label: "TOM_2_MID",
    },
    VoiceMapping {
        voice: DrumVoice::HighTom,
        pitches: &[50, 48],
        label: "TOM_1_HI",
    },
    VoiceMapping {
        voice: DrumVoice::Crash,
        pitches: &[49, 52, 55, 57],
        label: "CRASH",
    },
    VoiceMapping {
        voice: DrumVoice::Ride,
        pitches: &[51, 53, 59],
        label: "RIDE",
    },
];

/// Return the voice a MIDI pitch collapses onto, if it is mapped at all.
pub fn voice_for_pitch(pitch: u8) -> Option<DrumVoice> {
    MAPPINGS
        .iter()
        .find(|mapping| mapping.pitches.contains(&pitch))
        .map(|mapping| mapping.voice)
}

/// Output pitch per voice, in column order. Suitable as a decoder pitch map.
pub fn output_pitches() -> Vec<u8> {
    DrumVoice::ALL.iter().map(|voice| voice.output_pitch()).collect()
}
