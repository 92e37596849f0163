mod roland;

pub use roland::DrumVoice as DrumVoice;
pub use roland::VoiceMapping as VoiceMapping;
pub use roland::MAPPINGS as MAPPINGS;
pub use roland::VOICE_COUNT as VOICE_COUNT;
pub use roland::voice_for_pitch;
pub use roland::output_pitches;
