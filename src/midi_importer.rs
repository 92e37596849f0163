use crate::error::{HvoError, Result};
use crate::model::mappings::voice_for_pitch;
use crate::model::sequence::*;
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFAULT_MPQN: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

struct HitOnset {
    pub pitch: u8,
    pub start_tick: u64,
    pub velocity: u8,
}

#[derive(Debug, Clone)]
struct TempoSegment {
    pub mpqn: u32,
    pub start_tick: u64,
    pub secs_at_start: f64,
}

/// Read a MIDI file into drum hits on the canonical voices.
///
/// `beat_division_factors` sets the grid the resulting tempo context describes.
pub fn import_midi_file<P: AsRef<Path>>(path: P, beat_division_factors: &[u32]) -> Result<DrumSequence> {
    let bytes = fs::read(path.as_ref())?;

    midi_bytes_to_sequence(&bytes, path.as_ref(), beat_division_factors)
}

pub fn midi_bytes_to_sequence(
    bytes: &[u8],
    source_path: &Path,
    beat_division_factors: &[u32],
) -> Result<DrumSequence> {
    let smf = Smf::parse(bytes).map_err(|e| HvoError::MidiParse(format!("{:?}", e)))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u64,
        Timing::Timecode(_fps, _subframe) => {
            return Err(HvoError::MidiParse(
                "SMPTE timecode midi timing is not currently supported..!".into(),
            ));
        }
    };

    if ticks_per_quarter == 0 {
        return Err(HvoError::MidiParse("zero ticks per quarter note".into()));
    }

    debug!("Ticks per quarter note: {}", ticks_per_quarter);
    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    tempo_changes.push((0u64, DEFAULT_MPQN)); // default tempo to 120bpm until a tempo meta appears

    let mut time_signature: Option<(u8, u8)> = None;
    let mut onsets: Vec<HitOnset> = Vec::new();
    let mut open_notes: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(meta) => match meta {
                    MetaMessage::Tempo(micro) => {
                        let mpqn: u32 = micro.as_int();
                        tempo_changes.push((abs_tick, mpqn));
                        debug!(
                            "Tempo change at tick {} -> {} us/qn (track {})",
                            abs_tick, mpqn, track_idx
                        );
                    }
                    MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => {
                        if time_signature.is_none() {
                            let denominator = 1u8.checked_shl(*denominator_pow as u32).unwrap_or(4);
                            time_signature = Some((*numerator, denominator));
                            debug!("Time signature: {}/{}", numerator, denominator);
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();

                    match message {
                        MidiMessage::NoteOn { key, vel } => {
                            let velocity: u8 = vel.as_int();

                            if velocity == 0 {
                                close_note(&mut open_notes, &mut onsets, ch, key.as_int(), abs_tick);
                            } else {
                                open_notes
                                    .entry((ch, key.as_int()))
                                    .or_default()
                                    .push((abs_tick, velocity));
                            }
                        }
                        MidiMessage::NoteOff { key, vel: _ } => {
                            close_note(&mut open_notes, &mut onsets, ch, key.as_int(), abs_tick);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    // Drum hits are often never released. Only the onset matters, so keep them.
    for ((ch, key), stack) in open_notes.into_iter() {
        for (start_tick, start_vel) in stack {
            debug!(
                "Unclosed NoteOn for {}, channel: {} at tick: {}..!",
                key, ch, start_tick
            );

            onsets.push(HitOnset {
                pitch: key,
                start_tick,
                velocity: start_vel,
            });
        }
    }

    let mut last_tick: u64 = 0;
    let mut secs_accum: f64 = 0.0;
    let mut last_mpqn: u32 = DEFAULT_MPQN;
    let mut tempo_segments: Vec<TempoSegment> = Vec::new();

    tempo_changes.sort_by_key(|(tick, _)| *tick);

    for (tick, mpqn) in tempo_changes.iter().copied() {
        if tick > last_tick {
            let delta_ticks = (tick - last_tick) as f64;
            secs_accum += delta_ticks * (last_mpqn as f64) / (ticks_per_quarter as f64) / 1e6;
        }

        // secs_at_start reflects the time accumulated up to this tick
        tempo_segments.push(TempoSegment {
            start_tick: tick,
            mpqn,
            secs_at_start: secs_accum,
        });

        last_tick = tick;
        last_mpqn = mpqn;
    }

    let ticks_to_secs = |tick: u64| -> f64 {
        let segment = match tempo_segments.iter().rfind(|seg| seg.start_tick <= tick) {
            Some(s) => s,
            None => &tempo_segments[0],
        };

        let delta_ticks = (tick - segment.start_tick) as f64;
        segment.secs_at_start + delta_ticks * (segment.mpqn as f64) / (ticks_per_quarter as f64) / 1e6
    };

    let mut events: Vec<NoteEvent> = Vec::new();
    let mut unmapped = 0usize;

    for onset in onsets.into_iter() {
        let Some(voice) = voice_for_pitch(onset.pitch) else {
            unmapped += 1;
            continue;
        };

        events.push(NoteEvent {
            onset_time: ticks_to_secs(onset.start_tick),
            voice: voice.index(),
            pitch: onset.pitch,
            velocity: onset.velocity,
        });
    }

    if unmapped > 0 {
        warn!(
            "Dropped {} notes with no drum voice mapping from {}..!",
            unmapped,
            source_path.display()
        );
    }

    events.sort_by(|a, b| {
        a.onset_time
            .total_cmp(&b.onset_time)
            .then_with(|| a.voice.cmp(&b.voice))
    });

    // skipping the first change because it is our default mpqn
    let mpqn = tempo_changes.get(1).map(|(_, mpqn)| *mpqn).unwrap_or(DEFAULT_MPQN);
    let (numerator, denominator) = time_signature.unwrap_or((4, 4));

    Ok(DrumSequence {
        metadata: SequenceMetadata {
            title: source_path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string()),
        },
        tempo: TempoContext {
            qpm: MICROSECONDS_PER_MINUTE / (mpqn as f64),
            numerator,
            denominator,
            beat_division_factors: beat_division_factors.to_vec(),
        },
        events,
    })
}

fn close_note(
    open_notes: &mut HashMap<(u8, u8), Vec<(u64, u8)>>,
    onsets: &mut Vec<HitOnset>,
    ch: u8,
    pitch: u8,
    abs_tick: u64,
) {
    if let Some(stack) = open_notes.get_mut(&(ch, pitch))
        && let Some((start_tick, start_vel)) = stack.pop()
    {
        onsets.push(HitOnset {
            pitch,
            start_tick,
            velocity: start_vel,
        });
    } else {
        debug!(
            "Orphaned NoteOff for {} ch{} at tick {}..!",
            pitch, ch, abs_tick
        );
    }
}
