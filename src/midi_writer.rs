// MIDI output for decoded drum hits.
//
// Writes a single-track SMF on the GM percussion channel. Tempo and time
// signature come from the tempo context the hits were decoded against.
// Drum hits carry no duration, so every note is held for a fixed 32nd note.

use crate::error::{HvoError, Result};
use crate::model::sequence::{NoteEvent, TempoContext};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// How long each drum hit is held, in ticks.
const DRUM_NOTE_TICKS: u64 = TICKS_PER_QUARTER as u64 / 8;

/// GM percussion channel (channel 10, zero-based).
const DRUM_CHANNEL: u8 = 9;

const MAX_U24: u32 = 0x00FF_FFFF;
const MAX_U28: u64 = 0x0FFF_FFFF;

/// Write timed hits to a MIDI file.
pub fn write_midi_file(events: &[NoteEvent], tempo: &TempoContext, path: &Path) -> Result<()> {
    let buf = sequence_to_midi_bytes(events, tempo)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

pub fn sequence_to_midi_bytes(events: &[NoteEvent], tempo: &TempoContext) -> Result<Vec<u8>> {
    let smf = sequence_to_smf(events, tempo)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Convert timed hits to an in-memory SMF.
fn sequence_to_smf(events: &[NoteEvent], tempo: &TempoContext) -> Result<Smf<'static>> {
    if !tempo.qpm.is_finite() || tempo.qpm <= 0.0 {
        return Err(HvoError::Shape(format!("can't write MIDI at {} qpm", tempo.qpm)));
    }

    if !tempo.denominator.is_power_of_two() {
        return Err(HvoError::Shape(format!(
            "time signature denominator {} is not a power of two",
            tempo.denominator
        )));
    }

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let mut track: Track<'static> = Vec::new();
    let tempo_microseconds = ((60_000_000.0 / tempo.qpm).round() as u32).clamp(1, MAX_U24);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
            tempo.numerator,
            tempo.denominator.trailing_zeros() as u8,
            24,
            8,
        )),
    });

    let ticks_per_second = tempo.qpm / 60.0 * TICKS_PER_QUARTER as f64;

    // (tick, is_note_on, pitch, velocity); note-offs sort ahead of note-ons on the same tick
    let mut timeline: Vec<(u64, bool, u8, u8)> = Vec::with_capacity(events.len() * 2);
    for event in events.iter() {
        let tick = (event.onset_time.max(0.0) * ticks_per_second).round() as u64;
        let pitch = event.pitch.min(127);
        let velocity = event.velocity.clamp(1, 127);

        timeline.push((tick, true, pitch, velocity));
        timeline.push((tick + DRUM_NOTE_TICKS, false, pitch, 0));
    }
    timeline.sort_by_key(|&(tick, is_on, pitch, _)| (tick, is_on, pitch));

    let channel = u4::new(DRUM_CHANNEL);
    let mut last_tick = 0u64;
    for (tick, is_on, pitch, velocity) in timeline.into_iter() {
        let delta = tick - last_tick;
        if delta > MAX_U28 {
            return Err(HvoError::Shape(format!(
                "gap of {} ticks does not fit a MIDI delta time",
                delta
            )));
        }

        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(velocity),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            }
        };

        track.push(TrackEvent {
            delta: u28::new(delta as u32),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    Ok(smf)
}
