use crate::error::{HvoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

mod decode;
mod encode;
mod grid;
mod pad;
mod reduce;
mod validate;

pub use decode::*;
pub use encode::*;
pub use grid::*;
pub use pad::*;
pub use reduce::*;
pub use validate::*;

/// One of the three per-voice channels of an HVO array.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Hit,
    Velocity,
    Offset,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Hit, Channel::Velocity, Channel::Offset];

    /// Position of this channel's block within a row.
    pub fn index(self) -> usize {
        match self {
            Channel::Hit => 0,
            Channel::Velocity => 1,
            Channel::Offset => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Hit => "hit",
            Channel::Velocity => "velocity",
            Channel::Offset => "offset",
        };
        f.write_str(name)
    }
}

/// A row-major `[steps, 3 * voices]` array laid out as
/// `[hit_1..hit_V, vel_1..vel_V, off_1..off_V]` per time step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HvoArray {
    steps: usize,
    voices: usize,
    data: Vec<f32>,
}

impl HvoArray {
    pub fn zeros(steps: usize, voices: usize) -> Self {
        Self {
            steps,
            voices,
            data: vec![0.0; steps * voices * 3],
        }
    }

    /// Build an array from a flat row-major buffer of `steps * features` values.
    pub fn from_flat(steps: usize, features: usize, data: Vec<f32>) -> Result<Self> {
        if features == 0 || features % 3 != 0 {
            return Err(HvoError::Shape(format!(
                "feature count {} is not a positive multiple of 3",
                features
            )));
        }

        if data.len() != steps * features {
            return Err(HvoError::Shape(format!(
                "expected {} values for [{}, {}], got {}",
                steps * features,
                steps,
                features,
                data.len()
            )));
        }

        Ok(Self {
            steps,
            voices: features / 3,
            data,
        })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let features = rows.first().map(|row| row.len()).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != features) {
            return Err(HvoError::Shape(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                features
            )));
        }

        Self::from_flat(rows.len(), features, rows.concat())
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn voices(&self) -> usize {
        self.voices
    }

    pub fn features(&self) -> usize {
        self.voices * 3
    }

    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, step: usize) -> &[f32] {
        let width = self.features();
        &self.data[step * width..(step + 1) * width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.steps).map(move |step| self.row(step))
    }

    fn column(&self, channel: Channel, voice: usize) -> usize {
        channel.index() * self.voices + voice
    }

    pub fn get(&self, step: usize, voice: usize, channel: Channel) -> f32 {
        self.data[step * self.features() + self.column(channel, voice)]
    }

    pub fn is_hit(&self, step: usize, voice: usize) -> bool {
        self.get(step, voice, Channel::Hit) > 0.5
    }

    /// `(hit, velocity, offset)` for one voice at one step.
    pub fn triple(&self, step: usize, voice: usize) -> (f32, f32, f32) {
        (
            self.get(step, voice, Channel::Hit),
            self.get(step, voice, Channel::Velocity),
            self.get(step, voice, Channel::Offset),
        )
    }

    pub fn set_triple(&mut self, step: usize, voice: usize, (hit, velocity, offset): (f32, f32, f32)) {
        let base = step * self.features();
        let hit_col = self.column(Channel::Hit, voice);
        let vel_col = self.column(Channel::Velocity, voice);
        let off_col = self.column(Channel::Offset, voice);

        self.data[base + hit_col] = hit;
        self.data[base + vel_col] = velocity;
        self.data[base + off_col] = offset;
    }

    /// The `[steps, voices]` block of one channel, row-major.
    pub fn channel(&self, channel: Channel) -> Vec<f32> {
        let start = channel.index() * self.voices;
        self.rows()
            .flat_map(|row| row[start..start + self.voices].iter().copied())
            .collect()
    }

    pub fn hit_count(&self) -> usize {
        self.channel(Channel::Hit).iter().filter(|&&h| h > 0.5).count()
    }

    pub(crate) fn extend_zero_rows(&mut self, rows: usize) {
        self.data.resize(self.data.len() + rows * self.features(), 0.0);
        self.steps += rows;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn triples_land_in_their_channel_blocks() {
        let mut hvo = HvoArray::zeros(2, 3);
        hvo.set_triple(1, 2, (1.0, 0.5, -0.25));

        assert_eq!(hvo.features(), 9);
        assert_eq!(hvo.row(0), &[0.0; 9]);
        assert_eq!(
            hvo.row(1),
            &[0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 0.0, 0.0, -0.25]
        );
        assert_eq!(hvo.triple(1, 2), (1.0, 0.5, -0.25));
        assert_eq!(hvo.channel(Channel::Velocity), vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.5]);
        assert_eq!(hvo.hit_count(), 1);
    }

    #[test]
    fn rejects_ragged_or_misshapen_rows() {
        assert!(HvoArray::from_rows(&[vec![0.0; 3], vec![0.0; 6]]).is_err());
        assert!(HvoArray::from_rows(&[vec![0.0; 2]]).is_err());
        assert!(HvoArray::from_flat(2, 3, vec![0.0; 5]).is_err());

        let hvo = HvoArray::from_rows(&[vec![1.0, 1.0, 0.0], vec![0.0; 3]]).unwrap();
        assert_eq!(hvo.steps(), 2);
        assert_eq!(hvo.voices(), 1);
    }
}
