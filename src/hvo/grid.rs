use crate::error::{HvoError, Result};
use crate::model::sequence::TempoContext;

/// Onsets further out than this many beats are rejected rather than gridded.
pub const MAX_GRID_BEATS: usize = 1 << 16;

/// Where an onset lands on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub step: usize,
    /// Signed deviation from the step, in units of that step's width.
    /// Not clamped, and not finite when the grid itself is degenerate.
    pub offset: f64,
}

/// Quantization grid derived from a tempo context.
///
/// Beat `i` is split into `factors[i % factors.len()]` equal steps, so the
/// grid repeats every `factors.len()` beats.
#[derive(Debug, Clone)]
pub struct Grid {
    beat_duration: f64,
    factors: Vec<u32>,
    cycle_starts: Vec<usize>,
    cycle_steps: usize,
}

impl Grid {
    pub fn new(ctx: &TempoContext) -> Result<Self> {
        if ctx.beat_division_factors.is_empty() || ctx.beat_division_factors.contains(&0) {
            return Err(HvoError::Shape(format!(
                "beat division factors must be non-empty and positive, got {:?}",
                ctx.beat_division_factors
            )));
        }

        let mut cycle_starts = Vec::with_capacity(ctx.beat_division_factors.len());
        let mut cycle_steps = 0usize;
        for factor in ctx.beat_division_factors.iter() {
            cycle_starts.push(cycle_steps);
            cycle_steps += *factor as usize;
        }

        Ok(Self {
            beat_duration: ctx.beat_duration(),
            factors: ctx.beat_division_factors.clone(),
            cycle_starts,
            cycle_steps,
        })
    }

    pub fn beat_duration(&self) -> f64 {
        self.beat_duration
    }

    fn division(&self, beat: usize) -> usize {
        self.factors[beat % self.factors.len()] as usize
    }

    /// First step of `beat`. Also the number of steps spanned by `beat` whole beats.
    pub fn beat_start(&self, beat: usize) -> usize {
        let len = self.factors.len();
        (beat / len) * self.cycle_steps + self.cycle_starts[beat % len]
    }

    /// `(beat, subdivision)` of a step.
    fn locate(&self, step: usize) -> (usize, usize) {
        let cycle = step / self.cycle_steps;
        let rem = step % self.cycle_steps;
        let in_cycle = self.cycle_starts.partition_point(|&start| start <= rem) - 1;

        (
            cycle * self.factors.len() + in_cycle,
            rem - self.cycle_starts[in_cycle],
        )
    }

    pub fn beat_of(&self, step: usize) -> usize {
        self.locate(step).0
    }

    pub fn step_time(&self, step: usize) -> f64 {
        let (beat, sub) = self.locate(step);
        (beat as f64 + sub as f64 / self.division(beat) as f64) * self.beat_duration
    }

    pub fn step_duration(&self, step: usize) -> f64 {
        self.beat_duration / self.division(self.beat_of(step)) as f64
    }

    /// Snap a time to its nearest step.
    ///
    /// A degenerate grid (zero or non-finite beat length) can't place anything,
    /// so the onset goes on step 0 carrying the non-finite position as its offset.
    pub fn nearest_step(&self, time: f64) -> Result<Placement> {
        let beat_pos = time / self.beat_duration;
        if !beat_pos.is_finite() {
            return Ok(Placement {
                step: 0,
                offset: beat_pos,
            });
        }

        if beat_pos >= MAX_GRID_BEATS as f64 {
            return Err(HvoError::Shape(format!(
                "onset at {:.3}s lies beyond {} beats",
                time, MAX_GRID_BEATS
            )));
        }

        let beat_pos = beat_pos.max(0.0);
        let mut beat = beat_pos.floor() as usize;
        let division = self.division(beat);
        let mut sub = ((beat_pos - beat as f64) * division as f64).round() as usize;
        if sub >= division {
            beat += 1;
            sub = 0;
        }

        let step = self.beat_start(beat) + sub;
        Ok(Placement {
            step,
            offset: (time - self.step_time(step)) / self.step_duration(step),
        })
    }
}
