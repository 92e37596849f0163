use crate::error::{HvoError, Result};
use crate::hvo::{MonoPolicy, TieBreak, VoicePriority};
use crate::model::mappings::{DrumVoice, VOICE_COUNT};
use crate::partition::{DEFAULT_TEST_FRACTION, DEFAULT_VALIDATION_FRACTION};
use crate::util::{parse_policy, parse_tie_break};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Printed to stderr when no source is given.
pub const USAGE: &str = "Usage: groove_hvo <SOURCE_DIR> [--processed-dir <DIR>] [--aug-params <PARAMS>]";

#[derive(Parser, Debug)]
#[command(
    name = "groove_hvo",
    about = "Split a MIDI drum corpus and serialize it as (monotonic, full) HVO training pairs!"
)]
pub struct Args {
    /// Directory of MIDI files to partition and serialize.
    /// With `--render-monotonic`, a single MIDI file to reduce instead.
    pub source: Option<PathBuf>,

    /// Where the serialized splits are written. Must be empty or absent.
    #[arg(long = "processed-dir", default_value = "processed")]
    pub processed_dir: PathBuf,

    /// Seed for the train/test/validation split. Defaults to 0.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Fraction of the corpus moved to the test split. Defaults to 0.1.
    #[arg(long = "test-fraction")]
    pub test_fraction: Option<f64>,

    /// Fraction of the corpus moved to the validation split. Defaults to 0.1.
    #[arg(long = "validation-fraction")]
    pub validation_fraction: Option<f64>,

    /// Canonical sequence length every pair is padded to. Defaults to 32.
    #[arg(short, long = "time-steps")]
    pub time_steps: Option<usize>,

    /// Monotonic reduction policy: priority|loudest|earliest.
    #[arg(short, long)]
    pub policy: Option<String>,

    /// Which hit keeps a grid cell when one voice lands on a step twice: loudest|last.
    #[arg(long = "tie-break")]
    pub tie_break: Option<String>,

    /// Augmentation parameters to record alongside the output. Output files get an `_aug` suffix.
    #[arg(long = "aug-params")]
    pub aug_params: Option<String>,

    /// JSON pipeline config. Flags given on the command line take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the monotonic reduction of `source` to this MIDI file and exit.
    #[arg(long = "render-monotonic")]
    pub render_monotonic: Option<PathBuf>,

    /// Prints extra information to the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything the batch pipeline needs besides its directories.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub time_steps: usize,
    pub features: usize,
    pub test_fraction: f64,
    pub validation_fraction: f64,
    pub seed: u64,
    pub policy: MonoPolicy,
    pub voice_priority: VoicePriority,
    /// Voice column the monotonic lane occupies inside a full-width pair.
    pub monotonic_voice: usize,
    pub beat_division_factors: Vec<u32>,
    pub tie_break: TieBreak,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_steps: 32,
            features: VOICE_COUNT * 3,
            test_fraction: DEFAULT_TEST_FRACTION,
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
            seed: 0,
            policy: MonoPolicy::default(),
            voice_priority: VoicePriority::canonical(VOICE_COUNT),
            monotonic_voice: DrumVoice::ClosedHiHat.index(),
            beat_division_factors: vec![4],
            tie_break: TieBreak::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reject settings that would fail every file the same way.
    pub fn validate(&self) -> Result<()> {
        if self.beat_division_factors.is_empty() || self.beat_division_factors.contains(&0) {
            return Err(HvoError::Precondition(format!(
                "beat division factors must be non-empty and positive, got {:?}",
                self.beat_division_factors
            )));
        }

        if self.voice_priority.len() != VOICE_COUNT {
            return Err(HvoError::Precondition(format!(
                "voice priority covers {} voices, the drum mapping has {}",
                self.voice_priority.len(),
                VOICE_COUNT
            )));
        }

        if self.monotonic_voice >= VOICE_COUNT {
            return Err(HvoError::Precondition(format!(
                "monotonic voice {} is out of range for {} voices",
                self.monotonic_voice, VOICE_COUNT
            )));
        }

        Ok(())
    }

    /// Overlay any flags the user actually passed.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(seed) = args.seed {
            self.seed = seed;
        }
        if let Some(fraction) = args.test_fraction {
            self.test_fraction = fraction;
        }
        if let Some(fraction) = args.validation_fraction {
            self.validation_fraction = fraction;
        }
        if let Some(steps) = args.time_steps {
            self.time_steps = steps;
        }
        if let Some(policy) = args.policy.as_deref() {
            self.policy = parse_policy(policy);
        }
        if let Some(tie_break) = args.tie_break.as_deref() {
            self.tie_break = parse_tie_break(tie_break);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "seed": 7, "policy": "priority", "voice_priority": [1, 0, 2, 3, 4, 5, 6, 7, 8] }"#)
                .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.policy, MonoPolicy::Priority);
        assert_eq!(config.voice_priority.order()[0], 1);
        assert_eq!(config.time_steps, 32);
        assert_eq!(config.features, 27);
        assert_eq!(config.monotonic_voice, 2);
        assert_eq!(config.beat_division_factors, vec![4]);
    }

    #[test]
    fn bad_priority_is_rejected() {
        let parsed = serde_json::from_str::<PipelineConfig>(r#"{ "voice_priority": [0, 0, 1] }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn contract_breaking_settings_are_preconditions() {
        assert!(PipelineConfig::default().validate().is_ok());

        let broken = [
            PipelineConfig {
                monotonic_voice: 12,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                voice_priority: VoicePriority::canonical(3),
                ..PipelineConfig::default()
            },
            PipelineConfig {
                beat_division_factors: vec![],
                ..PipelineConfig::default()
            },
            PipelineConfig {
                beat_division_factors: vec![4, 0],
                ..PipelineConfig::default()
            },
        ];
        for config in broken.iter() {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, HvoError::Precondition(_)));
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn source_is_optional_at_parse_time() {
        let args = Args::parse_from(["groove_hvo"]);
        assert!(args.source.is_none());
        assert!(args.render_monotonic.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "groove_hvo",
            "corpus",
            "--seed",
            "11",
            "--policy",
            "earliest",
            "--time-steps",
            "64",
        ]);

        let mut config = PipelineConfig {
            seed: 3,
            test_fraction: 0.2,
            ..PipelineConfig::default()
        };
        config.apply_args(&args);

        assert_eq!(args.source, Some(PathBuf::from("corpus")));
        assert_eq!(args.processed_dir, PathBuf::from("processed"));
        assert_eq!(config.seed, 11);
        assert_eq!(config.policy, MonoPolicy::Earliest);
        assert_eq!(config.time_steps, 64);
        assert_eq!(config.test_fraction, 0.2);
    }
}
