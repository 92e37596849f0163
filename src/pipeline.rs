use crate::error::{HvoError, Result};
use crate::hvo::{HvoArray, decode, embed_monotonic, encode_sequence, reduce};
use crate::midi_importer::import_midi_file;
use crate::midi_writer::write_midi_file;
use crate::model::config::PipelineConfig;
use crate::model::mappings::output_pitches;
use crate::model::sequence::TempoContext;
use crate::partition::{PartitionPlan, PartitionReport, partition};
use crate::rng::SplitRng;
use crate::serializer::{PAIR_EXTENSION, SerializationReport, serialize_pairs};
use anyhow::Context;
use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const AUG_PARAMS_FILE: &str = "augParams.txt";
pub const SPLIT_NAMES: [&str; 3] = ["training", "test", "validation"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub partition: PartitionReport,
    pub training: SerializationReport,
    pub test: SerializationReport,
    pub validation: SerializationReport,
    pub outputs: Vec<PathBuf>,
}

impl ProcessReport {
    pub fn pairs_written(&self) -> usize {
        self.training.pairs_written + self.test.pairs_written + self.validation.pairs_written
    }

    pub fn errors(&self) -> usize {
        self.training.errors + self.test.errors + self.validation.errors
    }
}

/// `<parent of processed_dir>/partitioned`
pub fn partition_root(processed_dir: &Path) -> PathBuf {
    match processed_dir.parent() {
        Some(parent) => parent.join("partitioned"),
        None => processed_dir.join("partitioned"),
    }
}

/// Record augmentation parameters next to the serialized splits. Never overwrites.
pub fn write_aug_params(processed_dir: &Path, params: &str) -> Result<PathBuf> {
    let path = processed_dir.join(AUG_PARAMS_FILE);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => {
                HvoError::Precondition(format!("{} already exists", path.display()))
            }
            _ => HvoError::Io(e),
        })?;

    writeln!(file, "{}", params)?;
    Ok(path)
}

/// Partition `source_dir` and serialize each split into `processed_dir`.
///
/// Refuses to run if `processed_dir` already has anything in it. The split
/// directories are created under [`partition_root`].
pub fn process(
    source_dir: &Path,
    processed_dir: &Path,
    config: &PipelineConfig,
    aug_params: Option<&str>,
) -> anyhow::Result<ProcessReport> {
    if !source_dir.is_dir() {
        return Err(HvoError::NotADirectory(source_dir.to_path_buf()).into());
    }
    config.validate()?;

    fs::create_dir_all(processed_dir)
        .with_context(|| format!("Failed to create {}", processed_dir.display()))?;
    if fs::read_dir(processed_dir)?.next().is_some() {
        return Err(HvoError::Precondition(format!(
            "{} is not empty, refusing to overwrite processed output",
            processed_dir.display()
        ))
        .into());
    }

    let partitioned = partition_root(processed_dir);
    let split_dirs = SPLIT_NAMES.map(|name| partitioned.join(name));
    for dir in split_dirs.iter() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let plan = PartitionPlan {
        train_dir: &split_dirs[0],
        test_dir: &split_dirs[1],
        validation_dir: &split_dirs[2],
        test_fraction: config.test_fraction,
        validation_fraction: config.validation_fraction,
    };
    let mut rng = SplitRng::new(config.seed);
    let partition = partition(source_dir, &plan, &mut rng).context("Failed to partition the corpus")?;

    let suffix = if aug_params.is_some() { "_aug" } else { "" };
    let mut outputs = Vec::with_capacity(SPLIT_NAMES.len());
    let mut reports = [SerializationReport::default(); 3];
    for (i, name) in SPLIT_NAMES.iter().enumerate() {
        let output = processed_dir.join(format!("{}{}.{}", name, suffix, PAIR_EXTENSION));
        reports[i] = serialize_pairs(&split_dirs[i], &output, config)
            .with_context(|| format!("Failed to serialize the {} split", name))?;
        outputs.push(output);
    }

    if let Some(params) = aug_params {
        let path = write_aug_params(processed_dir, params)?;
        debug!("Wrote augmentation parameters to {}", path.display());
    }

    let [training, test, validation] = reports;
    let report = ProcessReport {
        partition,
        training,
        test,
        validation,
        outputs,
    };
    info!(
        "Processed {} files: {} pairs written, {} errors..!",
        report.partition.total(),
        report.pairs_written(),
        report.errors()
    );

    Ok(report)
}

/// Decode an HVO array and write it out as MIDI.
pub fn hvo_to_midi(hvo: &HvoArray, ctx: &TempoContext, pitch_map: &[u8], out: &Path) -> Result<()> {
    let events = decode(hvo, ctx, pitch_map)?;
    debug!("Writing {} decoded hits to {}", events.len(), out.display());
    write_midi_file(&events, ctx, out)
}

/// Reduce a drum MIDI file to its monotonic line and write that back out as MIDI.
///
/// The monotonic lane is played on the voice at `config.monotonic_voice`.
/// Returns the embedded monotonic array that was written.
pub fn midi_to_monotonic_midi(input: &Path, output: &Path, config: &PipelineConfig) -> Result<HvoArray> {
    let sequence = import_midi_file(input, &config.beat_division_factors)?;
    let full = encode_sequence(&sequence, config.tie_break)?;
    let mono = reduce(&full, config.policy, &config.voice_priority)?;
    let mono = embed_monotonic(&mono, full.voices(), config.monotonic_voice)?;

    hvo_to_midi(&mono, &sequence.tempo, &output_pitches(), output)?;
    Ok(mono)
}
