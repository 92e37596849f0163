// Batch conversion of a MIDI directory into (monotonic, full) HVO pairs, and
// the `.hvop` container those pairs are stored in.
//
// Container layout, all integers little-endian:
//
//   magic          b"HVOP"
//   version        u16
//   layout         u16   channel layout code, 1 = [hits | velocities | offsets]
//   pair_count     u32
//   time_steps     u32
//   features       u32
//   voices         u32
//   pair_count x {
//     monotonic    u32 rows, u32 cols, rows * cols f32
//     full         u32 rows, u32 cols, rows * cols f32
//   }

use crate::error::{HvoError, Result};
use crate::hvo::{HvoArray, check_sequence, embed_monotonic, encode_sequence, pad, reduce};
use crate::midi_importer::import_midi_file;
use crate::model::config::PipelineConfig;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const PAIR_MAGIC: &[u8; 4] = b"HVOP";
pub const PAIR_FORMAT_VERSION: u16 = 1;
pub const LAYOUT_BLOCKED_CHANNELS: u16 = 1;
pub const PAIR_EXTENSION: &str = "hvop";

/// One training example. Both halves share the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct HvoPair {
    pub monotonic: HvoArray,
    pub full: HvoArray,
}

/// A homogeneous list of pairs, as stored in one `.hvop` file.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSet {
    pub time_steps: usize,
    pub features: usize,
    pub pairs: Vec<HvoPair>,
}

impl PairSet {
    pub fn new(time_steps: usize, features: usize) -> Self {
        Self {
            time_steps,
            features,
            pairs: Vec::new(),
        }
    }

    pub fn voices(&self) -> usize {
        self.features / 3
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Add a pair, refusing anything that doesn't match the set's shape.
    pub fn push(&mut self, pair: HvoPair) -> Result<()> {
        for (half, hvo) in [("monotonic", &pair.monotonic), ("full", &pair.full)] {
            if hvo.steps() != self.time_steps || hvo.features() != self.features {
                return Err(HvoError::InvariantViolation(format!(
                    "{} array is [{}, {}], expected [{}, {}]",
                    half,
                    hvo.steps(),
                    hvo.features(),
                    self.time_steps,
                    self.features
                )));
            }
        }

        self.pairs.push(pair);
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.features == 0 || self.features % 3 != 0 {
            return Err(HvoError::Shape(format!(
                "feature count {} is not a positive multiple of 3",
                self.features
            )));
        }

        writer.write_all(PAIR_MAGIC)?;
        writer.write_all(&PAIR_FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&LAYOUT_BLOCKED_CHANNELS.to_le_bytes())?;
        for value in [self.pairs.len(), self.time_steps, self.features, self.voices()] {
            write_u32(writer, value)?;
        }

        for pair in self.pairs.iter() {
            write_tensor(writer, &pair.monotonic)?;
            write_tensor(writer, &pair.full)?;
        }

        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_exact(reader, &mut magic)?;
        if &magic != PAIR_MAGIC {
            return Err(HvoError::Format(format!("bad magic {:?}", magic)));
        }

        let version = read_u16(reader)?;
        if version != PAIR_FORMAT_VERSION {
            return Err(HvoError::Format(format!(
                "unsupported version {}, expected {}",
                version, PAIR_FORMAT_VERSION
            )));
        }

        let layout = read_u16(reader)?;
        if layout != LAYOUT_BLOCKED_CHANNELS {
            return Err(HvoError::Format(format!("unknown channel layout {}", layout)));
        }

        let pair_count = read_u32(reader)?;
        let time_steps = read_u32(reader)?;
        let features = read_u32(reader)?;
        let voices = read_u32(reader)?;
        if features == 0 || features % 3 != 0 || voices * 3 != features {
            return Err(HvoError::Format(format!(
                "header declares {} features over {} voices",
                features, voices
            )));
        }

        let mut set = PairSet::new(time_steps, features);
        for i in 0..pair_count {
            let monotonic = read_tensor(reader, time_steps, features)?;
            let full = read_tensor(reader, time_steps, features)?;
            set.push(HvoPair { monotonic, full }).map_err(|e| {
                HvoError::Format(format!("pair {}: {}", i, e))
            })?;
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(HvoError::Format(format!(
                "trailing bytes after {} pairs",
                pair_count
            )));
        }

        Ok(set)
    }

    /// Write to `path` through a temporary sibling, so a failed write never
    /// leaves a half-written container behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Err(e) = self.write_file(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

fn write_u32<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| HvoError::Shape(format!("{} does not fit the container's u32 fields", value)))?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_tensor<W: Write>(writer: &mut W, hvo: &HvoArray) -> Result<()> {
    write_u32(writer, hvo.steps())?;
    write_u32(writer, hvo.features())?;
    for value in hvo.as_slice().iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => HvoError::Format("container is truncated".into()),
        _ => HvoError::Io(e),
    })
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact(reader, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<usize> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf) as usize)
}

fn read_tensor<R: Read>(reader: &mut R, time_steps: usize, features: usize) -> Result<HvoArray> {
    let rows = read_u32(reader)?;
    let cols = read_u32(reader)?;
    if rows != time_steps || cols != features {
        return Err(HvoError::Format(format!(
            "tensor is [{}, {}], header says [{}, {}]",
            rows, cols, time_steps, features
        )));
    }

    let count = rows
        .checked_mul(cols)
        .ok_or_else(|| HvoError::Format(format!("tensor of [{}, {}] is too large", rows, cols)))?;

    let mut data = Vec::with_capacity(cols);
    let mut buf = [0u8; 4];
    for _ in 0..count {
        read_exact(reader, &mut buf)?;
        data.push(f32::from_le_bytes(buf));
    }

    HvoArray::from_flat(rows, cols, data)
}

/// Outcome of one [`serialize_pairs`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializationReport {
    pub pairs_written: usize,
    pub errors: usize,
}

fn is_midi_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
}

/// Every MIDI file directly inside `dir`, sorted by path.
pub fn midi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(HvoError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_midi_file(&path) {
            files.push(path);
        } else {
            debug!("Skipping non-MIDI entry {}", path.display());
        }
    }

    files.sort();
    Ok(files)
}

/// Parse, encode, reduce and pad one file. Errors here are per-file unless fatal.
fn convert_file(path: &Path, config: &PipelineConfig) -> Result<HvoPair> {
    let sequence = import_midi_file(path, &config.beat_division_factors)?;
    let full = encode_sequence(&sequence, config.tie_break)?;

    let mono = reduce(&full, config.policy, &config.voice_priority)?;
    let mono = embed_monotonic(&mono, full.voices(), config.monotonic_voice)?;
    check_sequence(&mono, &path.display().to_string())?;

    if mono.steps() != full.steps() {
        return Err(HvoError::InvariantViolation(format!(
            "monotonic array has {} steps, full array has {}",
            mono.steps(),
            full.steps()
        )));
    }

    Ok(HvoPair {
        monotonic: pad(&mono, config.time_steps)?,
        full: pad(&full, config.time_steps)?,
    })
}

/// Convert every MIDI file in `source_dir` into an HVO pair and store them all at `output_path`.
///
/// A file that fails to parse or convert is logged, counted, and skipped.
/// Unusable settings, or a pair that comes out with the wrong shape, abort
/// the batch before anything is written. Pairs are stored in file-name order.
pub fn serialize_pairs(source_dir: &Path, output_path: &Path, config: &PipelineConfig) -> Result<SerializationReport> {
    config.validate()?;

    let files = midi_files(source_dir)?;
    debug!(
        "Serializing {} MIDI files from {} into [{}, {}] pairs..!",
        files.len(),
        source_dir.display(),
        config.time_steps,
        config.features
    );

    let mut set = PairSet::new(config.time_steps, config.features);
    let mut errors = 0usize;

    for path in files.iter() {
        match convert_file(path, config) {
            Ok(pair) => set.push(pair).map_err(|e| HvoError::conversion(path, e))?,
            Err(e) if e.is_fatal() => return Err(HvoError::conversion(path, e)),
            Err(e) => {
                let e = HvoError::conversion(path, e);
                warn!("{}", e);
                errors += 1;
            }
        }
    }

    set.save(output_path)?;

    let report = SerializationReport {
        pairs_written: set.len(),
        errors,
    };
    info!(
        "Serialized {} HVO pairs to {}, {} errors occurred..!",
        report.pairs_written,
        output_path.display(),
        report.errors
    );

    Ok(report)
}
