use crate::error::{HvoError, Result};
use crate::rng::SplitRng;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEST_FRACTION: f64 = 0.1;
pub const DEFAULT_VALIDATION_FRACTION: f64 = 0.1;

/// Where each file of a partitioned corpus ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub train: Vec<PathBuf>,
    pub test: Vec<PathBuf>,
    pub validation: Vec<PathBuf>,
}

impl PartitionReport {
    pub fn total(&self) -> usize {
        self.train.len() + self.test.len() + self.validation.len()
    }
}

/// Destination directories and split fractions for [`partition`].
#[derive(Debug, Clone)]
pub struct PartitionPlan<'a> {
    pub train_dir: &'a Path,
    pub test_dir: &'a Path,
    pub validation_dir: &'a Path,
    pub test_fraction: f64,
    pub validation_fraction: f64,
}

/// Sorted file names (not subdirectories) directly inside `dir`.
pub fn list_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(HvoError::NotADirectory(dir.to_path_buf()));
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    names.sort();
    Ok(names)
}

fn move_random(
    remaining: &mut Vec<String>,
    count: usize,
    source_dir: &Path,
    dest_dir: &Path,
    rng: &mut SplitRng,
) -> Result<Vec<PathBuf>> {
    let mut moved = Vec::with_capacity(count);
    for _ in 0..count {
        let name = remaining.remove(rng.index(remaining.len()));
        let new_path = dest_dir.join(&name);
        fs::rename(source_dir.join(&name), &new_path)?;
        moved.push(new_path);
    }

    Ok(moved)
}

/// Move every file out of `source_dir` into the train, test, or validation directory.
///
/// `floor(test_fraction * N)` files are drawn for test, then
/// `floor(validation_fraction * N)` of the rest for validation, and whatever
/// is left goes to train. Draws come from `rng`, so a seed reproduces a split.
pub fn partition(source_dir: &Path, plan: &PartitionPlan<'_>, rng: &mut SplitRng) -> Result<PartitionReport> {
    for fraction in [plan.test_fraction, plan.validation_fraction] {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(HvoError::Precondition(format!(
                "split fraction {} is outside [0, 1]",
                fraction
            )));
        }
    }

    if plan.test_fraction + plan.validation_fraction > 1.0 {
        return Err(HvoError::Precondition(format!(
            "test and validation fractions sum to more than 1 ({} + {})",
            plan.test_fraction, plan.validation_fraction
        )));
    }

    for dir in [plan.train_dir, plan.test_dir, plan.validation_dir] {
        if !dir.is_dir() {
            return Err(HvoError::NotADirectory(dir.to_path_buf()));
        }
    }

    info!("----------------------------------");
    info!(
        "Partitioning data from {} into {}, {}, and {}",
        source_dir.display(),
        plan.train_dir.display(),
        plan.test_dir.display(),
        plan.validation_dir.display()
    );

    let mut remaining = list_files(source_dir)?;
    let total = remaining.len();
    let test_count = (plan.test_fraction * total as f64).floor() as usize;
    let validation_count = (plan.validation_fraction * total as f64).floor() as usize;

    let test = move_random(&mut remaining, test_count, source_dir, plan.test_dir, rng)?;
    info!(
        "Moved {} randomly chosen files from {} to {}",
        test.len(),
        source_dir.display(),
        plan.test_dir.display()
    );

    let validation = move_random(&mut remaining, validation_count, source_dir, plan.validation_dir, rng)?;
    info!(
        "Moved {} randomly chosen files from {} to {}",
        validation.len(),
        source_dir.display(),
        plan.validation_dir.display()
    );

    let remaining_before_move = remaining.len();
    let mut train = Vec::with_capacity(remaining_before_move);
    for name in remaining.into_iter() {
        let new_path = plan.train_dir.join(&name);
        fs::rename(source_dir.join(&name), &new_path)?;
        train.push(new_path);
    }

    if train.len() != remaining_before_move {
        return Err(HvoError::InvariantViolation(format!(
            "remaining files: {}, files moved: {}",
            remaining_before_move,
            train.len()
        )));
    }

    info!(
        "Moved the rest of {} files from {} to {}",
        train.len(),
        source_dir.display(),
        plan.train_dir.display()
    );
    info!("----------------------------------");

    Ok(PartitionReport {
        train,
        test,
        validation,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct Layout {
        _root: TempDir,
        source: PathBuf,
        train: PathBuf,
        test: PathBuf,
        validation: PathBuf,
    }

    fn layout(files: usize) -> Layout {
        let root = TempDir::new().unwrap();
        let source = root.path().join("split");
        let train = root.path().join("training");
        let test = root.path().join("test");
        let validation = root.path().join("validation");
        for dir in [&source, &train, &test, &validation] {
            fs::create_dir(dir).unwrap();
        }
        for i in 0..files {
            fs::write(source.join(format!("groove_{:03}.mid", i)), [i as u8]).unwrap();
        }

        Layout {
            _root: root,
            source,
            train,
            test,
            validation,
        }
    }

    fn plan(l: &Layout) -> PartitionPlan<'_> {
        PartitionPlan {
            train_dir: &l.train,
            test_dir: &l.test,
            validation_dir: &l.validation,
            test_fraction: DEFAULT_TEST_FRACTION,
            validation_fraction: DEFAULT_VALIDATION_FRACTION,
        }
    }

    #[test]
    fn every_file_lands_in_exactly_one_split() {
        env_logger::try_init().unwrap_or(());

        let l = layout(37);
        let report = partition(&l.source, &plan(&l), &mut SplitRng::new(1)).unwrap();

        assert_eq!(report.test.len(), 3);
        assert_eq!(report.validation.len(), 3);
        assert_eq!(report.train.len(), 31);
        assert_eq!(report.total(), 37);
        assert!(list_files(&l.source).unwrap().is_empty());

        let mut names = HashSet::new();
        for (dir, expected) in [(&l.train, 31), (&l.test, 3), (&l.validation, 3)] {
            let files = list_files(dir).unwrap();
            assert_eq!(files.len(), expected);
            for name in files {
                assert!(names.insert(name));
            }
        }
        assert_eq!(names.len(), 37);
    }

    #[test]
    fn same_seed_same_split() {
        let a = layout(20);
        let b = layout(20);
        let ra = partition(&a.source, &plan(&a), &mut SplitRng::new(42)).unwrap();
        let rb = partition(&b.source, &plan(&b), &mut SplitRng::new(42)).unwrap();

        let names = |paths: &[PathBuf]| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };
        assert_eq!(names(&ra.test), names(&rb.test));
        assert_eq!(names(&ra.validation), names(&rb.validation));
    }

    #[test]
    fn small_corpus_goes_entirely_to_train() {
        let l = layout(9);
        let report = partition(&l.source, &plan(&l), &mut SplitRng::new(0)).unwrap();

        assert!(report.test.is_empty());
        assert!(report.validation.is_empty());
        assert_eq!(report.train.len(), 9);
    }

    #[test]
    fn missing_destination_is_rejected() {
        let l = layout(3);
        let gone = l.source.join("nope");
        let bad = PartitionPlan {
            test_dir: &gone,
            ..plan(&l)
        };

        assert!(matches!(
            partition(&l.source, &bad, &mut SplitRng::new(0)),
            Err(HvoError::NotADirectory(_))
        ));
        assert_eq!(list_files(&l.source).unwrap().len(), 3);
    }
}
