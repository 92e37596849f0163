use crate::error::{HvoError, Result};
use crate::serializer::PairSet;
use log::info;
use std::path::{Path, PathBuf};

pub const PAIRS_FILE: &str = "hvo_pairs.hvop";
pub const METADATA_FILE: &str = "metadata.csv";

/// Per-sequence metadata loaded from a split's CSV file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MetadataTable {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            rows.push(record?.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every value of the named column, or `None` if there is no such header.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|h| h == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitData {
    pub pairs: PairSet,
    pub metadata: Option<MetadataTable>,
}

/// Read access to a serialized dataset laid out as `root/{train,test,validation}`.
#[derive(Debug, Clone)]
pub struct HvoSets {
    root: PathBuf,
}

impl HvoSets {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let train = root.join("train");
        if !train.is_dir() {
            return Err(HvoError::NotADirectory(train));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn train_set(&self) -> Result<SplitData> {
        self.load_split("train")
    }

    pub fn test_set(&self) -> Result<SplitData> {
        self.load_split("test")
    }

    pub fn validation_set(&self) -> Result<SplitData> {
        self.load_split("validation")
    }

    fn load_split(&self, name: &str) -> Result<SplitData> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(HvoError::NotADirectory(dir));
        }

        let pairs = PairSet::load(&dir.join(PAIRS_FILE))?;

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = if metadata_path.is_file() {
            Some(MetadataTable::read(&metadata_path)?)
        } else {
            None
        };

        info!(
            "Loaded {} {} sequences{}..!",
            pairs.len(),
            name,
            if metadata.is_some() { " with metadata" } else { "" }
        );

        Ok(SplitData { pairs, metadata })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hvo::HvoArray;
    use crate::serializer::HvoPair;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_split(root: &Path, name: &str, pairs: usize) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();

        let mut set = PairSet::new(8, 27);
        for _ in 0..pairs {
            set.push(HvoPair {
                monotonic: HvoArray::zeros(8, 9),
                full: HvoArray::zeros(8, 9),
            })
            .unwrap();
        }
        set.save(&dir.join(PAIRS_FILE)).unwrap();
    }

    #[test]
    fn missing_train_split_is_not_a_directory() {
        let root = TempDir::new().unwrap();
        assert!(matches!(HvoSets::open(root.path()), Err(HvoError::NotADirectory(_))));
    }

    #[test]
    fn loads_pairs_and_optional_metadata() {
        env_logger::try_init().unwrap_or(());

        let root = TempDir::new().unwrap();
        write_split(root.path(), "train", 3);
        write_split(root.path(), "test", 1);
        fs::write(
            root.path().join("train").join(METADATA_FILE),
            "drummer,style,bpm\ndrummer1,funk,96\ndrummer3,rock,120\ndrummer7,jazz,140\n",
        )
        .unwrap();

        let sets = HvoSets::open(root.path()).unwrap();

        let train = sets.train_set().unwrap();
        assert_eq!(train.pairs.len(), 3);
        let metadata = train.metadata.unwrap();
        assert_eq!(metadata.headers, vec!["drummer", "style", "bpm"]);
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.column("style"), Some(vec!["funk", "rock", "jazz"]));
        assert_eq!(metadata.column("tempo"), None);

        let test = sets.test_set().unwrap();
        assert_eq!(test.pairs.len(), 1);
        assert!(test.metadata.is_none());

        assert!(matches!(sets.validation_set(), Err(HvoError::NotADirectory(_))));
    }
}
