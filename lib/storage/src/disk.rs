use crate::sink::QuadSink;
use facadex_common::error::{CorruptionError, StorageError};
use facadex_model::{Dataset, Quad};
use oxrdfio::{RdfFormat, RdfParser, RdfSerializer};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

const DATA_FILE: &str = "data.nq";
const TMP_FILE: &str = "data.nq.tmp";

/// On-disk graph store backing one materialized build.
///
/// Quads are collected in memory during the build and persisted to an
/// N-Quads file inside the store directory when the producer finishes.
/// Opening a store without the reuse flag deletes the previous directory
/// first; with it, the persisted quads are loaded back.
pub struct DiskStore {
    dir: PathBuf,
    dataset: Dataset,
}

impl DiskStore {
    /// Opens the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, reuse: bool) -> Result<Self, StorageError> {
        let dir = dir.into();
        if !reuse {
            remove_dir_if_present(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let mut dataset = Dataset::new();
        let data = dir.join(DATA_FILE);
        if reuse && data.exists() {
            let reader = BufReader::new(File::open(&data)?);
            for quad in RdfParser::from_format(RdfFormat::NQuads).for_reader(reader) {
                let quad = quad.map_err(CorruptionError::new)?;
                dataset.insert(&quad);
            }
        }
        Ok(Self { dir, dataset })
    }

    /// Returns the directory this store lives in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the quads collected so far.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Consumes the store and returns the collected quads.
    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Writes the collected quads to the data file.
    ///
    /// The file is replaced atomically so that a failed write never leaves a
    /// truncated store behind.
    fn persist(&self) -> Result<(), StorageError> {
        let tmp = self.dir.join(TMP_FILE);
        let writer = BufWriter::new(File::create(&tmp)?);
        let mut serializer = RdfSerializer::from_format(RdfFormat::NQuads).for_writer(writer);
        for quad in self.dataset.iter() {
            serializer.serialize_quad(quad)?;
        }
        serializer.finish()?.flush()?;
        fs::rename(&tmp, self.dir.join(DATA_FILE))?;
        Ok(())
    }
}

impl QuadSink for DiskStore {
    fn put(&mut self, quad: Quad) -> Result<bool, StorageError> {
        Ok(self.dataset.insert(&quad))
    }

    fn finish(&mut self) -> Result<(), StorageError> {
        self.persist()
    }
}

fn remove_dir_if_present(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}
