//! Binary dataset storage.
//!
//! A dataset file is a fixed little-endian header followed by the packed
//! payload:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("PDTD")
//! 4       1     Format version
//! 5       3     Reserved
//! 8       4     Number of rows
//! 12      4     Number of columns
//! 16      4     Number of distinct labels
//! 20      ...   f32 features, row-major (rows x cols)
//! ...     ...   i32 labels (rows)
//! ```
//!
//! [`Dataset::read_from`] and [`Dataset::write_to`] are exact inverses;
//! shuffling and fractional subsampling are applied separately by
//! [`load_training`].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::{DataError, Dataset};

/// Magic bytes identifying a dataset file.
pub const MAGIC: &[u8; 4] = b"PDTD";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 20;

/// Errors raised while reading a dataset file.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a dataset file (bad magic)")]
    NotADataset,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("row {row} has negative label {label}")]
    NegativeLabel { row: usize, label: i32 },

    #[error("dataset dimensions overflow: {rows} rows x {cols} cols")]
    DimensionOverflow { rows: u32, cols: u32 },

    #[error(transparent)]
    Invalid(#[from] DataError),
}

impl Dataset {
    /// Read a dataset file. Exact inverse of [`Dataset::write_to`].
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(ReadError::NotADataset);
        }
        if header[4] > FORMAT_VERSION {
            return Err(ReadError::UnsupportedVersion(header[4]));
        }
        let num_rows = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let num_cols = u32::from_le_bytes(header[12..16].try_into().unwrap());
        let num_labels = u32::from_le_bytes(header[16..20].try_into().unwrap());

        let n_values = (num_rows as usize)
            .checked_mul(num_cols as usize)
            .ok_or(ReadError::DimensionOverflow {
                rows: num_rows,
                cols: num_cols,
            })?;

        let mut payload = vec![0u8; n_values * 4];
        reader.read_exact(&mut payload)?;
        let features: Vec<f32> = payload
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
            .collect();

        let mut payload = vec![0u8; num_rows as usize * 4];
        reader.read_exact(&mut payload)?;
        let mut labels = Vec::with_capacity(num_rows as usize);
        for (row, chunk) in payload.chunks_exact(4).enumerate() {
            let label = i32::from_le_bytes(chunk.try_into().unwrap());
            if label < 0 {
                return Err(ReadError::NegativeLabel { row, label });
            }
            labels.push(label as u32);
        }

        Ok(Dataset::new(
            features,
            labels,
            num_cols as usize,
            num_labels,
        )?)
    }

    /// Write the dataset. Exact inverse of [`Dataset::read_from`].
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(MAGIC);
        header[4] = FORMAT_VERSION;
        header[8..12].copy_from_slice(&(self.n_rows() as u32).to_le_bytes());
        header[12..16].copy_from_slice(&(self.num_cols() as u32).to_le_bytes());
        header[16..20].copy_from_slice(&self.num_labels().to_le_bytes());
        writer.write_all(&header)?;

        for &value in self.features() {
            writer.write_all(&value.to_le_bytes())?;
        }
        for &label in self.labels() {
            writer.write_all(&(label as i32).to_le_bytes())?;
        }
        writer.flush()
    }
}

/// Load a training set: read the file, then apply the seeded permutation and
/// fractional subsample.
pub fn load_training(
    path: impl AsRef<Path>,
    seed: u64,
    fraction: f64,
) -> Result<Dataset, ReadError> {
    let data = Dataset::read_from(path)?;
    Ok(data.sample(seed, fraction))
}
