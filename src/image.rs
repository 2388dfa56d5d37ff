//! Persisting emulated arrays between runs
//!
//! A NOR image is the raw array. A NAND image is a list of programmed pages,
//! each stored as a little-endian row number followed by main and spare
//! bytes; pages that are not listed are erased.

use sflash_dummy::DummyNand;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from loading an image file
#[derive(Debug, Error)]
pub enum ImageError {
    /// Reading or writing the file failed
    #[error("image file I/O")]
    Io(#[from] io::Error),
    /// NOR image larger than the emulated part
    #[error("image holds {len} bytes, the part only {capacity}")]
    TooLarge { len: usize, capacity: usize },
    /// NAND image length is not a whole number of records
    #[error("image length {len} is not a multiple of the {record}-byte page record")]
    Truncated { len: usize, record: usize },
}

/// Read a NOR image if the file exists
pub fn load_nor(path: &Path, capacity: usize) -> Result<Option<Vec<u8>>, ImageError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path)?;
    if data.len() > capacity {
        return Err(ImageError::TooLarge {
            len: data.len(),
            capacity,
        });
    }
    log::debug!("loaded {} bytes from {}", data.len(), path.display());
    Ok(Some(data))
}

/// Store a NOR array
pub fn save_nor(path: &Path, data: &[u8]) -> Result<(), ImageError> {
    fs::write(path, data)?;
    log::debug!("saved {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// Encode the programmed pages of a NAND array
pub fn encode_nand(dummy: &DummyNand) -> Vec<u8> {
    let mut out = Vec::new();
    for (row, page) in dummy.pages() {
        out.extend_from_slice(&row.to_le_bytes());
        out.extend_from_slice(page);
    }
    out
}

/// Restore pages produced by [`encode_nand`]
pub fn decode_nand(dummy: &mut DummyNand, data: &[u8]) -> Result<(), ImageError> {
    let record = 4 + dummy.config().raw_page_size();
    if data.len() % record != 0 {
        return Err(ImageError::Truncated {
            len: data.len(),
            record,
        });
    }
    for chunk in data.chunks_exact(record) {
        let row = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        dummy.load_page(row, &chunk[4..]);
    }
    Ok(())
}

/// Load a NAND image into the emulator if the file exists
pub fn load_nand(path: &Path, dummy: &mut DummyNand) -> Result<(), ImageError> {
    if !path.exists() {
        return Ok(());
    }
    let data = fs::read(path)?;
    decode_nand(dummy, &data)?;
    log::debug!("loaded {} pages from {}", dummy.pages().count(), path.display());
    Ok(())
}

/// Store the programmed pages of a NAND array
pub fn save_nand(path: &Path, dummy: &DummyNand) -> Result<(), ImageError> {
    fs::write(path, encode_nand(dummy))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sflash_dummy::NandConfig;

    #[test]
    fn test_nand_records() {
        let mut dummy = DummyNand::new(NandConfig::default()).unwrap();
        dummy.load_page(3, &[0x12; 2048]);
        dummy.load_page(70, &[0x34; 2112]);

        let encoded = encode_nand(&dummy);
        assert_eq!(encoded.len(), 2 * (4 + 2112));
        assert_eq!(&encoded[..4], &[3, 0, 0, 0]);

        let mut restored = DummyNand::new(NandConfig::default()).unwrap();
        decode_nand(&mut restored, &encoded).unwrap();
        assert_eq!(restored.page(3), dummy.page(3));
        assert_eq!(restored.page(70).map(|p| p[2111]), Some(0x34));
        assert_eq!(restored.page(3).map(|p| p[2048]), Some(0xFF));
    }

    #[test]
    fn test_truncated_nand_image() {
        let mut dummy = DummyNand::new(NandConfig::default()).unwrap();
        assert!(matches!(
            decode_nand(&mut dummy, &[0; 10]),
            Err(ImageError::Truncated { len: 10, .. })
        ));
    }
}
