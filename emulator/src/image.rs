use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;
use tracing::warn;

use crate::constants::{Address, Word, MEMORY_SIZE};
use crate::runtime::Memory;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("could not read image file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while reading image: {0}")]
    Io(#[from] io::Error),

    #[error("image has no origin word")]
    MissingOrigin,

    #[error("image ends in the middle of a word")]
    TruncatedWord,
}

/// A parsed image file: an origin address and the words placed there.
///
/// On disk an image is a stream of big-endian 16-bit words, the first one
/// being the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub origin: Address,
    pub words: Vec<Word>,
}

impl Image {
    /// Parse an image from a byte stream.
    ///
    /// Reading stops at end of stream, or once the payload would run past
    /// the end of memory.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, ImageError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;

        if raw.len() < 2 {
            return Err(ImageError::MissingOrigin);
        }
        if raw.len() % 2 != 0 {
            return Err(ImageError::TruncatedWord);
        }

        let origin = BigEndian::read_u16(&raw[..2]);
        let mut words: Vec<Word> = raw[2..].chunks_exact(2).map(BigEndian::read_u16).collect();

        let capacity = MEMORY_SIZE - usize::from(origin);
        if words.len() > capacity {
            warn!(
                origin = format_args!("{origin:#06x}"),
                dropped = words.len() - capacity,
                "image runs past the end of memory, truncating"
            );
            words.truncate(capacity);
        }

        Ok(Image { origin, words })
    }

    /// Parse the image file at `path`.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let file = File::open(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_from(BufReader::new(file))
    }

    /// Copy the payload into memory starting at the origin.
    pub fn load_into(&self, memory: &mut Memory) {
        for (offset, &word) in self.words.iter().enumerate() {
            memory.set(self.origin.wrapping_add(offset as Address), word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_origin_and_words() {
        let bytes = [0x30, 0x00, 0xBE, 0xEF, 0x12, 0x34];
        let image = Image::read_from(&bytes[..]).unwrap();
        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![0xBEEF, 0x1234]);

        let mut memory = Memory::default();
        image.load_into(&mut memory);
        assert_eq!(memory.get(0x3000), 0xBEEF);
        assert_eq!(memory.get(0x3001), 0x1234);
        assert_eq!(memory.get(0x2FFF), 0);
        assert_eq!(memory.get(0x3002), 0);
    }

    #[test]
    fn origin_only_image_is_valid_and_empty() {
        let image = Image::read_from(&[0x30, 0x00][..]).unwrap();
        assert_eq!(image.origin, 0x3000);
        assert!(image.words.is_empty());
    }

    #[test]
    fn empty_stream_is_missing_its_origin() {
        assert!(matches!(
            Image::read_from(&[][..]),
            Err(ImageError::MissingOrigin)
        ));
        assert!(matches!(
            Image::read_from(&[0x30][..]),
            Err(ImageError::MissingOrigin)
        ));
    }

    #[test]
    fn odd_byte_count_is_a_truncated_word() {
        assert!(matches!(
            Image::read_from(&[0x30, 0x00, 0xBE][..]),
            Err(ImageError::TruncatedWord)
        ));
    }

    #[test]
    fn payload_is_capped_at_the_end_of_memory() {
        let bytes = [0xFF, 0xFE, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04];
        let image = Image::read_from(&bytes[..]).unwrap();
        assert_eq!(image.origin, 0xFFFE);
        assert_eq!(image.words, vec![0x0001, 0x0002]);
    }

    #[test]
    fn later_images_overwrite_overlapping_regions() {
        let mut memory = Memory::default();
        Image {
            origin: 0x3000,
            words: vec![0x1111, 0x2222, 0x3333],
        }
        .load_into(&mut memory);
        Image {
            origin: 0x3001,
            words: vec![0xAAAA],
        }
        .load_into(&mut memory);

        assert_eq!(memory.get(0x3000), 0x1111);
        assert_eq!(memory.get(0x3001), 0xAAAA);
        assert_eq!(memory.get(0x3002), 0x3333);
    }
}
