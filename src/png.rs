//! A small PNG codec for the one profile the image dialects use: 8 bits per
//! channel, truecolor, no alpha, no interlacing.
//!
//! Decoding walks the chunk list, concatenates and inflates the `IDAT`
//! payloads, then reverses the per-scanline filters into a flat [`Image`].
//! Chunk CRCs are read but never checked.

use std::fmt::{self, Debug, Write as _};
use std::path::Path;

use crate::error::{Error, Result};

mod encoder;

pub use encoder::{Filter, encode};
#[cfg(test)]
use encoder::write_chunk;

/// The eight bytes every PNG file starts with.
pub const SIGNATURE: [u8; 8] = *b"\x89PNG\r\n\x1a\n";

/// One pixel: red, green, blue.
pub type Rgb = [u8; 3];

/// Bytes per pixel for 8-bit RGB; also the filter stride.
const BPP: usize = 3;

const COLOR_TYPE_RGB: u8 = 2;

/// A grid of RGB pixels, row-major, origin at the top left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    /// Indexed by `row * width + col`.
    pixels: Vec<Rgb>,
}

impl Image {
    /// An all-black image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0]; width * height],
        }
    }

    /// Build an image from rows of equal length. Returns `None` for ragged
    /// input.
    pub fn from_rows(rows: Vec<Vec<Rgb>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: rows.into_iter().flatten().collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Rgb> {
        if row < self.height && col < self.width {
            Some(self.pixels[row * self.width + col])
        } else {
            None
        }
    }

    /// Overwrite one pixel. Out-of-bounds positions are ignored.
    pub fn set(&mut self, row: usize, col: usize, pixel: Rgb) {
        if row < self.height && col < self.width {
            self.pixels[row * self.width + col] = pixel;
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Rgb]> {
        self.pixels.chunks(self.width.max(1))
    }

    pub fn to_rows(&self) -> Vec<Vec<Rgb>> {
        self.rows().map(<[Rgb]>::to_vec).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct ChunkTag([u8; 4]);

impl ChunkTag {
    const IHDR: Self = Self(*b"IHDR");
    const IDAT: Self = Self(*b"IDAT");
    const IEND: Self = Self(*b"IEND");
}

impl Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            f.write_char(b as char)?;
        }
        Ok(())
    }
}

/// One record of the chunk stream, borrowing its payload from the file.
#[derive(Debug, Clone, Copy)]
struct Chunk<'b> {
    tag: ChunkTag,
    data: &'b [u8],
    crc: u32,
}

/// Successive chunks after the signature. Yields an error and stops if the
/// stream ends partway through a record.
struct ChunkIter<'b>(&'b [u8]);

impl<'b> ChunkIter<'b> {
    fn read(&mut self, n: usize) -> Option<&'b [u8]> {
        if self.0.len() < n {
            return None;
        }
        let (head, rest) = self.0.split_at(n);
        self.0 = rest;
        Some(head)
    }

    fn next_chunk(&mut self) -> Option<Chunk<'b>> {
        let len = u32::from_be_bytes(self.read(4)?.try_into().ok()?) as usize;
        let tag = ChunkTag(self.read(4)?.try_into().ok()?);
        let data = self.read(len)?;
        let crc = u32::from_be_bytes(self.read(4)?.try_into().ok()?);
        Some(Chunk { tag, data, crc })
    }
}

impl<'b> Iterator for ChunkIter<'b> {
    type Item = Result<Chunk<'b>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.is_empty() {
            return None;
        }
        match self.next_chunk() {
            Some(chunk) => Some(Ok(chunk)),
            None => {
                self.0 = &[];
                Some(Err(Error::corrupt("truncated chunk")))
            }
        }
    }
}

/// The fields of an `IHDR` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
    compression: u8,
    filter_method: u8,
    interlace: u8,
}

impl TryFrom<&[u8]> for Header {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        let [w0, w1, w2, w3, h0, h1, h2, h3, depth, color, compression, filter, interlace, ..] =
            *data
        else {
            return Err(Error::corrupt(format!(
                "IHDR is {} bytes, need 13",
                data.len()
            )));
        };
        Ok(Self {
            width: u32::from_be_bytes([w0, w1, w2, w3]),
            height: u32::from_be_bytes([h0, h1, h2, h3]),
            bit_depth: depth,
            color_type: color,
            compression,
            filter_method: filter,
            interlace,
        })
    }
}

impl Header {
    fn check_supported(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::corrupt(format!(
                "zero image dimension {}x{}",
                self.width, self.height
            )));
        }
        if self.bit_depth != 8 {
            return Err(Error::unsupported(format!("bit depth {}", self.bit_depth)));
        }
        if self.color_type != COLOR_TYPE_RGB {
            return Err(Error::unsupported(format!("color type {}", self.color_type)));
        }
        if self.compression != 0 {
            return Err(Error::unsupported(format!(
                "compression method {}",
                self.compression
            )));
        }
        if self.filter_method != 0 {
            return Err(Error::unsupported(format!(
                "filter method {}",
                self.filter_method
            )));
        }
        if self.interlace != 0 {
            return Err(Error::unsupported(format!("interlace method {}", self.interlace)));
        }
        Ok(())
    }
}

/// Read a PNG file from disk and decode it.
pub fn decode_file(path: impl AsRef<Path>) -> Result<Image> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Decode PNG bytes into an [`Image`].
///
/// Fails with [`Error::Format`] if the signature is wrong,
/// [`Error::UnsupportedFormat`] for any profile other than 8-bit RGB, and
/// [`Error::CorruptImage`] if the file is structurally broken.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode(bytes: &[u8]) -> Result<Image> {
    let Some(rest) = bytes.strip_prefix(&SIGNATURE) else {
        return Err(Error::Format);
    };

    let mut header = None;
    let mut compressed = Vec::new();
    let mut chunk_count = 0usize;

    for chunk in ChunkIter(rest) {
        let chunk = chunk?;
        chunk_count += 1;
        tracing::trace!(tag = ?chunk.tag, len = chunk.data.len(), crc = chunk.crc, "chunk");
        match chunk.tag {
            ChunkTag::IHDR => {
                let parsed = Header::try_from(chunk.data)?;
                parsed.check_supported()?;
                header = Some(parsed);
            }
            ChunkTag::IDAT => compressed.extend_from_slice(chunk.data),
            ChunkTag::IEND => break,
            _ => {}
        }
    }

    let header = header.ok_or_else(|| Error::corrupt("missing IHDR chunk"))?;
    if compressed.is_empty() {
        return Err(Error::corrupt("missing IDAT chunk"));
    }
    tracing::debug!(
        width = header.width,
        height = header.height,
        chunk_count,
        compressed_len = compressed.len(),
        "parsed PNG header"
    );

    let raw = miniz_oxide::inflate::decompress_to_vec_zlib(&compressed)
        .map_err(|e| Error::corrupt(format!("inflate failed: {:?}", e.status)))?;

    let width = header.width as usize;
    let height = header.height as usize;
    let bytes = unfilter(&raw, width, height)?;

    let pixels = bytes
        .chunks_exact(BPP)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    Ok(Image {
        width,
        height,
        pixels,
    })
}

/// The Paeth predictor: whichever of left `a`, above `b`, upper-left `c` is
/// closest to `a + b - c`, ties going to `a`, then `b`.
pub(crate) const fn paeth_predict(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reverse the scanline filters of a non-interlaced 8-bit RGB image.
///
/// Each of the `height` lines in `raw` is one filter-type byte followed by
/// `width * 3` filtered bytes. Neighbors outside the image read as zero.
fn unfilter(raw: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let Some((stride, needed)) = width
        .checked_mul(BPP)
        .and_then(|stride| Some((stride, stride.checked_add(1)?.checked_mul(height)?)))
    else {
        return Err(Error::corrupt(format!(
            "image dimensions {width}x{height} overflow"
        )));
    };
    if raw.len() < needed {
        return Err(Error::corrupt(format!(
            "scanline data is {} bytes, need {needed}",
            raw.len()
        )));
    }

    let zero_row = vec![0u8; stride];
    let mut out = vec![0u8; stride * height];

    for (y, line) in raw.chunks_exact(stride + 1).take(height).enumerate() {
        let (filter, line) = (line[0], &line[1..]);
        let (done, rest) = out.split_at_mut(y * stride);
        let prev = if y == 0 {
            &zero_row[..]
        } else {
            &done[(y - 1) * stride..]
        };
        let cur = &mut rest[..stride];

        match filter {
            0 => cur.copy_from_slice(line),
            1 => {
                for i in 0..stride {
                    let a = if i >= BPP { cur[i - BPP] } else { 0 };
                    cur[i] = line[i].wrapping_add(a);
                }
            }
            2 => {
                for i in 0..stride {
                    cur[i] = line[i].wrapping_add(prev[i]);
                }
            }
            3 => {
                for i in 0..stride {
                    let a = if i >= BPP { cur[i - BPP] } else { 0 };
                    let avg = ((a as u16 + prev[i] as u16) / 2) as u8;
                    cur[i] = line[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 0..stride {
                    let (a, c) = if i >= BPP {
                        (cur[i - BPP], prev[i - BPP])
                    } else {
                        (0, 0)
                    };
                    cur[i] = line[i].wrapping_add(paeth_predict(a, prev[i], c));
                }
            }
            other => {
                return Err(Error::unsupported(format!(
                    "filter type {other} on scanline {y}"
                )));
            }
        }
    }

    Ok(out)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn image_strategy() -> impl Strategy<Value = Image> {
        (1usize..12, 1usize..12).prop_flat_map(|(w, h)| {
            prop::collection::vec(any::<[u8; 3]>(), w * h).prop_map(move |pixels| Image {
                width: w,
                height: h,
                pixels,
            })
        })
    }

    proptest! {
        #[test]
        fn encoded_images_decode_unchanged(
            image in image_strategy(),
            filter in prop::sample::select(Filter::ALL.to_vec()),
        ) {
            prop_assert_eq!(decode(&encode(&image, filter)).unwrap(), image);
        }

        #[test]
        fn arbitrary_bytes_never_panic(tail in prop::collection::vec(any::<u8>(), 0..128)) {
            let mut bytes = SIGNATURE.to_vec();
            bytes.extend(tail);
            let _ = decode(&bytes);
        }
    }
}
