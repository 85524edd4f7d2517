use super::{BPP, COLOR_TYPE_RGB, Image, SIGNATURE, paeth_predict};

/// Per-scanline filter applied before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl Filter {
    pub const ALL: [Filter; 5] = [
        Filter::None,
        Filter::Sub,
        Filter::Up,
        Filter::Average,
        Filter::Paeth,
    ];

    /// The value this filter subtracts, given left `a`, above `b` and
    /// upper-left `c`.
    fn predict(self, a: u8, b: u8, c: u8) -> u8 {
        match self {
            Filter::None => 0,
            Filter::Sub => a,
            Filter::Up => b,
            Filter::Average => ((a as u16 + b as u16) / 2) as u8,
            Filter::Paeth => paeth_predict(a, b, c),
        }
    }
}

/// Encode `image` as an 8-bit RGB PNG, filtering every scanline with
/// `filter`. Chunk CRCs are filled in.
pub fn encode(image: &Image, filter: Filter) -> Vec<u8> {
    let stride = image.width() * BPP;
    let mut scanlines = Vec::with_capacity((stride + 1) * image.height());
    let mut prev = vec![0u8; stride];

    for row in image.rows() {
        let cur: Vec<u8> = row.iter().flatten().copied().collect();
        scanlines.push(filter as u8);
        for i in 0..stride {
            let (a, c) = if i >= BPP {
                (cur[i - BPP], prev[i - BPP])
            } else {
                (0, 0)
            };
            scanlines.push(cur[i].wrapping_sub(filter.predict(a, prev[i], c)));
        }
        prev = cur;
    }

    let mut header = Vec::with_capacity(13);
    header.extend_from_slice(&(image.width() as u32).to_be_bytes());
    header.extend_from_slice(&(image.height() as u32).to_be_bytes());
    header.extend_from_slice(&[8, COLOR_TYPE_RGB, 0, 0, 0]);

    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&scanlines, 6);

    let mut out = SIGNATURE.to_vec();
    write_chunk(&mut out, b"IHDR", &header);
    write_chunk(&mut out, b"IDAT", &compressed);
    write_chunk(&mut out, b"IEND", &[]);
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        ?filter,
        len = out.len(),
        "encoded PNG"
    );
    out
}

/// Append one length-prefixed, CRC-suffixed chunk to `out`.
pub(crate) fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    let crc = crc32(tag.iter().chain(data));
    out.extend_from_slice(&crc.to_be_bytes());
}

const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
};

/// CRC-32 as used by PNG (reflected, polynomial 0xEDB88320).
fn crc32<'a>(bytes: impl IntoIterator<Item = &'a u8>) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for &b in bytes {
        c = CRC_TABLE[((c ^ b as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}
