//! WAV encoding and decoding for PCM audio.

use std::io::{self, Write};

use hb_ir::Sample;

use crate::FormatError;

// --- Writing ---

const BITS_PER_SAMPLE: u16 = 16;

/// Header fields of a 16-bit PCM file, checked to fit their on-disk widths.
struct PcmLayout {
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    frames: usize,
    data_size: u32,
}

impl PcmLayout {
    fn new(sample_count: usize, channels: u16, sample_rate: u32) -> io::Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(invalid("channel count and sample rate must be non-zero"));
        }
        let block_align = channels
            .checked_mul(BITS_PER_SAMPLE / 8)
            .ok_or_else(|| invalid("too many channels for a WAV header"))?;
        let byte_rate = u32::try_from(u64::from(sample_rate) * u64::from(block_align))
            .map_err(|_| invalid("sample rate too high for a WAV header"))?;
        let frames = sample_count / channels as usize;
        // RIFF size is data + 36 and must fit in 32 bits too
        let data_size = (frames as u64)
            .checked_mul(u64::from(block_align))
            .filter(|&n| n <= u64::from(u32::MAX - 36))
            .ok_or_else(|| invalid("audio too long for a WAV file"))? as u32;
        Ok(Self {
            channels,
            sample_rate,
            byte_rate,
            block_align,
            frames,
            data_size,
        })
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// Write interleaved float samples as 16-bit PCM.
///
/// A trailing partial frame is dropped. Fails with `InvalidInput` when the
/// header fields would not fit a WAV file.
pub fn write_wav(
    w: &mut impl Write,
    samples: &[f32],
    num_channels: u16,
    sample_rate: u32,
) -> io::Result<()> {
    let layout = PcmLayout::new(samples.len(), num_channels, sample_rate)?;

    w.write_all(b"RIFF")?;
    w.write_all(&(36 + layout.data_size).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&layout.channels.to_le_bytes())?;
    w.write_all(&layout.sample_rate.to_le_bytes())?;
    w.write_all(&layout.byte_rate.to_le_bytes())?;
    w.write_all(&layout.block_align.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&layout.data_size.to_le_bytes())?;
    for &s in &samples[..layout.frames * layout.channels as usize] {
        w.write_all(&to_i16(s).to_le_bytes())?;
    }
    Ok(())
}

/// Encode interleaved float samples into an in-memory WAV file.
pub fn samples_to_wav(samples: &[f32], num_channels: u16, sample_rate: u32) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(44 + samples.len() * 2);
    write_wav(&mut buf, samples, num_channels, sample_rate)?;
    Ok(buf)
}

fn to_i16(s: f32) -> i16 {
    if s.is_nan() {
        return 0;
    }
    (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

// --- Reading ---

/// Load a WAV file from raw bytes into a mono Sample.
///
/// Stereo files are averaged down to one channel. The file's frame rate
/// becomes the sample's source rate.
pub fn load_wav(data: &[u8], name: &str) -> Result<Sample, FormatError> {
    let header = parse_header(data)?;
    let frames = read_pcm_data(data, &header)?;
    Ok(Sample::from_frames(name, frames, header.sample_rate))
}

struct WavHeader {
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: usize,
    data_size: usize,
}

fn parse_header(data: &[u8]) -> Result<WavHeader, FormatError> {
    if data.len() < 44 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut data_chunk: Option<(usize, usize)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;

        if chunk_id == b"fmt " && chunk_size >= 16 {
            if pos + 24 > data.len() {
                return Err(FormatError::UnexpectedEof);
            }
            let format = read_u16_le(data, pos + 8);
            if format != 1 {
                return Err(FormatError::Unsupported(format!("encoding tag {format}")));
            }
            let channels = read_u16_le(data, pos + 10);
            let rate = read_u32_le(data, pos + 12);
            let bits = read_u16_le(data, pos + 22);
            fmt = Some((channels, rate, bits));
        } else if chunk_id == b"data" {
            data_chunk = Some((pos + 8, chunk_size));
        }

        pos = pos.saturating_add(8).saturating_add(chunk_size);
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (num_channels, sample_rate, bits_per_sample) = fmt.ok_or(FormatError::InvalidHeader)?;
    let (data_offset, data_size) = data_chunk.ok_or(FormatError::InvalidHeader)?;

    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(FormatError::Unsupported(format!("{bits_per_sample}-bit samples")));
    }
    if !(1..=2).contains(&num_channels) {
        return Err(FormatError::Unsupported(format!("{num_channels} channels")));
    }
    if sample_rate == 0 {
        return Err(FormatError::InvalidHeader);
    }

    Ok(WavHeader {
        num_channels,
        sample_rate,
        bits_per_sample,
        data_offset,
        data_size,
    })
}

fn read_pcm_data(data: &[u8], header: &WavHeader) -> Result<Vec<f32>, FormatError> {
    let end = header.data_offset.saturating_add(header.data_size).min(data.len());
    let raw = &data[header.data_offset..end];

    match (header.bits_per_sample, header.num_channels) {
        (8, 1) => Ok(raw.iter().map(|&b| from_u8(b)).collect()),
        (8, 2) => Ok(raw
            .chunks_exact(2)
            .map(|c| (from_u8(c[0]) + from_u8(c[1])) * 0.5)
            .collect()),
        (16, 1) => Ok(raw
            .chunks_exact(2)
            .map(|c| from_i16([c[0], c[1]]))
            .collect()),
        (16, 2) => Ok(raw
            .chunks_exact(4)
            .map(|c| (from_i16([c[0], c[1]]) + from_i16([c[2], c[3]])) * 0.5)
            .collect()),
        _ => Err(FormatError::Unsupported("sample layout".into())),
    }
}

/// 8-bit WAV is unsigned, centered at 128.
fn from_u8(b: u8) -> f32 {
    (b as i16 - 128) as f32 / 128.0
}

fn from_i16(bytes: [u8; 2]) -> f32 {
    i16::from_le_bytes(bytes) as f32 / 32768.0
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
