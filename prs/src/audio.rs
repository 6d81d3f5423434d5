//! Audio decoding: unsigned 8-bit PCM and Microsoft ADPCM, both to 16-bit PCM.

use tracing::debug;

use crate::error::{Error, Result};
use crate::nibbles::Nibbles;
use crate::reader::{PrsReader, ReaderError};

/// Sample rate of `SND` records, which carry no header of their own.
pub const SND_SAMPLE_RATE: u32 = 22_050;

/// Marker word at the start of every `SND` record.
pub const SND_MARKER: u16 = 4;

const WAVE_FORMAT_ADPCM: u16 = 2;

const ADAPTATION_TABLE: [i32; 16] = [
    230, 230, 230, 230, 307, 409, 512, 614, 768, 614, 512, 409, 307, 230, 230, 230,
];

const ADAPTATION_COEFF1: [i32; 7] = [256, 512, 0, 192, 240, 460, 392];
const ADAPTATION_COEFF2: [i32; 7] = [0, -256, 0, 64, 0, -208, -232];

/// Keeps `table * delta` inside `i32` on long runs of large nibbles.
const MAX_DELTA: i32 = i32::MAX / 768;

/// Bytes of block header per channel: predictor, delta, sample1, sample2.
const BLOCK_HEADER_LEN: usize = 7;

/// Decoded 16-bit PCM, interleaved when stereo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl PcmBuffer {
    pub fn new(channel_count: u16, sample_rate: u32, samples: Vec<i16>) -> Result<Self> {
        if !(1..=2).contains(&channel_count) {
            return Err(Error::invalid_parameters(format!(
                "unsupported channel count {channel_count}"
            )));
        }
        if samples.len() % usize::from(channel_count) != 0 {
            return Err(Error::invalid_parameters(format!(
                "{} samples do not divide into {channel_count} channels",
                samples.len()
            )));
        }
        Ok(Self {
            channel_count,
            sample_rate,
            samples,
        })
    }

    /// Sample frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channel_count)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Widen unsigned 8-bit PCM to signed 16-bit.
pub fn pcm8_to_pcm16(data: &[u8]) -> Vec<i16> {
    data.iter().map(|&b| (i16::from(b) - 128) << 8).collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct AdpcmChannel {
    delta: i32,
    sample1: i32,
    sample2: i32,
    coeff1: i32,
    coeff2: i32,
}

impl AdpcmChannel {
    fn set_predictor(&mut self, predictor: u8) {
        let idx = usize::from(predictor.min(6));
        self.coeff1 = ADAPTATION_COEFF1[idx];
        self.coeff2 = ADAPTATION_COEFF2[idx];
    }

    fn expand_nibble(&mut self, nibble: u8) -> i16 {
        let signed = i32::from(nibble) - if nibble & 0x08 != 0 { 0x10 } else { 0 };
        let predictor = (self.sample1 * self.coeff1 + self.sample2 * self.coeff2) / 256
            + signed * self.delta;
        let predictor = predictor.clamp(i32::from(i16::MIN), i32::from(i16::MAX));

        self.sample2 = self.sample1;
        self.sample1 = predictor;

        self.delta = (ADAPTATION_TABLE[usize::from(nibble)] * self.delta / 256).clamp(16, MAX_DELTA);

        predictor as i16
    }
}

/// Sample frames produced by an ADPCM block of `block_len` bytes, or 0 when
/// the block cannot even hold its header.
pub fn samples_per_block(block_len: usize, channel_count: usize) -> usize {
    let per_channel = block_len / channel_count;
    if per_channel < BLOCK_HEADER_LEN {
        return 0;
    }
    (per_channel - BLOCK_HEADER_LEN) * 2 + 2
}

/// Total interleaved sample count `decode_ms_adpcm` will produce.
pub fn ms_adpcm_output_len(
    byte_count: usize,
    channel_count: usize,
    block_alignment: usize,
) -> Result<usize> {
    validate_adpcm_params(channel_count, block_alignment)?;
    let overflow = || Error::invalid_parameters("ADPCM output size overflows");

    let full_blocks = byte_count / block_alignment;
    let partial = byte_count % block_alignment;
    let frames = full_blocks
        .checked_mul(samples_per_block(block_alignment, channel_count))
        .and_then(|n| n.checked_add(samples_per_block(partial, channel_count)))
        .ok_or_else(overflow)?;
    let samples = frames.checked_mul(channel_count).ok_or_else(overflow)?;
    // Every sample is serialised as two bytes downstream.
    samples.checked_mul(2).ok_or_else(overflow)?;
    Ok(samples)
}

fn validate_adpcm_params(channel_count: usize, block_alignment: usize) -> Result<()> {
    if !(1..=2).contains(&channel_count) {
        return Err(Error::invalid_parameters(format!(
            "MS-ADPCM supports 1 or 2 channels, got {channel_count}"
        )));
    }
    if samples_per_block(block_alignment, channel_count) == 0 {
        return Err(Error::invalid_parameters(format!(
            "block alignment {block_alignment} is smaller than a {channel_count}-channel block header"
        )));
    }
    Ok(())
}

/// Decode MS-ADPCM data to interleaved 16-bit samples.
pub fn decode_ms_adpcm(
    buffer: &[u8],
    byte_offset: usize,
    byte_count: usize,
    channel_count: usize,
    block_alignment: usize,
) -> Result<Vec<i16>> {
    let total = ms_adpcm_output_len(byte_count, channel_count, block_alignment)?;
    let end = byte_offset
        .checked_add(byte_count)
        .filter(|&end| end <= buffer.len())
        .ok_or(ReaderError::UnexpectedEof {
            position: byte_offset as u64,
            needed: byte_count,
            available: buffer.len().saturating_sub(byte_offset),
        })?;

    debug!(
        "decoding MS-ADPCM: offset={byte_offset}, count={byte_count}, \
         channels={channel_count}, block_align={block_alignment}, samples={total}"
    );

    let stereo = channel_count == 2;
    let mut samples = Vec::with_capacity(total);

    for block in buffer[byte_offset..end].chunks(block_alignment) {
        let frames = samples_per_block(block.len(), channel_count);
        if frames == 0 {
            break;
        }

        let mut channels = [AdpcmChannel::default(); 2];
        let mut reader = PrsReader::new(block);
        for ch in &mut channels[..channel_count] {
            ch.set_predictor(reader.read_u8()?);
        }
        for ch in &mut channels[..channel_count] {
            ch.delta = i32::from(reader.read_i16()?);
        }
        for ch in &mut channels[..channel_count] {
            ch.sample1 = i32::from(reader.read_i16()?);
        }
        for ch in &mut channels[..channel_count] {
            ch.sample2 = i32::from(reader.read_i16()?);
        }

        // Header history goes out oldest first.
        for ch in &channels[..channel_count] {
            samples.push(ch.sample2 as i16);
        }
        for ch in &channels[..channel_count] {
            samples.push(ch.sample1 as i16);
        }

        let nibble_count = (frames - 2) * channel_count;
        let nibbles = Nibbles::new(reader.remaining_slice());
        debug_assert!(nibbles.remaining() >= nibble_count);
        for (i, nibble) in nibbles.take(nibble_count).enumerate() {
            let ch = if stereo { i % 2 } else { 0 };
            samples.push(channels[ch].expand_nibble(nibble));
        }
    }

    debug_assert_eq!(samples.len(), total);
    Ok(samples)
}

/// Decode an `SND` record: marker, length, then unsigned 8-bit mono samples.
pub fn decode_snd(data: &[u8]) -> Result<PcmBuffer> {
    let mut reader = PrsReader::new(data);
    let marker = reader.read_u16()?;
    if marker != SND_MARKER {
        return Err(Error::invalid_format(format!(
            "SND marker is {marker}, expected {SND_MARKER}"
        )));
    }
    let declared = reader.read_u32()? as usize;
    let sample_bytes = reader.read_up_to(declared.saturating_add(1));
    debug!(
        "SND: {} of {} declared sample bytes",
        sample_bytes.len(),
        declared.saturating_add(1)
    );
    PcmBuffer::new(1, SND_SAMPLE_RATE, pcm8_to_pcm16(sample_bytes))
}

/// The `fmt ` chunk fields that matter for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    fn parse(chunk: &[u8]) -> Result<Self> {
        let mut reader = PrsReader::new(chunk);
        Ok(Self {
            format_tag: reader.read_u16()?,
            channels: reader.read_u16()?,
            sample_rate: reader.read_u32()?,
            byte_rate: reader.read_u32()?,
            block_align: reader.read_u16()?,
            bits_per_sample: reader.read_u16()?,
        })
    }
}

/// Decode a `PCM` record: a RIFF/WAVE file holding MS-ADPCM data.
pub fn decode_riff_adpcm(data: &[u8]) -> Result<PcmBuffer> {
    let mut reader = PrsReader::new(data);
    if reader.read_slice(4)? != b"RIFF" {
        return Err(Error::invalid_format("missing RIFF signature"));
    }
    let _riff_size = reader.read_u32()?;
    if reader.read_slice(4)? != b"WAVE" {
        return Err(Error::invalid_format("missing WAVE form type"));
    }

    let mut format = None;
    while reader.remaining() > 0 {
        let id = reader.read_slice(4)?;
        let size = reader.read_u32()? as usize;

        match id {
            b"fmt " => {
                let fmt = WaveFormat::parse(reader.read_slice(size)?)?;
                debug!("wave format: {fmt:?}");
                if fmt.format_tag != WAVE_FORMAT_ADPCM || fmt.bits_per_sample != 4 {
                    return Err(Error::invalid_format(format!(
                        "not MS-ADPCM (format {}, {} bits)",
                        fmt.format_tag, fmt.bits_per_sample
                    )));
                }
                format = Some(fmt);
            }
            b"data" => {
                let fmt = format
                    .ok_or_else(|| Error::invalid_format("data chunk precedes fmt chunk"))?;
                let payload = reader.read_up_to(size);
                let samples = decode_ms_adpcm(
                    payload,
                    0,
                    payload.len(),
                    usize::from(fmt.channels),
                    usize::from(fmt.block_align),
                )?;
                return PcmBuffer::new(fmt.channels, fmt.sample_rate, samples);
            }
            other => {
                debug!("skipping chunk {:?} ({size} bytes)", String::from_utf8_lossy(other));
                reader.skip(size)?;
            }
        }

        if size % 2 == 1 && reader.remaining() > 0 {
            reader.skip(1)?;
        }
    }

    Err(Error::invalid_format("RIFF file has no data chunk"))
}
