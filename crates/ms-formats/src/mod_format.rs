//! ProTracker MOD format parser.

use binrw::io::Cursor;
use binrw::BinRead;

use crate::FormatError;

/// Rows in every MOD pattern.
pub const ROWS_PER_PATTERN: usize = 64;

/// Size of the fixed header, signature included.
pub const HEADER_SIZE: usize = 1084;

const NUM_SAMPLES: usize = 31;

#[derive(BinRead, Debug)]
#[br(big)]
struct RawSampleHeader {
    name: [u8; 22],
    length_words: u16,
    finetune: u8,
    volume: u8,
    loop_start_words: u16,
    loop_length_words: u16,
}

#[derive(BinRead, Debug)]
#[br(big)]
struct RawHeader {
    title: [u8; 20],
    samples: [RawSampleHeader; NUM_SAMPLES],
    song_length: u8,
    restart: u8,
    order: [u8; 128],
    signature: [u8; 4],
}

/// A parsed MOD module.
#[derive(Clone, Debug)]
pub struct Module {
    pub title: String,
    /// Tracker guessed from the signature
    pub tracker: &'static str,
    pub channels: usize,
    pub samples: Vec<Sample>,
    /// Pattern indices in play order
    pub order: Vec<u8>,
    /// Order to continue from after the last one
    pub restart: usize,
    pub patterns: Vec<Pattern>,
}

impl Module {
    /// Pattern played at `order`, if both exist.
    pub fn pattern_at(&self, order: usize) -> Option<&Pattern> {
        let index = *self.order.get(order)? as usize;
        self.patterns.get(index)
    }
}

/// An 8-bit signed sample.
#[derive(Clone, Debug, Default)]
pub struct Sample {
    pub name: String,
    pub data: Vec<i8>,
    /// Default volume (0-64)
    pub volume: u8,
    /// Finetune in 1/8 semitones (-8..=7)
    pub finetune: i8,
    pub loop_start: usize,
    /// Loop end (exclusive); 0 means no loop
    pub loop_end: usize,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn has_loop(&self) -> bool {
        self.loop_end > self.loop_start + 2
    }
}

/// One pattern cell in raw MOD terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Amiga period (0 = no note)
    pub period: u16,
    /// Sample number (0 = none, 1-31)
    pub sample: u8,
    pub effect: u8,
    pub param: u8,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        *self == Cell::default()
    }
}

/// 64 rows of cells across all channels.
#[derive(Clone, Debug)]
pub struct Pattern {
    channels: usize,
    cells: Vec<Cell>,
}

impl Pattern {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            cells: vec![Cell::default(); ROWS_PER_PATTERN * channels],
        }
    }

    pub fn cell(&self, row: usize, channel: usize) -> Option<&Cell> {
        if channel >= self.channels {
            return None;
        }
        self.cells.get(row * self.channels + channel)
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        let start = row * self.channels;
        self.cells.get(start..start + self.channels).unwrap_or(&[])
    }
}

/// Load a MOD file from bytes.
pub fn load_mod(data: &[u8]) -> Result<Module, FormatError> {
    if data.len() < HEADER_SIZE {
        return Err(FormatError::UnexpectedEof);
    }

    let header = RawHeader::read(&mut Cursor::new(data))
        .map_err(|e| FormatError::InvalidHeader(e.to_string()))?;

    let (channels, tracker) = detect_signature(&header.signature);

    let song_length = header.song_length as usize;
    if song_length == 0 || song_length > 128 {
        return Err(FormatError::NoOrders);
    }
    let order = header.order[..song_length].to_vec();
    let restart = if (header.restart as usize) < song_length {
        header.restart as usize
    } else {
        0
    };

    // Every entry of the 128-byte table counts, not just the played ones.
    let max_pattern = header.order.iter().max().copied().unwrap_or(0) as usize;

    let pattern_size = ROWS_PER_PATTERN * channels * 4;
    let mut offset = HEADER_SIZE;
    let mut patterns = Vec::with_capacity(max_pattern + 1);
    for _ in 0..=max_pattern {
        let bytes = data
            .get(offset..offset + pattern_size)
            .ok_or(FormatError::UnexpectedEof)?;
        patterns.push(parse_pattern(bytes, channels));
        offset += pattern_size;
    }

    let mut samples = Vec::with_capacity(NUM_SAMPLES);
    for raw in &header.samples {
        let mut sample = parse_sample_header(raw);
        let length = raw.length_words as usize * 2;
        // Truncated files keep whatever sample data is present.
        let end = (offset + length).min(data.len());
        if offset < end {
            sample.data = data[offset..end].iter().map(|&b| b as i8).collect();
        }
        offset += length;

        // Clamp loop bounds to actual sample length (common in real MOD files)
        sample.loop_end = sample.loop_end.min(sample.len());
        if !sample.has_loop() {
            sample.loop_start = 0;
            sample.loop_end = 0;
        }
        samples.push(sample);
    }

    tracing::debug!(
        title = %parse_string(&header.title),
        channels,
        orders = order.len(),
        patterns = patterns.len(),
        "parsed MOD"
    );

    Ok(Module {
        title: parse_string(&header.title),
        tracker,
        channels,
        samples,
        order,
        restart,
        patterns,
    })
}

/// Channel count and tracker name from the signature at offset 1080.
fn detect_signature(sig: &[u8; 4]) -> (usize, &'static str) {
    match sig {
        b"M.K." | b"M!K!" => (4, "ProTracker"),
        b"FLT4" => (4, "Startrekker"),
        b"FLT8" => (8, "Startrekker"),
        b"4CHN" => (4, "FastTracker"),
        b"6CHN" => (6, "FastTracker"),
        b"8CHN" => (8, "FastTracker"),
        b"OCTA" | b"CD81" => (8, "Octalyser"),
        // Unknown signature: assume a 4-channel module
        _ => (4, "Unknown"),
    }
}

/// Parse a null-terminated string from bytes.
fn parse_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

fn parse_sample_header(raw: &RawSampleHeader) -> Sample {
    let finetune = (raw.finetune & 0x0F) as i8;
    let finetune = if finetune > 7 { finetune - 16 } else { finetune };
    let loop_start = raw.loop_start_words as usize * 2;
    let loop_length = raw.loop_length_words as usize * 2;

    Sample {
        name: parse_string(&raw.name),
        data: Vec::new(),
        volume: raw.volume.min(64),
        finetune,
        loop_start,
        loop_end: if loop_length > 2 { loop_start + loop_length } else { 0 },
    }
}

fn parse_pattern(data: &[u8], channels: usize) -> Pattern {
    let mut pattern = Pattern::new(channels);
    for (cell, bytes) in pattern.cells.iter_mut().zip(data.chunks_exact(4)) {
        *cell = parse_cell(bytes);
    }
    pattern
}

/// Parse a single pattern cell (4 bytes).
fn parse_cell(data: &[u8]) -> Cell {
    // Byte 0: upper 4 bits of sample number, upper 4 bits of period
    // Byte 1: lower 8 bits of period
    // Byte 2: lower 4 bits of sample number, effect command
    // Byte 3: effect parameter
    let period = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;
    let sample = (data[0] & 0xF0) | ((data[2] & 0xF0) >> 4);

    Cell {
        period,
        sample,
        effect: data[2] & 0x0F,
        param: data[3],
    }
}
