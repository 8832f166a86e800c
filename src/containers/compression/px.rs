use std::collections::VecDeque;

use crate::error::CompressionError;

// Constants for the PX algorithm
const PX_LOOKBACK_BUFFER_SIZE: usize = 4096;
const PX_MAX_MATCH_SEQLEN: usize = 18;
pub const PX_MIN_MATCH_SEQLEN: usize = 3;
const PX_NB_POSSIBLE_SEQUENCES_LEN: usize = 7;
pub const PX_NB_CONTROL_FLAGS: usize = 9;
const PX_MAX_COMPRESSED_SIZE: usize = 65536;

/// Enum for compression operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    CopyAsIs = -1,
    CopyNybble4Times = 0,
    CopyNybble4TimesExIncrallDecrnybble0 = 1,
    CopyNybble4TimesExDecrnybble1 = 2,
    CopyNybble4TimesExDecrnybble2 = 3,
    CopyNybble4TimesExDecrnybble3 = 4,
    CopyNybble4TimesExDecrallIncrnybble0 = 5,
    CopyNybble4TimesExIncrnybble1 = 6,
    CopyNybble4TimesExIncrnybble2 = 7,
    CopyNybble4TimesExIncrnybble3 = 8,
    CopySequence = 9,
}

/// Compression levels for PX compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PxCompLevel {
    /// No compression - All command bytes are 0xFF, and values are stored uncompressed
    Level0 = 0,
    /// Low compression - Handle 4 byte patterns using only control flag 0
    Level1 = 1,
    /// Medium compression - Handle 4 byte patterns using all control flags
    Level2 = 2,
    /// Full compression - Handle everything above, plus repeating sequences
    #[default]
    Level3 = 3,
}

/// Stores an operation to insert into the output buffer
#[derive(Debug, Clone)]
struct CompOp {
    op_type: Operation,
    high_nibble: u8,
    low_nibble: u8,
    next_byte_value: u8,
}

impl CompOp {
    fn copy_as_is(byte: u8) -> Self {
        CompOp {
            op_type: Operation::CopyAsIs,
            high_nibble: (byte >> 4) & 0x0F,
            low_nibble: byte & 0x0F,
            next_byte_value: 0,
        }
    }

    fn pattern(op_type: Operation, low_nibble: u8) -> Self {
        CompOp {
            op_type,
            high_nibble: 0,
            low_nibble,
            next_byte_value: 0,
        }
    }
}

/// Represents a matching sequence for LZ77-style compression
#[derive(Debug, Clone)]
struct MatchingSeq {
    pos: usize,
    length: usize,
}

/// Output of a PX compression run: the nine control flags and the compressed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PxOutput {
    pub control_flags: [u8; PX_NB_CONTROL_FLAGS],
    pub data: Vec<u8>,
}

/// PX compressor that handles compression using the PX algorithm
pub struct PxCompressor<'a> {
    uncompressed_data: &'a [u8],
    compression_level: PxCompLevel,
    should_search_first: bool,
    control_flags: [u8; PX_NB_CONTROL_FLAGS],
    compressed_data: Vec<u8>,
    pending_operations: VecDeque<CompOp>,
    high_nibble_lengths_possible: Vec<u8>,
    cursor: usize,
}

impl<'a> PxCompressor<'a> {
    pub fn new(
        uncompressed_data: &'a [u8],
        compression_level: PxCompLevel,
        should_search_first: bool,
    ) -> Self {
        PxCompressor {
            uncompressed_data,
            compression_level,
            should_search_first,
            control_flags: [0; PX_NB_CONTROL_FLAGS],
            compressed_data: Vec::new(),
            pending_operations: VecDeque::new(),
            high_nibble_lengths_possible: Vec::new(),
            cursor: 0,
        }
    }

    fn input_size(&self) -> usize {
        self.uncompressed_data.len()
    }

    pub fn compress(mut self) -> Result<PxOutput, CompressionError> {
        let input_size = self.input_size();
        if input_size > i32::MAX as usize {
            return Err(CompressionError::InputTooLong(input_size));
        }

        // Worst case: every byte copied as is, plus one command byte per 8 operations
        self.compressed_data = Vec::with_capacity(input_size + input_size.div_ceil(8));

        // Lengths 0 and 0xF are always reserved for sequences
        self.high_nibble_lengths_possible = vec![0, 0xF];

        while self.cursor < input_size {
            let operation = self.determine_best_operation();
            self.pending_operations.push_back(operation);
        }

        self.build_ctrl_flags_list();
        self.output_all_operations();

        if self.compressed_data.len() > PX_MAX_COMPRESSED_SIZE {
            return Err(CompressionError::OutputTooLong(self.compressed_data.len()));
        }

        Ok(PxOutput {
            control_flags: self.control_flags,
            data: self.compressed_data,
        })
    }

    /// Determine the best compression operation for current position and advance past it
    fn determine_best_operation(&mut self) -> CompOp {
        let level = self.compression_level;
        let cursor = self.cursor;

        let mut chosen = None;
        if self.should_search_first && level >= PxCompLevel::Level3 {
            chosen = self.can_use_a_matching_sequence(cursor);
        }
        if chosen.is_none() && level >= PxCompLevel::Level1 {
            chosen = self.can_compress_to_2_in_1_byte(cursor);
        }
        if chosen.is_none() && level >= PxCompLevel::Level2 {
            chosen = self.can_compress_to_2_in_1_byte_with_manipulation(cursor);
        }
        if chosen.is_none() && !self.should_search_first && level >= PxCompLevel::Level3 {
            chosen = self.can_use_a_matching_sequence(cursor);
        }

        let operation =
            chosen.unwrap_or_else(|| CompOp::copy_as_is(self.uncompressed_data[cursor]));

        self.cursor += match operation.op_type {
            Operation::CopyAsIs => 1,
            Operation::CopySequence => operation.high_nibble as usize + PX_MIN_MATCH_SEQLEN,
            _ => 2,
        };

        operation
    }

    /// Check if two bytes can be compressed as a single byte with repeated nibbles
    fn can_compress_to_2_in_1_byte(&self, cursor: usize) -> Option<CompOp> {
        if cursor + 1 >= self.input_size() {
            return None;
        }

        let both_bytes = ((self.uncompressed_data[cursor] as u16) << 8)
            | (self.uncompressed_data[cursor + 1] as u16);
        let low_nibble = (both_bytes & 0x0F) as u8;

        let all_match = (0..4).all(|i| ((both_bytes >> (4 * i)) & 0x0F) as u8 == low_nibble);
        all_match.then(|| CompOp::pattern(Operation::CopyNybble4Times, low_nibble))
    }

    /// Check if two bytes can be compressed using special operations
    fn can_compress_to_2_in_1_byte_with_manipulation(&self, cursor: usize) -> Option<CompOp> {
        if cursor + 1 >= self.input_size() {
            return None;
        }

        let byte1 = self.uncompressed_data[cursor];
        let byte2 = self.uncompressed_data[cursor + 1];
        let nibbles = [
            (byte1 >> 4) & 0x0F,
            byte1 & 0x0F,
            (byte2 >> 4) & 0x0F,
            byte2 & 0x0F,
        ];

        // Count occurrences of each nibble
        let mut nibble_matches = [0u8; 4];
        for i in 0..4 {
            nibble_matches[i] = nibbles.iter().filter(|&&n| n == nibbles[i]).count() as u8;
        }

        // Three nibbles must share a value, the odd one out differs by exactly 1
        if nibble_matches.iter().filter(|&&count| count == 3).count() < 3 {
            return None;
        }

        let min_val = nibbles.iter().copied().min()?;
        let max_val = nibbles.iter().copied().max()?;
        if max_val - min_val != 1 {
            return None;
        }

        let min_idx = nibbles.iter().position(|&x| x == min_val)?;
        let max_idx = nibbles.iter().position(|&x| x == max_val)?;

        if nibble_matches[min_idx] == 1 {
            // One nibble is smaller
            let op_type = match min_idx {
                0 => Operation::CopyNybble4TimesExIncrallDecrnybble0,
                1 => Operation::CopyNybble4TimesExDecrnybble1,
                2 => Operation::CopyNybble4TimesExDecrnybble2,
                _ => Operation::CopyNybble4TimesExDecrnybble3,
            };
            let low_nibble = if min_idx == 0 { min_val } else { min_val + 1 };
            Some(CompOp::pattern(op_type, low_nibble))
        } else if nibble_matches[max_idx] == 1 {
            // One nibble is larger
            let op_type = match max_idx {
                0 => Operation::CopyNybble4TimesExDecrallIncrnybble0,
                1 => Operation::CopyNybble4TimesExIncrnybble1,
                2 => Operation::CopyNybble4TimesExIncrnybble2,
                _ => Operation::CopyNybble4TimesExIncrnybble3,
            };
            let low_nibble = if max_idx == 0 { max_val } else { max_val - 1 };
            Some(CompOp::pattern(op_type, low_nibble))
        } else {
            None
        }
    }

    /// Check if we can use a matching sequence for compression
    fn can_use_a_matching_sequence(&mut self, cursor: usize) -> Option<CompOp> {
        let look_back_begin = cursor.saturating_sub(PX_LOOKBACK_BUFFER_SIZE - 1);
        let seq_end = adv_as_much_as_possible(cursor, self.input_size(), PX_MAX_MATCH_SEQLEN);

        if seq_end - cursor < PX_MIN_MATCH_SEQLEN {
            return None;
        }

        let result = self.find_longest_matching_sequence(look_back_begin, cursor, cursor, seq_end);
        if result.length < PX_MIN_MATCH_SEQLEN {
            return None;
        }

        let valid_high_nibble = (result.length - PX_MIN_MATCH_SEQLEN) as u8;
        let high_nibble = if self.check_sequence_high_nibble_valid_or_add(valid_high_nibble) {
            valid_high_nibble
        } else {
            // Fall back to the longest registered length that still fits the match
            self.high_nibble_lengths_possible
                .iter()
                .copied()
                .filter(|&len| (len as usize + PX_MIN_MATCH_SEQLEN) <= result.length)
                .max()
                .unwrap_or(0)
        };

        let signed_offset = -((cursor - result.pos) as i32);
        Some(CompOp {
            op_type: Operation::CopySequence,
            high_nibble,
            low_nibble: ((signed_offset >> 8) & 0x0F) as u8,
            next_byte_value: (signed_offset & 0xFF) as u8,
        })
    }

    /// Find the longest matching sequence of at least PX_MIN_MATCH_SEQLEN bytes
    fn find_longest_matching_sequence(
        &self,
        search_beg: usize,
        search_end: usize,
        to_find_beg: usize,
        to_find_end: usize,
    ) -> MatchingSeq {
        let mut longest_match = MatchingSeq {
            pos: search_end,
            length: 0,
        };

        if to_find_beg + PX_MIN_MATCH_SEQLEN > to_find_end {
            return longest_match;
        }

        let min_seq = &self.uncompressed_data[to_find_beg..to_find_beg + PX_MIN_MATCH_SEQLEN];

        for pos in search_beg..search_end {
            if self.uncompressed_data[pos..].len() < PX_MIN_MATCH_SEQLEN
                || &self.uncompressed_data[pos..pos + PX_MIN_MATCH_SEQLEN] != min_seq
            {
                continue;
            }

            // The match may not read past the current cursor
            let nb_matches = count_equal_consecutive_elem(
                self.uncompressed_data,
                pos,
                adv_as_much_as_possible(pos, search_end, PX_MAX_MATCH_SEQLEN),
                to_find_beg,
                to_find_end,
            );

            if longest_match.length < nb_matches {
                longest_match = MatchingSeq {
                    pos,
                    length: nb_matches,
                };
            }

            if nb_matches == PX_MAX_MATCH_SEQLEN {
                break;
            }
        }

        longest_match
    }

    /// Check if a high nibble value is valid for sequence length encoding, registering it if
    /// there is room left
    fn check_sequence_high_nibble_valid_or_add(&mut self, hnibble_or_len: u8) -> bool {
        if self.high_nibble_lengths_possible.contains(&hnibble_or_len) {
            return true;
        }

        if self.high_nibble_lengths_possible.len() < PX_NB_POSSIBLE_SEQUENCES_LEN {
            self.high_nibble_lengths_possible.push(hnibble_or_len);
            self.high_nibble_lengths_possible.sort_unstable();
            return true;
        }

        false
    }

    /// Build the control flags list from the nibble values not used for sequence lengths
    fn build_ctrl_flags_list(&mut self) {
        for nibble_val in 0..0xF {
            if self.high_nibble_lengths_possible.len() >= PX_NB_POSSIBLE_SEQUENCES_LEN {
                break;
            }
            if !self.high_nibble_lengths_possible.contains(&nibble_val) {
                self.high_nibble_lengths_possible.push(nibble_val);
            }
        }

        let mut ctrl_flag_insert = 0;
        for flag_val in 0..0xF {
            if ctrl_flag_insert >= PX_NB_CONTROL_FLAGS {
                break;
            }
            if !self.high_nibble_lengths_possible.contains(&flag_val) {
                self.control_flags[ctrl_flag_insert] = flag_val;
                ctrl_flag_insert += 1;
            }
        }
    }

    /// Output a single operation into the compressed data
    fn output_an_operation(&mut self, operation: &CompOp) {
        match operation.op_type {
            Operation::CopyAsIs => {
                self.compressed_data
                    .push((operation.high_nibble << 4) | operation.low_nibble);
            }
            Operation::CopySequence => {
                self.compressed_data
                    .push((operation.high_nibble << 4) | operation.low_nibble);
                self.compressed_data.push(operation.next_byte_value);
            }
            pattern => {
                let flag = self.control_flags[pattern as usize];
                self.compressed_data
                    .push((flag << 4) | (operation.low_nibble & 0x0F));
            }
        }
    }

    /// Output all operations from the queue, 8 per command byte
    fn output_all_operations(&mut self) {
        while !self.pending_operations.is_empty() {
            let block_len = self.pending_operations.len().min(8);

            let mut command_byte = 0u8;
            for (i, op) in self.pending_operations.iter().take(block_len).enumerate() {
                if op.op_type == Operation::CopyAsIs {
                    command_byte |= 1 << (7 - i);
                }
            }
            self.compressed_data.push(command_byte);

            for _ in 0..block_len {
                if let Some(op) = self.pending_operations.pop_front() {
                    self.output_an_operation(&op);
                }
            }
        }
    }
}

/// Advance an index as much as possible without exceeding limit
fn adv_as_much_as_possible(iter: usize, iter_end: usize, displacement: usize) -> usize {
    (iter + displacement).min(iter_end)
}

/// Count equal consecutive elements between two ranges of the same buffer
fn count_equal_consecutive_elem(
    data: &[u8],
    first_1: usize,
    last_1: usize,
    first_2: usize,
    last_2: usize,
) -> usize {
    data[first_1..last_1]
        .iter()
        .zip(&data[first_2..last_2])
        .take_while(|(a, b)| a == b)
        .count()
}

/// PX decompressor handles decompression of PX compressed data
pub struct PxDecompressor<'a> {
    compressed_data: &'a [u8],
    flags: &'a [u8],
    cursor: usize,
    uncompressed_data: Vec<u8>,
}

impl<'a> PxDecompressor<'a> {
    pub fn new(compressed_data: &'a [u8], flags: &'a [u8]) -> Self {
        PxDecompressor {
            compressed_data,
            flags,
            cursor: 0,
            uncompressed_data: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.uncompressed_data.reserve(capacity);
        self
    }

    pub fn decompress(mut self) -> Result<Vec<u8>, CompressionError> {
        while self.cursor < self.compressed_data.len() {
            self.handle_control_byte()?;
        }
        Ok(self.uncompressed_data)
    }

    /// Handle a control byte and its associated operations
    fn handle_control_byte(&mut self) -> Result<(), CompressionError> {
        let ctrl_byte = self.read_next_byte()?;

        for bit_pos in 0..8 {
            if self.cursor >= self.compressed_data.len() {
                break;
            }

            if ctrl_byte & (1 << (7 - bit_pos)) != 0 {
                let next_byte = self.read_next_byte()?;
                self.uncompressed_data.push(next_byte);
            } else {
                self.handle_special_case()?;
            }
        }

        Ok(())
    }

    fn handle_special_case(&mut self) -> Result<(), CompressionError> {
        let next_byte = self.read_next_byte()?;
        let high_nibble = (next_byte >> 4) & 0x0F;
        let low_nibble = next_byte & 0x0F;

        match self.flags.iter().position(|&flag| flag == high_nibble) {
            Some(idx) => {
                let pattern = compute_four_nibbles_pattern(idx, low_nibble);
                self.uncompressed_data.extend_from_slice(&pattern);
                Ok(())
            }
            None => self.copy_sequence(low_nibble, high_nibble),
        }
    }

    fn read_next_byte(&mut self) -> Result<u8, CompressionError> {
        let b = *self
            .compressed_data
            .get(self.cursor)
            .ok_or(CompressionError::UnexpectedEnd(self.cursor))?;
        self.cursor += 1;
        Ok(b)
    }

    /// Copy a sequence from previously decompressed data
    fn copy_sequence(&mut self, low_nibble: u8, high_nibble: u8) -> Result<(), CompressionError> {
        let offset_byte = self.read_next_byte()?;
        let offset = (-0x1000 + (((low_nibble as i32) << 8) | offset_byte as i32)) as isize;

        let out_cur_byte = self.uncompressed_data.len();
        if offset.unsigned_abs() > out_cur_byte {
            return Err(CompressionError::BackReferenceOutOfBounds {
                offset,
                available: out_cur_byte,
            });
        }

        let bytes_to_copy = high_nibble as usize + PX_MIN_MATCH_SEQLEN;
        let copy_pos = out_cur_byte - offset.unsigned_abs();

        // Overlapping copies read bytes pushed earlier in this same loop
        for i in 0..bytes_to_copy {
            let byte = self.uncompressed_data[copy_pos + i];
            self.uncompressed_data.push(byte);
        }

        Ok(())
    }
}

/// Compute a pattern of 4 nibbles based on control flag and low nibble
fn compute_four_nibbles_pattern(idx_ctrl_flags: usize, low_nibble: u8) -> [u8; 2] {
    if idx_ctrl_flags == 0 {
        let byte_val = (low_nibble << 4) | low_nibble;
        return [byte_val, byte_val];
    }

    // Indices 1 and 5 shift the base value of every nibble
    let nibble_base = match idx_ctrl_flags {
        1 => low_nibble.wrapping_add(1),
        5 => low_nibble.wrapping_sub(1),
        _ => low_nibble,
    };

    let mut ns = [nibble_base; 4];
    match idx_ctrl_flags {
        1..=4 => ns[idx_ctrl_flags - 1] = ns[idx_ctrl_flags - 1].wrapping_sub(1),
        5..=8 => ns[idx_ctrl_flags - 5] = ns[idx_ctrl_flags - 5].wrapping_add(1),
        _ => (),
    }

    [
        ((ns[0] & 0x0F) << 4) | (ns[1] & 0x0F),
        ((ns[2] & 0x0F) << 4) | (ns[3] & 0x0F),
    ]
}

/// Compress `data` with the PX algorithm.
pub fn compress(
    data: &[u8],
    level: PxCompLevel,
    aggressive_search: bool,
) -> Result<PxOutput, CompressionError> {
    PxCompressor::new(data, level, aggressive_search).compress()
}

/// Decompress a PX stream using the given control flags.
pub fn decompress(data: &[u8], flags: &[u8]) -> Result<Vec<u8>, CompressionError> {
    PxDecompressor::new(data, flags).decompress()
}
