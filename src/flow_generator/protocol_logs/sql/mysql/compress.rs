/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::io::Read;

use flate2::read::ZlibDecoder;
use public::bytes::read_u24_le;

use super::consts::*;
use super::state::CompressionAlgorithm;
use crate::flow_generator::error::{Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    pub compressed_length: u32,
    pub sequence: u8,
    // 0 means the payload was sent as is
    pub uncompressed_length: u32,
}

impl CompressedHeader {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < COMPRESS_HEADER_LEN {
            return Err(Error::PacketTooShort {
                needed: COMPRESS_HEADER_LEN,
                remaining: payload.len(),
            });
        }
        Ok(Self {
            compressed_length: read_u24_le(payload),
            sequence: payload[COMPRESS_HEADER_SEQ_OFFSET],
            uncompressed_length: read_u24_le(&payload[COMPRESS_HEADER_UNCOMPRESS_OFFSET..]),
        })
    }
}

/// Inflates the body of one compressed frame.
pub trait Decompressor {
    fn decompress(
        &self,
        algorithm: CompressionAlgorithm,
        input: &[u8],
        uncompressed_length: usize,
    ) -> Result<Vec<u8>>;
}

/// zlib through `flate2`, zstd through `zstd`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDecompressor;

impl Decompressor for DefaultDecompressor {
    fn decompress(
        &self,
        algorithm: CompressionAlgorithm,
        input: &[u8],
        uncompressed_length: usize,
    ) -> Result<Vec<u8>> {
        let output = match algorithm {
            CompressionAlgorithm::Zlib => {
                // one byte past the declared length is enough to reject the frame
                let mut output = Vec::with_capacity(uncompressed_length);
                ZlibDecoder::new(input)
                    .take(uncompressed_length as u64 + 1)
                    .read_to_end(&mut output)
                    .map_err(|e| Error::Decompress(e.to_string()))?;
                output
            }
            CompressionAlgorithm::Zstd => zstd::bulk::decompress(input, uncompressed_length)
                .map_err(|e| Error::Decompress(e.to_string()))?,
        };
        if output.len() != uncompressed_length {
            return Err(Error::Decompress(format!(
                "expected {} bytes, got {}",
                uncompressed_length,
                output.len()
            )));
        }
        Ok(output)
    }
}
