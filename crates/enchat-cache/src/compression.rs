//! Body codecs for the filesystem backend.
//!
//! Entries record the codec they were written with, so changing the
//! configured compression never makes older entries unreadable.

use enchat_core::config::Compression;
use enchat_core::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{self, Read, Write};

const ZSTD_LEVEL: i32 = 3;

pub fn compress(body: &[u8], codec: Compression) -> Result<Vec<u8>> {
    let encoded = match codec {
        Compression::None => return Ok(body.to_vec()),
        Compression::Zstd => zstd::stream::encode_all(body, ZSTD_LEVEL),
        Compression::Gzip => {
            let mut gz = GzEncoder::new(Vec::with_capacity(body.len() / 2), flate2::Compression::fast());
            gz.write_all(body).and_then(|()| gz.finish())
        }
    };
    encoded.map_err(|e| codec_error("encode", codec, e))
}

pub fn decompress(stored: &[u8], codec: Compression) -> Result<Vec<u8>> {
    let decoded = match codec {
        Compression::None => return Ok(stored.to_vec()),
        Compression::Zstd => zstd::stream::decode_all(stored),
        Compression::Gzip => {
            let mut body = Vec::new();
            GzDecoder::new(stored).read_to_end(&mut body).map(|_| body)
        }
    };
    decoded.map_err(|e| codec_error("decode", codec, e))
}

fn codec_error(op: &str, codec: Compression, err: io::Error) -> Error {
    Error::Storage(format!("cannot {} {:?} body: {}", op, codec, err))
}
