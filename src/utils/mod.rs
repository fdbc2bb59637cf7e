//! Shared low-level helpers: the compressed integer codec and alignment math.

mod compression;
mod math;

pub use compression::{
    compress_int, compress_uint, compressed_uint_size, decompress_int, decompress_uint,
    write_compressed_int, write_compressed_uint, MAX_COMPRESSED_INT, MAX_COMPRESSED_UINT,
    MIN_COMPRESSED_INT,
};
pub use math::{align_to, pad_to, tag_bits, to_u32};
