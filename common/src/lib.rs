pub mod file_format;
pub mod file_utils;
pub mod float_ext;
pub mod log_setup;
pub mod packed_word;
pub mod serde;
pub mod test_utils;

pub use float_ext::FloatExt;
pub use packed_word::{PackLayout, PackedWord};

pub const EPSILON: f64 = 1e-6;

pub fn is_debug() -> bool {
    cfg!(debug_assertions)
}
