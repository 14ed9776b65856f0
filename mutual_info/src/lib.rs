pub mod combine;
pub mod config;
pub mod entropy;
pub mod error;
pub mod histogram;
pub mod kernel;
pub mod marginal;
pub mod pipeline;
pub mod reduce;
pub mod software;
pub mod stage;
pub mod stream;
pub mod unpack;
pub mod volume;

pub use config::{EntropyPrecision, MiConfig};
pub use error::{Error, Result};
pub use kernel::{MutualInfoKernel, Request, Response, Status};
pub use pipeline::Pipeline;
pub use software::{software_mi, SoftwareMi};
pub use volume::Volume;

/// Pixel intensity, also the histogram bin index.
pub type Bin = u8;
