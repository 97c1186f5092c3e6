pub mod codec;
pub mod enhance;
pub mod filters;
pub mod resize;
pub mod types;

pub use codec::*;
pub use enhance::*;
pub use resize::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Cannot read image file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Encode(String),

    #[error(
        "Cannot fit image under {max_bytes} bytes: still {bytes} bytes at {width}x{height}"
    )]
    SizeBudgetUnreachable {
        width: u32,
        height: u32,
        bytes: usize,
        max_bytes: usize,
    },
}
