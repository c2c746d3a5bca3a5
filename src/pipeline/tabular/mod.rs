pub mod headers;
pub mod delimited;
pub mod rows;
pub mod workbook;

pub use headers::*;
pub use delimited::*;
pub use rows::*;
pub use workbook::*;

use thiserror::Error;

use crate::pipeline::remote::RemoteError;

#[derive(Error, Debug)]
pub enum TabularError {
    #[error("Table has no header row")]
    Empty,

    #[error("Input is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Workbook decode failed: {0}")]
    Decode(String),

    #[error("Missing required columns: {0}")]
    InvalidMapping(String),

    #[error("Remote fetch failed: {0}")]
    Remote(#[from] RemoteError),
}
