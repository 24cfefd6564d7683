/// Container format errors.
///
/// All of these are fatal for the file being read or written; callers processing a
/// batch of files are expected to report and move on.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The card stream ended before an `END` card was found.
    #[error("header ended without an END card after {cards} cards")]
    MissingEnd { cards: usize },

    /// The data block did not contain the number of bytes implied by the header.
    #[error("data block length mismatch")]
    DataLength {
        /// Number of bytes we got
        actual: usize,
        /// Number of bytes expected from BITPIX and NAXISn
        expected: usize,
    },

    #[error("unsupported BITPIX value: {0}")]
    UnsupportedBitpix(i64),

    #[error("missing required card: {0}")]
    MissingCard(String),

    #[error("invalid value for card {key}: {value}")]
    InvalidCard { key: String, value: String },

    /// A data block was requested but there is no data array to write.
    #[error("no data array to write")]
    NoData,
}

pub type Result<T> = std::result::Result<T, Error>;
