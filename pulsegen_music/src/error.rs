// Error type for generation and catalog loading.
//
// Generation itself recovers locally from everything except a corrupt SMF
// buffer, so `StructuralValidation` is the only variant `generate` returns.
// The I/O and parse variants come from the CLI and `StyleCatalog::load`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rendered MIDI failed validation: {0}")]
    StructuralValidation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("style catalog is not valid JSON: {0}")]
    StyleCatalog(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GenerationError>;
