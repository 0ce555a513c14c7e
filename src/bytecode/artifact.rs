//! Encoding of bytecode programs and typed programs on disk.
//!
//! Bytecode programs travel as postcard (compact, the default) or pretty
//! JSON; typed programs from the semantic builder always arrive as JSON.

use std::path::Path;

use crate::bytecode::ProgramBc;
use crate::lang::Program;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid postcard encoding: {0}")]
    Postcard(#[from] postcard::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Postcard,
}

impl ArtifactFormat {
    /// `.json` files are JSON, anything else is postcard.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::Json,
            _ => ArtifactFormat::Postcard,
        }
    }
}

pub fn encode(bc: &ProgramBc, format: ArtifactFormat) -> Result<Vec<u8>, ArtifactError> {
    Ok(match format {
        ArtifactFormat::Json => serde_json::to_vec_pretty(bc)?,
        ArtifactFormat::Postcard => postcard::to_allocvec(bc)?,
    })
}

pub fn decode(bytes: &[u8], format: ArtifactFormat) -> Result<ProgramBc, ArtifactError> {
    Ok(match format {
        ArtifactFormat::Json => serde_json::from_slice(bytes)?,
        ArtifactFormat::Postcard => postcard::from_bytes(bytes)?,
    })
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_file(path: &Path) -> Result<ProgramBc, ArtifactError> {
    decode(&read(path)?, ArtifactFormat::from_path(path))
}

pub fn write_file(path: &Path, bc: &ProgramBc) -> Result<(), ArtifactError> {
    let bytes = encode(bc, ArtifactFormat::from_path(path))?;
    std::fs::write(path, bytes).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load a typed program, as produced by the semantic builder, from JSON.
pub fn load_program(path: &Path) -> Result<Program, ArtifactError> {
    Ok(serde_json::from_slice(&read(path)?)?)
}
