use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Song not found: {0}")]
    SongNotFound(u64),

    #[error("Unknown file type: {0}")]
    UnknownFileType(String),

    #[error("Required tags could not be extracted: {0}")]
    MissingTags(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
