//! Primary-key sources for point lookups.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::KEY_TOKEN_PATTERN;
use crate::error_handling::{ConfigurationError, ResourceError};

static KEY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(KEY_TOKEN_PATTERN).expect("key token pattern is valid"));

/// Where point-lookup keys come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Keys held in memory
    List(Vec<String>),
    /// Keys read lazily from a text file
    File(PathBuf),
}

impl KeySource {
    /// Builds a key source from the two optional caller inputs.
    ///
    /// # Errors
    ///
    /// `ConflictingKeySources` if both are given, `MissingKeySource` if
    /// neither is.
    pub fn from_options(
        pks: Option<Vec<String>>,
        pk_file: Option<PathBuf>,
    ) -> Result<Self, ConfigurationError> {
        match (pks, pk_file) {
            (Some(_), Some(_)) => Err(ConfigurationError::ConflictingKeySources),
            (Some(keys), None) => Ok(KeySource::List(keys)),
            (None, Some(path)) => Ok(KeySource::File(path)),
            (None, None) => Err(ConfigurationError::MissingKeySource),
        }
    }

    /// Splits the keys into consecutive chunks of at most `chunk_size`.
    ///
    /// # Errors
    ///
    /// `ResourceError::Open` when the key file cannot be opened. Read
    /// failures surface from the iterator.
    pub(crate) fn into_chunks(
        self,
        chunk_size: usize,
    ) -> Result<Box<dyn Iterator<Item = Result<Vec<String>, ResourceError>>>, ResourceError> {
        let chunk_size = chunk_size.max(1);
        match self {
            KeySource::List(keys) => {
                let chunks: Vec<Vec<String>> =
                    keys.chunks(chunk_size).map(<[String]>::to_vec).collect();
                Ok(Box::new(chunks.into_iter().map(Ok)))
            }
            KeySource::File(path) => Ok(Box::new(KeyChunks::open(&path, chunk_size)?)),
        }
    }
}

/// Extracts key tokens from one line of text.
pub fn key_tokens(line: &str) -> impl Iterator<Item = &str> {
    KEY_TOKEN.find_iter(line).map(|m| m.as_str())
}

/// Iterator over chunks of keys read from a text source, one line at a time.
pub struct KeyChunks<R> {
    lines: std::io::Lines<R>,
    path: PathBuf,
    pending: Vec<String>,
    chunk_size: usize,
    exhausted: bool,
}

impl KeyChunks<BufReader<File>> {
    /// Opens a key file.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self, ResourceError> {
        let file = File::open(path).map_err(|source| ResourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), path, chunk_size))
    }
}

impl<R: BufRead> KeyChunks<R> {
    /// Reads keys from any buffered reader. `path` is only used in errors.
    pub fn new(reader: R, path: &Path, chunk_size: usize) -> Self {
        Self {
            lines: reader.lines(),
            path: path.to_path_buf(),
            pending: Vec::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
            exhausted: false,
        }
    }
}

impl<R: BufRead> Iterator for KeyChunks<R> {
    type Item = Result<Vec<String>, ResourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted && self.pending.len() < self.chunk_size {
            match self.lines.next() {
                Some(Ok(line)) => self.pending.extend(key_tokens(&line).map(str::to_string)),
                Some(Err(source)) => {
                    self.exhausted = true;
                    return Some(Err(ResourceError::Read {
                        path: self.path.clone(),
                        source,
                    }));
                }
                None => self.exhausted = true,
            }
        }

        if self.pending.is_empty() {
            return None;
        }
        let take = self.chunk_size.min(self.pending.len());
        let rest = self.pending.split_off(take);
        Some(Ok(std::mem::replace(&mut self.pending, rest)))
    }
}
