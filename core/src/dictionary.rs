//! Wordlist sources and the lazy, restartable dictionary streamer.

use std::{
    fmt::Debug,
    fs::File,
    io::{BufRead, BufReader},
    ops::Range,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// The text encoding of a wordlist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordlistEncoding {
    /// Invalid sequences are replaced with U+FFFD.
    #[default]
    Utf8,
    Latin1,
}

impl WordlistEncoding {
    /// Decodes a line, without its line terminator.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            WordlistEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            WordlistEncoding::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }
}

/// A newline-delimited list of words.
pub trait WordlistSource: Debug + Send + Sync {
    /// Opens a reader positioned at the first line.
    fn open(&self) -> AuditResult<Box<dyn BufRead + Send + '_>>;

    fn encoding(&self) -> WordlistEncoding {
        WordlistEncoding::Utf8
    }

    /// Makes sure the source is readable and contains at least one word.
    fn validate(&self) -> AuditResult<()> {
        let mut streamer = DictionaryStreamer::new(self)?;

        match streamer.next_word()? {
            Some(_) => Ok(()),
            None => Err(AuditError::Source(format!("{self:?} contains no word"))),
        }
    }
}

/// A wordlist stored in a file.
#[derive(Clone, Debug)]
pub struct FileWordlist {
    path: PathBuf,
    encoding: WordlistEncoding,
}

impl FileWordlist {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            encoding: WordlistEncoding::default(),
        }
    }

    /// Sets the encoding of the file.
    pub fn encoding(mut self, encoding: WordlistEncoding) -> Self {
        self.encoding = encoding;

        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WordlistSource for FileWordlist {
    fn open(&self) -> AuditResult<Box<dyn BufRead + Send + '_>> {
        let file = File::open(&self.path).map_err(|err| {
            AuditError::Source(format!("unable to open {}: {err}", self.path.display()))
        })?;

        Ok(Box::new(BufReader::new(file)))
    }

    fn encoding(&self) -> WordlistEncoding {
        self.encoding
    }
}

/// A wordlist held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryWordlist {
    data: Vec<u8>,
    encoding: WordlistEncoding,
}

impl MemoryWordlist {
    /// Creates a wordlist from its lines.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = Vec::new();
        for line in lines {
            data.extend_from_slice(line.as_ref().as_bytes());
            data.push(b'\n');
        }

        Self {
            data,
            encoding: WordlistEncoding::Utf8,
        }
    }

    /// Creates a wordlist from raw newline-delimited bytes.
    pub fn from_bytes(data: Vec<u8>, encoding: WordlistEncoding) -> Self {
        Self { data, encoding }
    }
}

impl WordlistSource for MemoryWordlist {
    fn open(&self) -> AuditResult<Box<dyn BufRead + Send + '_>> {
        Ok(Box::new(self.data.as_slice()))
    }

    fn encoding(&self) -> WordlistEncoding {
        self.encoding
    }
}

/// Streams the words of a wordlist lazily.
/// Blank lines are skipped but still count as lines, so a line offset
/// always designates the same position of the source.
pub struct DictionaryStreamer<'a> {
    reader: Box<dyn BufRead + Send + 'a>,
    encoding: WordlistEncoding,
    /// Number of lines consumed so far.
    line: u64,
    buf: Vec<u8>,
}

impl<'a> DictionaryStreamer<'a> {
    /// Creates a streamer positioned at the first line.
    pub fn new<S: WordlistSource + ?Sized>(source: &'a S) -> AuditResult<Self> {
        Ok(Self {
            reader: source.open()?,
            encoding: source.encoding(),
            line: 0,
            buf: Vec::new(),
        })
    }

    /// Creates a streamer positioned at the given line offset.
    pub fn from_offset<S: WordlistSource + ?Sized>(source: &'a S, offset: u64) -> AuditResult<Self> {
        let mut streamer = Self::new(source)?;

        while streamer.line < offset {
            if streamer.read_line()?.is_none() {
                break;
            }
        }

        Ok(streamer)
    }

    /// The number of lines consumed so far.
    pub fn offset(&self) -> u64 {
        self.line
    }

    /// Reads the next line, trimmed. Returns `None` at the end of the source.
    fn read_line(&mut self) -> AuditResult<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;

        Ok(Some(self.encoding.decode(&self.buf).trim().to_owned()))
    }

    /// Returns the next non-blank word.
    pub fn next_word(&mut self) -> AuditResult<Option<String>> {
        while let Some(word) = self.read_line()? {
            if !word.is_empty() {
                return Ok(Some(word));
            }
        }

        Ok(None)
    }

    /// Reads up to `max_lines` lines and returns the line range read and its words.
    /// Returns `None` at the end of the source.
    pub fn next_batch(&mut self, max_lines: u64) -> AuditResult<Option<(Range<u64>, Vec<String>)>> {
        let start = self.line;
        let mut words = Vec::new();

        while self.line - start < max_lines {
            match self.read_line()? {
                Some(word) if word.is_empty() => continue,
                Some(word) => words.push(word),
                None => break,
            }
        }

        if self.line == start {
            return Ok(None);
        }

        Ok(Some((start..self.line, words)))
    }
}
