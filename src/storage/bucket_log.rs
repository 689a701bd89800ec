//! # Time-Bucketed Log
//!
//! A flat file holding at most one record per time bucket, in ascending time
//! order. Writing an event either rewrites the last line (the event falls into
//! the bucket it already covers) or appends a fresh bucket.
//!
//! Every write runs under an exclusive advisory lock on the file, so the
//! read-last-line / truncate / append sequence is never interleaved with
//! another writer, whether in this process or another one.

use fs2::FileExt;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::types::LogOutcome;
use crate::codec::record::{self, BucketRecord};
use crate::error::{Result, StatsError};
use crate::types::{bucket_start, now_secs};

/// Initial number of bytes read from the end of the file when looking for
/// the last line. Doubled until the whole line is inside the buffer.
const TAIL_CHUNK: u64 = 4096;

/// How to fold one event into a log.
///
/// `update` receives the record of the bucket the event falls into when that
/// bucket is the last one in the file; otherwise `init` builds a fresh record.
/// Whatever `time` the closures set is overwritten with the bucket start.
pub struct Upsert<U, I> {
    /// Event time in epoch seconds; `None` means now.
    pub time: Option<i64>,
    pub update: U,
    pub init: I,
}

impl<U, I> Upsert<U, I> {
    pub fn new(update: U, init: I) -> Self {
        Upsert {
            time: None,
            update,
            init,
        }
    }

    pub fn at(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }
}

/// The last non-empty line of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastLine {
    /// Line content without line breaks
    pub text: String,
    /// Byte offset where the line starts
    pub start: usize,
    /// Bytes from `start` to the end of the buffer, trailing breaks included
    pub length: usize,
}

/// Find the last line of `bytes`, skipping trailing `\n`/`\r` and reading back
/// to the previous line break or the start of the buffer.
pub fn last_line(bytes: &[u8]) -> Option<LastLine> {
    let is_break = |b: &u8| *b == b'\n' || *b == b'\r';

    let end = bytes.iter().rposition(|b| !is_break(b))? + 1;
    let start = bytes[..end].iter().rposition(is_break).map_or(0, |i| i + 1);

    Some(LastLine {
        text: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
        start,
        length: bytes.len() - start,
    })
}

/// Line separator accepted on read, matching [`last_line`].
fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// End of a file, read far enough back to contain its whole last line.
struct Tail {
    offset: u64,
    bytes: Vec<u8>,
}

impl Tail {
    fn ends_with_break(&self) -> bool {
        self.bytes
            .last()
            .map_or(true, |b| *b == b'\n' || *b == b'\r')
    }
}

fn read_tail(file: &mut File, size: u64) -> io::Result<Tail> {
    let mut chunk = TAIL_CHUNK;
    loop {
        let offset = size.saturating_sub(chunk);
        file.seek(SeekFrom::Start(offset))?;

        let mut bytes = Vec::with_capacity((size - offset) as usize);
        Read::by_ref(&mut *file).take(size - offset).read_to_end(&mut bytes)?;

        let complete = offset == 0 || matches!(last_line(&bytes), Some(line) if line.start > 0);
        if complete {
            return Ok(Tail { offset, bytes });
        }
        chunk *= 2;
    }
}

/// A single time-bucketed log file holding records of type `R`.
pub struct TimeBucketLog<R> {
    path: PathBuf,
    interval: i64,
    _record: PhantomData<fn() -> R>,
}

impl<R> std::fmt::Debug for TimeBucketLog<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBucketLog")
            .field("path", &self.path)
            .field("interval", &self.interval)
            .finish()
    }
}

impl<R: BucketRecord> TimeBucketLog<R> {
    /// A log at `path` grouping events into `interval`-second buckets. The
    /// file is not touched until the first write.
    pub fn new<P: AsRef<Path>>(path: P, interval: i64) -> Self {
        TimeBucketLog {
            path: path.as_ref().to_path_buf(),
            interval,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Fold one event into the log, updating the last bucket in place or
    /// appending a new one.
    pub fn log<U, I>(&self, upsert: Upsert<U, I>) -> Result<LogOutcome>
    where
        U: FnOnce(R) -> R,
        I: FnOnce() -> R,
    {
        let time = upsert.time.unwrap_or_else(now_secs);
        if self.interval <= 0 {
            return Err(StatsError::Config(format!(
                "bucket interval of {} must be positive, got {}",
                self.path.display(),
                self.interval
            )));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| StatsError::io(&self.path, e))?;

        FileExt::lock_exclusive(&file).map_err(|e| StatsError::io(&self.path, e))?;
        let result = self.upsert_locked(&mut file, time, upsert.update, upsert.init);
        if let Err(e) = FileExt::unlock(&file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }

        result
    }

    fn upsert_locked<U, I>(&self, file: &mut File, time: i64, update: U, init: I) -> Result<LogOutcome>
    where
        U: FnOnce(R) -> R,
        I: FnOnce() -> R,
    {
        let io_err = |e| StatsError::io(&self.path, e);

        let size = file.metadata().map_err(io_err)?.len();
        let tail = read_tail(file, size).map_err(io_err)?;
        let last = last_line(&tail.bytes);

        let last_record = last.as_ref().and_then(|line| {
            record::decode::<R>(&line.text)
                .map_err(|e| {
                    warn!(
                        "Ignoring undecodable last line of {}: {}",
                        self.path.display(),
                        e
                    )
                })
                .ok()
        });

        let (next, outcome, needs_break) = match (last_record, last) {
            (Some(previous), Some(line))
                if previous
                    .time()
                    .checked_add(self.interval)
                    .map_or(false, |bucket_end| time < bucket_end) =>
            {
                let bucket = previous.time();
                let mut next = update(previous);
                next.set_time(bucket);

                // The line start always follows a line break or is offset 0.
                file.set_len(size - line.length as u64).map_err(io_err)?;
                (next, LogOutcome::Updated { bucket }, false)
            }
            _ => {
                let bucket = bucket_start(time, self.interval);
                let mut next = init();
                next.set_time(bucket);
                (next, LogOutcome::Appended { bucket }, !tail.ends_with_break())
            }
        };

        let mut line = String::new();
        if needs_break {
            line.push('\n');
        }
        line.push_str(&record::encode(&next));
        line.push('\n');

        file.seek(SeekFrom::End(0)).map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        debug!("{:?} {}", outcome, self.path.display());
        Ok(outcome)
    }

    /// The last record in the file, if any decodes.
    pub fn last(&self) -> Result<Option<R>> {
        let mut file = match self.open_shared()? {
            Some(file) => file,
            None => return Ok(None),
        };
        let result = file
            .metadata()
            .and_then(|meta| read_tail(&mut file, meta.len()));
        self.unlock(&file);
        let tail = result.map_err(|e| StatsError::io(&self.path, e))?;

        Ok(last_line(&tail.bytes).and_then(|line| record::decode::<R>(&line.text).ok()))
    }

    /// All records in file order. Lines that fail to decode are skipped. A
    /// missing file reads as empty.
    pub fn read(&self) -> Result<Vec<R>> {
        let contents = match self.read_contents()? {
            Some(contents) => contents,
            None => return Ok(Vec::new()),
        };

        let records = contents
            .split(is_line_break)
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .filter_map(|(number, line)| match record::decode::<R>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        "Skipping line {} of {}: {}",
                        number + 1,
                        self.path.display(),
                        e
                    );
                    None
                }
            })
            .collect();

        Ok(records)
    }

    /// All lines as JSON objects keyed by field name, without typed decoding.
    pub fn read_raw(&self, convert_numerics: bool) -> Result<Vec<Map<String, Value>>> {
        let fields = record::schema::<R>();
        let contents = self.read_contents()?.unwrap_or_default();

        Ok(contents
            .split(is_line_break)
            .filter(|line| !line.is_empty())
            .map(|line| record::decode_raw(line, &fields, convert_numerics))
            .collect())
    }

    fn read_contents(&self) -> Result<Option<String>> {
        let mut file = match self.open_shared()? {
            Some(file) => file,
            None => return Ok(None),
        };

        let mut bytes = Vec::new();
        let result = file.read_to_end(&mut bytes);
        self.unlock(&file);
        result.map_err(|e| StatsError::io(&self.path, e))?;

        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn open_shared(&self) -> Result<Option<File>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StatsError::io(&self.path, e)),
        };
        FileExt::lock_shared(&file).map_err(|e| StatsError::io(&self.path, e))?;
        Ok(Some(file))
    }

    fn unlock(&self, file: &File) {
        if let Err(e) = FileExt::unlock(file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
