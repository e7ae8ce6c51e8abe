//! Daily activity log files.
//!
//! Besides stderr, `main` writes every log line to
//! `<data_dir>/logs/ponder_YYYYMMDD.log`. [`DailyLogWriter`] switches to a new
//! file when the local date changes, so a long-running scheduler still
//! produces one file per day. [`ActivityLog`] reads them back for the `logs`
//! and `log-reflect` commands.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

const PREFIX: &str = "ponder_";
const SUFFIX: &str = ".log";
const DATE_FORMAT: &str = "%Y%m%d";

pub fn log_file_name(date: NaiveDate) -> String {
    format!("{PREFIX}{}{SUFFIX}", date.format(DATE_FORMAT))
}

fn parse_log_date(name: &str) -> Option<NaiveDate> {
    let stamp = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    NaiveDate::parse_from_str(stamp, DATE_FORMAT).ok()
}

#[derive(Debug, Clone)]
pub struct LogFile {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// The directory of daily log files.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    dir: PathBuf,
}

impl ActivityLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open the file for `date` in append mode, creating the directory.
    pub fn open_for(&self, date: NaiveDate) -> Result<File> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(log_file_name(date));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))
    }

    /// The latest `days` log files, oldest first. Other files are ignored.
    pub fn recent(&self, days: usize) -> Result<Vec<LogFile>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", self.dir.display())),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let date = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_log_date);
            if let Some(date) = date {
                files.push(LogFile { date, path });
            }
        }
        files.sort_by_key(|f| f.date);
        let skip = files.len().saturating_sub(days);
        Ok(files.split_off(skip))
    }

    /// Contents of the latest `days` files, each under a `## <file name>` header.
    pub fn read_recent(&self, days: usize) -> Result<String> {
        let mut out = String::new();
        for file in self.recent(days)? {
            let text = std::fs::read_to_string(&file.path)
                .with_context(|| format!("failed to read {}", file.path.display()))?;
            out.push_str(&format!("## {}\n", log_file_name(file.date)));
            out.push_str(&text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }
}

struct Current {
    date: NaiveDate,
    file: File,
}

/// `tracing_subscriber` writer that appends to the current day's file.
pub struct DailyLogWriter {
    log: ActivityLog,
    current: Mutex<Current>,
}

impl DailyLogWriter {
    pub fn open(log: ActivityLog) -> Result<Self> {
        let date = Local::now().date_naive();
        let file = log.open_for(date)?;
        Ok(Self {
            log,
            current: Mutex::new(Current { date, file }),
        })
    }

    fn lock_for(&self, today: NaiveDate) -> MutexGuard<'_, Current> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.date != today {
            // Keep writing to the old file if the new one cannot be opened.
            if let Ok(file) = self.log.open_for(today) {
                *current = Current { date: today, file };
            }
        }
        current
    }
}

pub struct DailyLogHandle<'a> {
    current: MutexGuard<'a, Current>,
}

impl Write for DailyLogHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.current.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.current.file.flush()
    }
}

impl<'a> MakeWriter<'a> for DailyLogWriter {
    type Writer = DailyLogHandle<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        DailyLogHandle {
            current: self.lock_for(Local::now().date_naive()),
        }
    }
}
