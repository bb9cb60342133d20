//! JSON-lines file backend, partitioned by UTC day
//!
//! Each entry is one JSON object per line in `activity-YYYY-MM-DD.jsonl`,
//! chosen by the UTC day of its `created_at`. Appends to one file are
//! serialized behind a per-day mutex within the process and an exclusive
//! advisory lock on the file across processes. Readers take a shared lock.
//! Retention removes whole day files.
//!
//! ```text
//! <dir>/
//!   .htaccess                   # deny rule for web-root placement
//!   index.html                  # blocks directory listing
//!   activity-2026-10-18.jsonl
//!   activity-2026-10-19.jsonl
//! ```

use super::Storage;
use crate::error::{ActivityError, Result};
use crate::query::LogQuery;
use crate::types::LogEntry;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const FILE_PREFIX: &str = "activity-";
const FILE_SUFFIX: &str = ".jsonl";

/// Append-only, date-partitioned file storage
pub struct FileStorage {
    dir: PathBuf,
    /// One append lock per day file
    locks: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ActivityError::storage(
                "file",
                format!("Failed to create log directory {}: {}", dir.display(), e),
            )
        })?;
        protect_dir(&dir)?;

        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding entries for `day`
    pub fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(file_name(day))
    }

    fn lock_for(&self, day: NaiveDate) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|e| {
            ActivityError::storage("file", format!("lock table poisoned: {}", e))
        })?;
        Ok(locks.entry(day).or_default().clone())
    }

    /// Day files present on disk, oldest first
    pub fn day_files(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(day) = parse_file_date(&name) {
                files.push((day, entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Day files that can contain matches for the query's date range
    fn candidate_files(&self, query: &LogQuery) -> Result<Vec<PathBuf>> {
        let (from, to) = query.day_range();
        Ok(self
            .day_files()?
            .into_iter()
            .filter(|(day, _)| from.map_or(true, |f| *day >= f) && to.map_or(true, |t| *day <= t))
            .map(|(_, path)| path)
            .collect())
    }

    fn append(&self, day: NaiveDate, buf: &[u8]) -> Result<()> {
        let lock = self.lock_for(day)?;
        let _guard = lock.lock().map_err(|e| {
            ActivityError::storage("file", format!("append lock poisoned: {}", e))
        })?;

        let path = self.path_for(day);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.lock()?;
        let written = file.write_all(buf).and_then(|_| file.flush());
        file.unlock()?;
        written?;
        Ok(())
    }

    /// Remove a day file, returning how many records it held
    fn remove_day(&self, day: NaiveDate, path: &Path) -> Result<u64> {
        let lock = self.lock_for(day)?;
        let _guard = lock.lock().map_err(|e| {
            ActivityError::storage("file", format!("append lock poisoned: {}", e))
        })?;

        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        file.lock()?;
        let mut records = 0u64;
        read_records(BufReader::new(&file), path, |_| records += 1)?;
        file.unlock()?;
        drop(file);

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(&day);
        }
        Ok(records)
    }
}

impl Storage for FileStorage {
    fn insert(&self, entries: &[LogEntry]) -> Result<()> {
        let mut by_day: BTreeMap<NaiveDate, Vec<u8>> = BTreeMap::new();
        for entry in entries {
            let mut record = entry.clone();
            record.log_id = Some(format!("log-{}", uuid::Uuid::new_v4()));
            let buf = by_day.entry(entry.created_at.date_naive()).or_default();
            serde_json::to_writer(&mut *buf, &record)?;
            buf.push(b'\n');
        }

        let mut failed = Vec::new();
        for (day, buf) in &by_day {
            if let Err(e) = self.append(*day, buf) {
                tracing::warn!(day = %day, error = %e, "Failed to append log file");
                failed.push(format!("{}: {}", file_name(*day), e));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ActivityError::storage("file", failed.join("; ")))
        }
    }

    fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let mut matched = Vec::new();
        for path in self.candidate_files(query)? {
            for_each_record(&path, |entry| {
                if query.matches(&entry) {
                    matched.push(entry);
                }
            })?;
        }
        // Already filtered; apply() re-checks cheaply and handles order + slice
        Ok(query.apply(matched))
    }

    fn count(&self, query: &LogQuery) -> Result<u64> {
        let mut count = 0u64;
        for path in self.candidate_files(query)? {
            for_each_record(&path, |entry| {
                if query.matches(&entry) {
                    count += 1;
                }
            })?;
        }
        Ok(count)
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_day = cutoff.date_naive();
        let mut deleted = 0u64;

        for (day, path) in self.day_files()? {
            if day >= cutoff_day {
                break;
            }
            let records = self.remove_day(day, &path)?;
            deleted += records;
            tracing::debug!(file = %path.display(), records, "Removed expired log file");
        }

        Ok(deleted)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// `activity-YYYY-MM-DD.jsonl`
pub fn file_name(day: NaiveDate) -> String {
    format!("{}{}{}", FILE_PREFIX, day.format("%Y-%m-%d"), FILE_SUFFIX)
}

/// Inverse of `file_name`; `None` for anything else in the directory
pub fn parse_file_date(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// Stream a day file under a shared lock, decoding each record
fn for_each_record(path: &Path, f: impl FnMut(LogEntry)) -> Result<()> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        // Removed by a concurrent cleanup
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    file.lock_shared()?;
    let read = read_records(BufReader::new(&file), path, f);
    file.unlock()?;
    read
}

/// Decode one record per line
///
/// Undecodable lines (a torn write or invalid UTF-8) are skipped
/// with a warning.
fn read_records(mut reader: impl BufRead, path: &Path, mut f: impl FnMut(LogEntry)) -> Result<()> {
    let mut buf = Vec::new();
    let mut line = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        line += 1;
        if buf.trim_ascii().is_empty() {
            continue;
        }
        match serde_json::from_slice::<LogEntry>(&buf) {
            Ok(entry) => f(entry),
            Err(e) => tracing::warn!(
                file = %path.display(),
                line,
                error = %e,
                "Skipping undecodable log record"
            ),
        }
    }
}

/// Keep the directory private and unlistable
fn protect_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    let index = dir.join("index.html");
    if !index.exists() {
        fs::write(&index, "")?;
    }
    let htaccess = dir.join(".htaccess");
    if !htaccess.exists() {
        fs::write(&htaccess, "Require all denied\nDeny from all\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Order;
    use crate::types::{Behaviour, Level, Payload};
    use chrono::{Duration, TimeZone};

    fn entry_at(owner: &str, created_at: DateTime<Utc>) -> LogEntry {
        LogEntry {
            log_id: None,
            owner: owner.to_string(),
            action_type: "save".to_string(),
            object_type: "post".to_string(),
            behaviour: Behaviour::Warning,
            level: Level::Developer,
            user_id: 4,
            object_id: 8,
            message: format!("{} saved", owner),
            data: Payload::new(serde_json::json!({"fields": ["title"]})),
            request_id: "abcdef0123456789".to_string(),
            request_context: "POST /save".to_string(),
            created_at,
        }
    }

    #[test]
    fn test_file_name_roundtrip() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(file_name(day), "activity-2026-10-19.jsonl");
        assert_eq!(parse_file_date(&file_name(day)), Some(day));
        assert_eq!(parse_file_date("index.html"), None);
        assert_eq!(parse_file_date("activity-garbage.jsonl"), None);
    }

    #[test]
    fn test_open_protects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("logs")).unwrap();
        assert!(storage.dir().join("index.html").exists());
        let htaccess = fs::read_to_string(storage.dir().join(".htaccess")).unwrap();
        assert!(htaccess.contains("Deny from all"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(storage.dir()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_insert_partitions_by_day() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let day1 = Utc.with_ymd_and_hms(2026, 10, 1, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 10, 2, 0, 1, 0).unwrap();

        storage
            .insert(&[entry_at("a", day1), entry_at("b", day2), entry_at("c", day2)])
            .unwrap();

        let files = storage.day_files().unwrap();
        assert_eq!(files.len(), 2);
        let second = fs::read_to_string(&files[1].1).unwrap();
        assert_eq!(second.lines().count(), 2);
        assert!(second.lines().all(|l| l.contains("\"log_id\":\"log-")));
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let entry = entry_at("plugin-a", crate::types::now());

        storage.insert(std::slice::from_ref(&entry)).unwrap();
        let all = storage.query(&LogQuery::new()).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].log_id.is_some());
        assert!(all[0].same_record(&entry));
    }

    #[test]
    fn test_query_date_range_selects_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let batch: Vec<LogEntry> = (0..5)
            .map(|i| entry_at(&format!("d{}", i), base + Duration::days(i)))
            .collect();
        storage.insert(&batch).unwrap();

        let q = LogQuery::new()
            .between(
                Some(Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2026, 5, 3, 23, 59, 59).unwrap()),
            )
            .order(Order::Asc);
        let owners: Vec<String> = storage.query(&q).unwrap().into_iter().map(|e| e.owner).collect();
        assert_eq!(owners, vec!["d1", "d2"]);
        assert_eq!(storage.count(&q).unwrap(), 2);
    }

    #[test]
    fn test_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let now = crate::types::now();
        storage.insert(&[entry_at("ok", now)]).unwrap();

        let path = storage.path_for(now.date_naive());
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{not json\n\n").unwrap();

        assert_eq!(storage.count(&LogQuery::new()).unwrap(), 1);
        assert_eq!(storage.query(&LogQuery::new()).unwrap()[0].owner, "ok");
    }

    #[test]
    fn test_skips_invalid_utf8_lines() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let old = crate::types::now() - Duration::days(10);
        storage.insert(&[entry_at("before", old)]).unwrap();

        let path = storage.path_for(old.date_naive());
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"torn\xff\xfe\n").unwrap();
        drop(file);
        storage.insert(&[entry_at("after", old)]).unwrap();

        assert_eq!(storage.count(&LogQuery::new()).unwrap(), 2);
        let mut owners: Vec<String> = storage
            .query(&LogQuery::new())
            .unwrap()
            .into_iter()
            .map(|e| e.owner)
            .collect();
        owners.sort();
        assert_eq!(owners, vec!["after", "before"]);

        // Retention still removes the damaged file
        assert_eq!(storage.delete_before(crate::types::now()).unwrap(), 2);
        assert!(!path.exists());
    }

    #[test]
    fn test_delete_removes_whole_days_before_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let cutoff = Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap();

        storage
            .insert(&[
                entry_at("old1", cutoff - Duration::days(3)),
                entry_at("old2", cutoff - Duration::days(3)),
                entry_at("old3", cutoff - Duration::days(1)),
                // Same day as the cutoff but earlier: kept (day granularity)
                entry_at("same-day", cutoff - Duration::hours(2)),
                entry_at("new", cutoff + Duration::days(1)),
            ])
            .unwrap();

        assert_eq!(storage.delete_before(cutoff).unwrap(), 3);
        let mut owners: Vec<String> = storage
            .query(&LogQuery::new())
            .unwrap()
            .into_iter()
            .map(|e| e.owner)
            .collect();
        owners.sort();
        assert_eq!(owners, vec!["new", "same-day"]);
        assert_eq!(storage.delete_before(cutoff).unwrap(), 0);

        // Locks for removed days are released
        let locks = storage.locks.lock().unwrap();
        assert!(locks.keys().all(|day| *day >= cutoff.date_naive()));
    }

    #[test]
    fn test_concurrent_appends_keep_lines_intact() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
        let now = crate::types::now();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        storage
                            .insert(&[entry_at(&format!("t{}-{}", t, i), now)])
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(storage.count(&LogQuery::new()).unwrap(), 100);
    }

    #[test]
    fn test_separate_handles_serialize_large_appends() {
        let dir = tempfile::tempdir().unwrap();
        let now = crate::types::now();
        let big = "x".repeat(64 * 1024);

        // Two independent storages share no in-process mutex
        let handles: Vec<_> = (0..2)
            .map(|t| {
                let storage = FileStorage::open(dir.path()).unwrap();
                let big = big.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let batch: Vec<LogEntry> = (0..4)
                            .map(|j| {
                                let mut entry = entry_at(&format!("t{}-{}-{}", t, i, j), now);
                                entry.message = big.clone();
                                entry
                            })
                            .collect();
                        storage.insert(&batch).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(storage.count(&LogQuery::new()).unwrap(), 80);
        let raw = fs::read(storage.path_for(now.date_naive())).unwrap();
        let lines = raw.split(|b| *b == b'\n').filter(|l| !l.is_empty());
        assert!(lines.map(serde_json::from_slice::<LogEntry>).all(|r| r.is_ok()));
    }
}
