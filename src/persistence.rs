//! File-backed ledger in JSON Lines format.
//!
//! Each committed batch is one JSON object on its own line. A batch is
//! written with a single `write_all` followed by `sync_data`, so a crash can
//! leave at most one unterminated trailing line. Readers ignore it and the
//! next commit truncates it before appending.
//!
//! The file is opened inside each operation and closed before it returns.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::LedgerError;
use crate::ledger::{Ledger, LedgerBatch};

/// [`Ledger`] appending to a `.jsonl` file.
#[derive(Clone, Debug)]
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    /// Use `path`, creating parent directories. The file itself is created
    /// on the first commit.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every complete batch in file order.
    pub fn load(&self) -> Result<Vec<LedgerBatch>, LedgerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        parse_batches(&contents)
    }
}

/// Parse newline-terminated batches; an unterminated last line is dropped.
fn parse_batches(contents: &str) -> Result<Vec<LedgerBatch>, LedgerError> {
    let complete = match contents.rfind('\n') {
        Some(end) => &contents[..end],
        None => "",
    };

    let mut batches = Vec::new();
    for (line_num, line) in complete.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let batch: LedgerBatch = serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
            line: line_num + 1,
            detail: e.to_string(),
        })?;
        batches.push(batch);
    }
    Ok(batches)
}

/// Truncate an unterminated last line so the next batch starts on its own line.
fn drop_torn_tail(file: &mut File, path: &Path) -> io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    let keep = contents
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i as u64 + 1);
    warn!(
        "{}: dropping {} bytes of an unterminated trailing line",
        path.display(),
        len - keep
    );
    file.set_len(keep)
}

impl Ledger for JsonlLedger {
    fn write_batch(&mut self, batch: LedgerBatch) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(&batch)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        drop_torn_tail(&mut file, &self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn batches_for(&self, portfolio_id: u32) -> Result<Vec<LedgerBatch>, LedgerError> {
        let mut batches = self.load()?;
        batches.retain(|b| b.portfolio_id == portfolio_id);
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Transaction;
    use crate::types::{Action, Holding, Order, RiskProfile};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
    }

    fn commit(ledger: &mut JsonlLedger, portfolio_id: u32, d: u32, weight: f64) {
        let mut tx = Transaction::begin(ledger, portfolio_id, date(d));
        tx.append_orders([Order {
            date: date(d),
            portfolio_id,
            risk_profile: RiskProfile::LowTurnover,
            action: Action::Buy,
            asset: "MSFT".into(),
            quantity: weight,
            sector: "Technology".into(),
        }]);
        tx.append_holdings([Holding {
            portfolio_id,
            ticker: "MSFT".into(),
            weight,
            as_of: date(d),
        }]);
        tx.commit().unwrap();
    }

    #[test]
    fn commit_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = JsonlLedger::open(dir.path().join("nested/ledger.jsonl")).unwrap();
        commit(&mut ledger, 1, 6, 0.1);
        commit(&mut ledger, 2, 6, 0.3);
        commit(&mut ledger, 1, 13, 0.2);

        let reopened = JsonlLedger::open(ledger.path()).unwrap();
        assert_eq!(reopened.load().unwrap().len(), 3);
        assert_eq!(reopened.orders(1).unwrap().len(), 2);
        let latest = reopened.latest_holdings(1).unwrap().unwrap();
        assert_eq!(latest[0].weight, 0.2);
        assert_eq!(latest[0].as_of, date(13));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonlLedger::open(dir.path().join("none.jsonl")).unwrap();
        assert!(ledger.load().unwrap().is_empty());
        assert!(ledger.latest_holdings(1).unwrap().is_none());
    }

    #[test]
    fn partial_trailing_line_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = JsonlLedger::open(dir.path().join("ledger.jsonl")).unwrap();
        commit(&mut ledger, 1, 6, 0.1);

        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        file.write_all(br#"{"portfolio_id":1,"date":"2023-03-13","ord"#).unwrap();
        drop(file);

        let batches = ledger.load().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].date, date(6));
    }

    #[test]
    fn commit_after_torn_tail_starts_a_fresh_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = JsonlLedger::open(dir.path().join("ledger.jsonl")).unwrap();
        commit(&mut ledger, 1, 6, 0.1);

        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        file.write_all(br#"{"portfolio_id":1,"date":"2023-03-13","ord"#).unwrap();
        drop(file);

        commit(&mut ledger, 1, 13, 0.2);
        let batches = ledger.load().unwrap();
        let dates: Vec<_> = batches.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(6), date(13)]);
        assert_eq!(batches[1].holdings[0].weight, 0.2);

        let contents = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn torn_first_write_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        fs::write(&path, b"{\"portfolio_id\":1,").unwrap();

        let mut ledger = JsonlLedger::open(&path).unwrap();
        commit(&mut ledger, 1, 6, 0.1);
        let batches = ledger.load().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].date, date(6));
    }

    #[test]
    fn corrupt_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let mut ledger = JsonlLedger::open(&path).unwrap();
        commit(&mut ledger, 1, 6, 0.1);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"not json\n").unwrap();
        drop(file);

        let err = ledger.load().unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn rejected_batch_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = JsonlLedger::open(dir.path().join("ledger.jsonl")).unwrap();
        let mut tx = Transaction::begin(&mut ledger, 1, date(6));
        tx.append_holdings([Holding {
            portfolio_id: 1,
            ticker: "MSFT".into(),
            weight: 1.5,
            as_of: date(6),
        }]);
        assert!(tx.commit().is_err());
        assert!(!ledger.path().exists());
    }
}
