//! Durable balance ledger.
//!
//! Every mutation is appended to `wal.jsonl` and fsynced before it is applied to the
//! in-memory [`LedgerState`], so anything a caller has observed is already on disk.
//! A periodic compaction writes the whole state to `state.json` (via a temp file and
//! an atomic rename) and then truncates the log.
//!
//! Startup loads the snapshot and replays the log on top of it. Records at or below the
//! snapshot's `last_seq` are skipped, so a crash between the rename and the truncation
//! does not double-apply anything. Malformed lines are logged and skipped.
//!
//! One async mutex guards the log writer. It is held across append + apply and during
//! compaction, which makes this process the single writer.
//!
//! A sequence number is spent by every append attempt. If an append fails after bytes may
//! have reached the file, the log is cut back to its previous length; until that succeeds
//! no further appends are accepted, so a rejected record can never replay.

use crash_execution::LedgerState;
use crash_types::{BalanceKey, ChannelKey, LedgerEvent, LogRecord};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

const SNAPSHOT_FILE: &str = "state.json";
const SNAPSHOT_TMP_FILE: &str = "state.json.tmp";
const WAL_FILE: &str = "wal.jsonl";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger {op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_err(op: &'static str) -> impl FnOnce(std::io::Error) -> LedgerError {
    move |source| LedgerError::Io { op, source }
}

/// On-disk locations used by a ledger.
#[derive(Clone, Debug)]
pub struct LedgerPaths {
    pub dir: PathBuf,
    pub snapshot: PathBuf,
    pub snapshot_tmp: PathBuf,
    pub wal: PathBuf,
}

impl LedgerPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            snapshot: dir.join(SNAPSHOT_FILE),
            snapshot_tmp: dir.join(SNAPSHOT_TMP_FILE),
            wal: dir.join(WAL_FILE),
        }
    }
}

struct LogWriter {
    file: File,
    len: u64,
    next_seq: u64,
    // The file ends in a torn line left by an earlier process.
    needs_newline: bool,
    // Length the file must be cut back to before the next append.
    rollback_to: Option<u64>,
}

impl LogWriter {
    /// Undo a failed append. Errors leave the rollback pending.
    async fn repair(&mut self) -> Result<(), LedgerError> {
        let Some(len) = self.rollback_to else {
            return Ok(());
        };
        self.file.set_len(len).await.map_err(io_err("roll back log"))?;
        self.file.sync_data().await.map_err(io_err("sync log"))?;
        self.len = len;
        self.rollback_to = None;
        Ok(())
    }
}

/// Counts reported after recovery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub snapshot_loaded: bool,
    pub replayed: usize,
    pub already_in_snapshot: usize,
    pub malformed: usize,
}

pub struct Ledger {
    paths: LedgerPaths,
    writer: Mutex<LogWriter>,
    state: RwLock<LedgerState>,
    recovery: RecoveryStats,
    #[cfg(test)]
    fail_appends: std::sync::atomic::AtomicBool,
    #[cfg(test)]
    fail_syncs: std::sync::atomic::AtomicBool,
}

impl Ledger {
    /// Open (or create) the ledger stored in `dir` and recover its state.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await.map_err(io_err("create data dir"))?;
        let paths = LedgerPaths::in_dir(dir);

        let mut recovery = RecoveryStats::default();
        let mut state = load_snapshot(&paths.snapshot, &mut recovery).await?;
        let (max_seq, partial_tail) = replay_log(&paths.wal, &mut state, &mut recovery).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&paths.wal)
            .await
            .map_err(io_err("open log"))?;
        let len = file.metadata().await.map_err(io_err("stat log"))?.len();
        let next_seq = state.last_seq.max(max_seq) + 1;

        info!(
            balances = state.users.len(),
            snapshot = recovery.snapshot_loaded,
            replayed = recovery.replayed,
            skipped = recovery.already_in_snapshot,
            malformed = recovery.malformed,
            next_seq,
            "ledger recovered"
        );

        Ok(Self {
            paths,
            writer: Mutex::new(LogWriter {
                file,
                len,
                next_seq,
                needs_newline: partial_tail,
                rollback_to: None,
            }),
            state: RwLock::new(state),
            recovery,
            #[cfg(test)]
            fail_appends: std::sync::atomic::AtomicBool::new(false),
            #[cfg(test)]
            fail_syncs: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn paths(&self) -> &LedgerPaths {
        &self.paths
    }

    pub fn recovery(&self) -> RecoveryStats {
        self.recovery
    }

    /// Initialize `key` with `start` if it has never been referenced. Returns the balance.
    pub async fn ensure_balance(&self, key: &BalanceKey, start: u64) -> Result<u64, LedgerError> {
        let mut writer = self.writer.lock().await;
        if let Some(balance) = self.read(|state| state.contains(key).then(|| state.balance(key))) {
            return Ok(balance);
        }
        self.append(
            &mut writer,
            LedgerEvent::Set {
                k: key.clone(),
                balance: start,
            },
        )
        .await?;
        Ok(self.balance(key))
    }

    /// Cached balance; zero for unknown keys.
    pub fn balance(&self, key: &BalanceKey) -> u64 {
        self.read(|state| state.balance(key))
    }

    /// Recent crash multipliers for `channel`, most recent first.
    pub fn recent(&self, channel: &ChannelKey) -> Vec<f64> {
        self.read(|state| state.recent(channel))
    }

    /// Overwrite a balance. Negative values are stored as zero.
    pub async fn set_balance(&self, key: &BalanceKey, value: i64) -> Result<(), LedgerError> {
        let balance = value.max(0).unsigned_abs();
        self.mutate(LedgerEvent::Set {
            k: key.clone(),
            balance,
        })
        .await
    }

    pub async fn debit(&self, key: &BalanceKey, amount: u64) -> Result<(), LedgerError> {
        self.mutate(LedgerEvent::Debit {
            k: key.clone(),
            amount,
        })
        .await
    }

    pub async fn credit(&self, key: &BalanceKey, amount: u64) -> Result<(), LedgerError> {
        self.mutate(LedgerEvent::Credit {
            k: key.clone(),
            amount,
        })
        .await
    }

    pub async fn push_recent(&self, channel: &ChannelKey, multiplier: f64) -> Result<(), LedgerError> {
        self.mutate(LedgerEvent::RecentPush {
            kc: channel.clone(),
            mult: multiplier,
        })
        .await
    }

    /// Write a full snapshot and truncate the log.
    pub async fn snapshot(&self) -> Result<(), LedgerError> {
        let mut writer = self.writer.lock().await;
        let state = self.read(LedgerState::clone);
        let bytes = serde_json::to_vec(&state)?;

        let mut tmp = File::create(&self.paths.snapshot_tmp)
            .await
            .map_err(io_err("create snapshot"))?;
        tmp.write_all(&bytes).await.map_err(io_err("write snapshot"))?;
        tmp.sync_all().await.map_err(io_err("sync snapshot"))?;
        drop(tmp);
        fs::rename(&self.paths.snapshot_tmp, &self.paths.snapshot)
            .await
            .map_err(io_err("rename snapshot"))?;
        sync_dir(&self.paths.dir).await?;

        // The snapshot is durable; everything in the log up to `last_seq` is redundant.
        writer.file.set_len(0).await.map_err(io_err("truncate log"))?;
        writer.file.sync_all().await.map_err(io_err("sync log"))?;
        writer.len = 0;
        writer.needs_newline = false;
        writer.rollback_to = None;

        debug!(last_seq = state.last_seq, balances = state.users.len(), "ledger snapshot written");
        Ok(())
    }

    /// Snapshot every `period` until the returned task is aborted.
    pub fn spawn_compactor(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = ledger.snapshot().await {
                    warn!(?err, "ledger snapshot failed");
                }
            }
        })
    }

    async fn mutate(&self, event: LedgerEvent) -> Result<(), LedgerError> {
        let mut writer = self.writer.lock().await;
        self.append(&mut writer, event).await
    }

    /// Durably append `event`, then apply it. The caller holds the writer lock.
    async fn append(&self, writer: &mut LogWriter, event: LedgerEvent) -> Result<(), LedgerError> {
        writer.repair().await?;
        #[cfg(test)]
        if self.fail_appends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LedgerError::Io {
                op: "append",
                source: std::io::Error::other("injected failure"),
            });
        }
        let record = LogRecord {
            seq: writer.next_seq,
            event,
        };
        writer.next_seq += 1;
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        if writer.needs_newline {
            line.insert(0, '\n');
        }

        let start = writer.len;
        let written = async {
            writer
                .file
                .write_all(line.as_bytes())
                .await
                .map_err(io_err("append"))?;
            writer.file.flush().await.map_err(io_err("flush"))?;
            #[cfg(test)]
            if self.fail_syncs.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(LedgerError::Io {
                    op: "sync",
                    source: std::io::Error::other("injected sync failure"),
                });
            }
            writer.file.sync_data().await.map_err(io_err("sync"))
        }
        .await;
        if let Err(err) = written {
            writer.rollback_to = Some(start);
            if let Err(rollback) = writer.repair().await {
                warn!(?rollback, seq = record.seq, "log rollback failed, appends blocked until it succeeds");
            }
            return Err(err);
        }
        writer.len = start + line.len() as u64;
        writer.needs_newline = false;

        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_record(&record);
        Ok(())
    }

    /// Make every following append fail until reset.
    #[cfg(test)]
    pub(crate) fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make the sync after each write fail, leaving written bytes behind.
    #[cfg(test)]
    pub(crate) fn fail_syncs(&self, fail: bool) {
        self.fail_syncs.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), LedgerError> {
    File::open(dir)
        .await
        .map_err(io_err("open data dir"))?
        .sync_all()
        .await
        .map_err(io_err("sync data dir"))
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), LedgerError> {
    Ok(())
}

async fn read_if_exists(path: &Path, op: &'static str) -> Result<Option<Vec<u8>>, LedgerError> {
    match fs::read(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(op)(err)),
    }
}

async fn load_snapshot(path: &Path, recovery: &mut RecoveryStats) -> Result<LedgerState, LedgerError> {
    let Some(raw) = read_if_exists(path, "read snapshot").await? else {
        return Ok(LedgerState::new());
    };
    match serde_json::from_slice::<LedgerState>(&raw) {
        Ok(state) => {
            recovery.snapshot_loaded = true;
            Ok(state)
        }
        Err(err) => {
            warn!(?err, path = %path.display(), "ignoring malformed ledger snapshot");
            Ok(LedgerState::new())
        }
    }
}

/// Replay the log onto `state`.
///
/// Lines are parsed as raw bytes so a torn multi-byte character only costs its own line.
/// Returns the highest sequence number seen and whether the file ends mid-line.
async fn replay_log(
    path: &Path,
    state: &mut LedgerState,
    recovery: &mut RecoveryStats,
) -> Result<(u64, bool), LedgerError> {
    let Some(raw) = read_if_exists(path, "read log").await? else {
        return Ok((0, false));
    };

    let mut max_seq = 0;
    for (index, line) in raw.split(|byte| *byte == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let record = match serde_json::from_slice::<LogRecord>(line) {
            Ok(record) => record,
            Err(err) => {
                recovery.malformed += 1;
                warn!(?err, line = index + 1, "skipping malformed ledger log line");
                continue;
            }
        };
        max_seq = max_seq.max(record.seq);
        if state.apply_record(&record) {
            recovery.replayed += 1;
        } else {
            recovery.already_in_snapshot += 1;
        }
    }
    let partial_tail = raw.last().is_some_and(|byte| *byte != b'\n');
    Ok((max_seq, partial_tail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(user: &str) -> BalanceKey {
        ChannelKey::new("g", "c").user(user)
    }

    #[tokio::test]
    async fn test_fresh_ledger_reads_zero() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 0);
        assert!(ledger.recent(&ChannelKey::new("g", "c")).is_empty());
        assert!(!ledger.recovery().snapshot_loaded);
    }

    #[tokio::test]
    async fn test_ensure_balance_is_idempotent() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.ensure_balance(&key("u"), 1_000).await.unwrap(), 1_000);
        ledger.debit(&key("u"), 100).await.unwrap();
        assert_eq!(ledger.ensure_balance(&key("u"), 1_000).await.unwrap(), 900);

        // Only one `set` reached the log.
        let log = std::fs::read_to_string(&ledger.paths().wal).unwrap();
        assert_eq!(log.matches("\"type\":\"set\"").count(), 1);
    }

    #[tokio::test]
    async fn test_mutations_and_clamping() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        ledger.set_balance(&key("u"), 50).await.unwrap();
        ledger.debit(&key("u"), 80).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 0);
        ledger.credit(&key("u"), 30).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 30);
        ledger.set_balance(&key("u"), -5).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 0);
    }

    #[tokio::test]
    async fn test_restart_replays_log() {
        let dir = tempdir().unwrap();
        {
            let ledger = Ledger::open(dir.path()).await.unwrap();
            ledger.ensure_balance(&key("a"), 1_000).await.unwrap();
            ledger.debit(&key("a"), 200).await.unwrap();
            ledger.credit(&key("a"), 500).await.unwrap();
            ledger.push_recent(&ChannelKey::new("g", "c"), 2.5).await.unwrap();
        }
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("a")), 1_300);
        assert_eq!(ledger.recent(&ChannelKey::new("g", "c")), vec![2.5]);
        assert_eq!(ledger.recovery().replayed, 4);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_with_cleared_log() {
        let dir = tempdir().unwrap();
        let before = {
            let ledger = Ledger::open(dir.path()).await.unwrap();
            for (user, start) in [("a", 100), ("b", 250), ("c", 7)] {
                ledger.ensure_balance(&key(user), start).await.unwrap();
            }
            ledger.debit(&key("b"), 50).await.unwrap();
            ledger.credit(&key("c"), 3).await.unwrap();
            ledger.snapshot().await.unwrap();
            assert_eq!(std::fs::read_to_string(&ledger.paths().wal).unwrap(), "");
            ledger.read(LedgerState::clone)
        };

        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert!(ledger.recovery().snapshot_loaded);
        assert_eq!(ledger.recovery().replayed, 0);
        assert_eq!(ledger.read(LedgerState::clone), before);
        assert_eq!(ledger.balance(&key("b")), 200);
        assert_eq!(ledger.balance(&key("c")), 10);
    }

    #[tokio::test]
    async fn test_crash_before_truncate_does_not_double_apply() {
        let dir = tempdir().unwrap();
        let paths = LedgerPaths::in_dir(dir.path());
        {
            let ledger = Ledger::open(dir.path()).await.unwrap();
            ledger.ensure_balance(&key("u"), 1_000).await.unwrap();
            ledger.debit(&key("u"), 400).await.unwrap();
            ledger.credit(&key("u"), 100).await.unwrap();
        }
        // Simulate: the snapshot was renamed into place but the log never got truncated.
        let log = std::fs::read_to_string(&paths.wal).unwrap();
        {
            let ledger = Ledger::open(dir.path()).await.unwrap();
            ledger.snapshot().await.unwrap();
        }
        std::fs::write(&paths.wal, &log).unwrap();

        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 700);
        assert_eq!(ledger.recovery().already_in_snapshot, 3);
        assert_eq!(ledger.recovery().replayed, 0);

        // New appends continue after the highest sequence on disk.
        ledger.debit(&key("u"), 1).await.unwrap();
        drop(ledger);
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 699);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let paths = LedgerPaths::in_dir(dir.path());
        let good_a = serde_json::to_string(&LogRecord {
            seq: 1,
            event: LedgerEvent::Set { k: key("u"), balance: 10 },
        })
        .unwrap();
        let good_b = serde_json::to_string(&LogRecord {
            seq: 2,
            event: LedgerEvent::Credit { k: key("u"), amount: 5 },
        })
        .unwrap();
        let contents = format!("{good_a}\nnot json\n{{\"seq\":9,\"type\":\"mystery\"}}\n\n{good_b}\n{{\"seq\":3,\"ty");
        std::fs::write(&paths.wal, contents).unwrap();
        std::fs::write(&paths.snapshot, "{ definitely not a snapshot").unwrap();

        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 15);
        assert_eq!(ledger.recovery().malformed, 3);
        assert!(!ledger.recovery().snapshot_loaded);

        // The partial trailing line does not swallow the next record.
        ledger.credit(&key("u"), 1).await.unwrap();
        drop(ledger);
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 16);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).await.unwrap());
        ledger.ensure_balance(&key("u"), 0).await.unwrap();
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.credit(&key("u"), 5).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(ledger.balance(&key("u")), 100);
        drop(ledger);
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 100);
    }

    #[tokio::test]
    async fn test_compactor_truncates_log() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).await.unwrap());
        ledger.ensure_balance(&key("u"), 42).await.unwrap();
        let handle = ledger.spawn_compactor(Duration::from_millis(20));
        for _ in 0..100 {
            if ledger.paths().snapshot.exists() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(ledger.paths().snapshot.exists());
        drop(ledger);
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert!(ledger.recovery().snapshot_loaded);
        assert_eq!(ledger.balance(&key("u")), 42);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let paths = LedgerPaths::in_dir(dir.path());
        let good = serde_json::to_string(&LogRecord {
            seq: 1,
            event: LedgerEvent::Set { k: key("u"), balance: 10 },
        })
        .unwrap();
        // A write torn inside a multi-byte user id.
        let mut log = format!("{good}\n").into_bytes();
        log.extend_from_slice(b"{\"seq\":2,\"type\":\"credit\",\"k\":\"g:c:\xe2\x82");
        std::fs::write(&paths.wal, log).unwrap();
        std::fs::write(&paths.snapshot, b"{\"last_seq\":0,\xff}").unwrap();

        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert!(!ledger.recovery().snapshot_loaded);
        assert_eq!(ledger.recovery().replayed, 1);
        assert_eq!(ledger.recovery().malformed, 1);
        assert_eq!(ledger.balance(&key("u")), 10);

        ledger.credit(&key("u"), 5).await.unwrap();
        drop(ledger);
        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 15);
    }

    #[tokio::test]
    async fn test_failed_sync_rolls_back_record() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        ledger.set_balance(&key("u"), 100).await.unwrap();
        let log_before = std::fs::read(&ledger.paths().wal).unwrap();

        ledger.fail_syncs(true);
        assert!(ledger.debit(&key("u"), 30).await.is_err());
        assert_eq!(ledger.balance(&key("u")), 100);
        assert_eq!(std::fs::read(&ledger.paths().wal).unwrap(), log_before);

        ledger.fail_syncs(false);
        ledger.credit(&key("u"), 500).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 600);
        drop(ledger);

        let ledger = Ledger::open(dir.path()).await.unwrap();
        assert_eq!(ledger.balance(&key("u")), 600);
        assert_eq!(ledger.recovery().replayed, 2);
        assert_eq!(ledger.recovery().malformed, 0);
    }

    #[tokio::test]
    async fn test_failed_appends_spend_sequence_numbers() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).await.unwrap();
        ledger.set_balance(&key("u"), 100).await.unwrap();
        ledger.fail_syncs(true);
        assert!(ledger.debit(&key("u"), 30).await.is_err());
        ledger.fail_syncs(false);
        ledger.credit(&key("u"), 1).await.unwrap();

        let log = std::fs::read_to_string(&ledger.paths().wal).unwrap();
        let seqs: Vec<u64> = log
            .lines()
            .map(|line| serde_json::from_str::<LogRecord>(line).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_dir_reports_missing_dir() {
        let dir = tempdir().unwrap();
        sync_dir(dir.path()).await.unwrap();
        let err = sync_dir(&dir.path().join("gone")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Io { op: "open data dir", .. }), "{err}");
    }
}
