use crate::anomaly::AnomalyRecord;
use crate::device::DeviceInfo;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;

/// How many anomalies a read returns, newest first.
const ANOMALY_READ_LIMIT: u32 = 100;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS devices (
    mac TEXT PRIMARY KEY,
    ip TEXT,
    hostname TEXT,
    vendor TEXT,
    first_seen INT,
    last_seen INT,
    os_guess TEXT
);
CREATE TABLE IF NOT EXISTS anomalies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts INT,
    type TEXT,
    desc TEXT
);
";

/// SQLite store for the device inventory and the anomaly log.
///
/// `rusqlite::Connection` is not `Sync`, so it sits behind a mutex; every
/// operation is a single short statement.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or refresh a device row. `first_seen` survives updates.
    pub fn upsert_device(&self, device: &DeviceInfo) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO devices (mac, ip, hostname, vendor, first_seen, last_seen, os_guess)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(mac) DO UPDATE SET
               ip=excluded.ip,
               hostname=excluded.hostname,
               vendor=excluded.vendor,
               last_seen=excluded.last_seen,
               os_guess=excluded.os_guess",
            params![
                device.mac,
                device.ip,
                device.hostname,
                device.vendor,
                device.first_seen,
                device.last_seen,
                device.os_guess
            ],
        )
        .context("Failed to upsert device")?;
        Ok(())
    }

    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT mac, ip, hostname, vendor, first_seen, last_seen, os_guess
                 FROM devices ORDER BY mac",
            )
            .context("Failed to prepare device query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DeviceInfo {
                    mac: row.get(0)?,
                    ip: row.get(1)?,
                    hostname: row.get(2)?,
                    vendor: row.get(3)?,
                    first_seen: row.get(4)?,
                    last_seen: row.get(5)?,
                    os_guess: row.get(6)?,
                })
            })
            .context("Failed to query devices")?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read device rows")
    }

    pub fn add_anomaly(&self, anomaly: &AnomalyRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO anomalies (ts, type, desc) VALUES (?1, ?2, ?3)",
            params![anomaly.ts, anomaly.kind, anomaly.desc],
        )
        .context("Failed to insert anomaly")?;
        Ok(())
    }

    /// The most recent anomalies, newest first.
    pub fn anomalies(&self) -> Result<Vec<AnomalyRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, ts, type, desc FROM anomalies ORDER BY ts DESC LIMIT ?1")
            .context("Failed to prepare anomaly query")?;
        let rows = stmt
            .query_map([ANOMALY_READ_LIMIT], |row| {
                Ok(AnomalyRecord {
                    id: Some(row.get(0)?),
                    ts: row.get(1)?,
                    kind: row.get(2)?,
                    desc: row.get(3)?,
                })
            })
            .context("Failed to query anomalies")?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read anomaly rows")
    }
}
