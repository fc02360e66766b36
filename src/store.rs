use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::Result;
use crate::normalize::NormalizedRecord;

/// Records per write batch; duplicates of an `id` inside one batch collapse
/// to the last one.
pub const BATCH_SIZE: usize = 25;

/// Initial provisioned throughput for a new dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub read: u32,
    pub write: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Read,
    Write,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Read => "read",
            Dimension::Write => "write",
        }
    }
}

/// Target-tracking autoscaling registered per dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingPolicy {
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub target_utilization: f64,
    pub scale_in_cooldown: Duration,
    pub scale_out_cooldown: Duration,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        ScalingPolicy {
            min_capacity: 1,
            max_capacity: 100,
            target_utilization: 70.0,
            scale_in_cooldown: Duration::from_secs(60),
            scale_out_cooldown: Duration::from_secs(60),
        }
    }
}

pub struct DatasetInfo {
    pub name: String,
    pub created_at: String,
    pub capacity: Capacity,
    pub records: usize,
}

/// Keyed dataset store: one dataset per name, primary key (id, list_number).
pub trait Store {
    fn list_datasets(&self) -> Result<Vec<String>>;

    /// Creates the dataset if absent. Returns whether it was created by this
    /// call; callers poll `is_ready` before writing.
    fn ensure_dataset(&self, name: &str, capacity: Capacity) -> Result<bool>;

    fn is_ready(&self, name: &str) -> Result<bool>;

    /// Removes a dataset with its catalog and scaling entries.
    fn drop_dataset(&self, name: &str) -> Result<()>;

    fn register_scaling(&self, name: &str, dimension: Dimension, policy: &ScalingPolicy)
        -> Result<()>;

    /// Batched overwrite-by-key write. Returns the number of rows written.
    fn upsert(&self, name: &str, records: &[NormalizedRecord]) -> Result<usize>;

    fn dataset_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_datasets()?.iter().any(|d| d == name))
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS _datasets (
                name           TEXT PRIMARY KEY,
                read_capacity  INTEGER NOT NULL,
                write_capacity INTEGER NOT NULL,
                created_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS _scaling_policies (
                dataset            TEXT NOT NULL REFERENCES _datasets(name),
                dimension          TEXT NOT NULL CHECK(dimension IN ('read','write')),
                min_capacity       INTEGER NOT NULL,
                max_capacity       INTEGER NOT NULL,
                target_utilization REAL NOT NULL,
                scale_in_cooldown  INTEGER NOT NULL,
                scale_out_cooldown INTEGER NOT NULL,
                PRIMARY KEY (dataset, dimension)
            );
            ",
        )?;
        Ok(SqliteStore { conn })
    }

    pub fn datasets(&self) -> Result<Vec<DatasetInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, created_at, read_capacity, write_capacity
             FROM _datasets ORDER BY created_at, name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DatasetInfo {
                    name: row.get(0)?,
                    created_at: row.get(1)?,
                    capacity: Capacity {
                        read: row.get(2)?,
                        write: row.get(3)?,
                    },
                    records: 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|mut info| {
                info.records = self.count(&info.name)?;
                Ok(info)
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
        let n: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn records(&self, name: &str) -> Result<Vec<NormalizedRecord>> {
        let sql = format!(
            "SELECT id, list_number, type, can_extend, name, starts_at,
                    \"0_year_old\", \"1_year_old\", \"2_years_old\",
                    \"3_years_old\", \"4_years_old\", \"5_years_old\",
                    emergency, address, phone
             FROM {} ORDER BY list_number, id",
            quote_ident(name)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(NormalizedRecord {
                    id: row.get(0)?,
                    list_number: row.get(1)?,
                    kind: row.get(2)?,
                    can_extend: row.get(3)?,
                    name: row.get(4)?,
                    starts_at: row.get(5)?,
                    age0: row.get(6)?,
                    age1: row.get(7)?,
                    age2: row.get(8)?,
                    age3: row.get(9)?,
                    age4: row.get(10)?,
                    age5: row.get(11)?,
                    emergency: row.get(12)?,
                    address: row.get(13)?,
                    phone: row.get(14)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn scaling_policy(&self, name: &str, dimension: Dimension) -> Result<Option<ScalingPolicy>> {
        let policy = self
            .conn
            .query_row(
                "SELECT min_capacity, max_capacity, target_utilization,
                        scale_in_cooldown, scale_out_cooldown
                 FROM _scaling_policies WHERE dataset = ?1 AND dimension = ?2",
                params![name, dimension.as_str()],
                |row| {
                    Ok(ScalingPolicy {
                        min_capacity: row.get(0)?,
                        max_capacity: row.get(1)?,
                        target_utilization: row.get(2)?,
                        scale_in_cooldown: Duration::from_secs(row.get::<_, i64>(3)? as u64),
                        scale_out_cooldown: Duration::from_secs(row.get::<_, i64>(4)? as u64),
                    })
                },
            )
            .optional()?;
        Ok(policy)
    }
}

impl Store for SqliteStore {
    fn list_datasets(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM _datasets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn ensure_dataset(&self, name: &str, capacity: Capacity) -> Result<bool> {
        if self.dataset_exists(name)? {
            debug!("Dataset {} already exists", name);
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id            TEXT NOT NULL,
                list_number   INTEGER NOT NULL,
                type          TEXT NOT NULL,
                can_extend    BOOLEAN NOT NULL,
                name          TEXT NOT NULL,
                starts_at     TEXT NOT NULL,
                \"0_year_old\"  INTEGER,
                \"1_year_old\"  INTEGER,
                \"2_years_old\" INTEGER,
                \"3_years_old\" INTEGER,
                \"4_years_old\" INTEGER,
                \"5_years_old\" INTEGER,
                emergency     BOOLEAN NOT NULL,
                address       TEXT NOT NULL,
                phone         TEXT NOT NULL,
                PRIMARY KEY (id, list_number)
            );",
            quote_ident(name)
        ))?;
        tx.execute(
            "INSERT INTO _datasets (name, read_capacity, write_capacity, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, capacity.read, capacity.write, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        info!(dataset = %name, read = capacity.read, write = capacity.write, "Created dataset");
        Ok(true)
    }

    fn is_ready(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn drop_dataset(&self, name: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM _scaling_policies WHERE dataset = ?1", [name])?;
        tx.execute("DELETE FROM _datasets WHERE name = ?1", [name])?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(name)))?;
        tx.commit()?;
        info!(dataset = %name, "Dropped dataset");
        Ok(())
    }

    fn register_scaling(
        &self,
        name: &str,
        dimension: Dimension,
        policy: &ScalingPolicy,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO _scaling_policies
             (dataset, dimension, min_capacity, max_capacity, target_utilization,
              scale_in_cooldown, scale_out_cooldown)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                name,
                dimension.as_str(),
                policy.min_capacity,
                policy.max_capacity,
                policy.target_utilization,
                policy.scale_in_cooldown.as_secs() as i64,
                policy.scale_out_cooldown.as_secs() as i64,
            ],
        )?;
        debug!(dataset = %name, dimension = dimension.as_str(), "Registered autoscaling");
        Ok(())
    }

    fn upsert(&self, name: &str, records: &[NormalizedRecord]) -> Result<usize> {
        let batches = records.len().div_ceil(BATCH_SIZE);
        let pb = ProgressBar::new(batches as u64);
        pb.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} batches")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let tx = self.conn.unchecked_transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {}
                 (id, list_number, type, can_extend, name, starts_at,
                  \"0_year_old\", \"1_year_old\", \"2_years_old\",
                  \"3_years_old\", \"4_years_old\", \"5_years_old\",
                  emergency, address, phone)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                quote_ident(name)
            ))?;
            for chunk in records.chunks(BATCH_SIZE) {
                for r in last_per_id(chunk) {
                    written += stmt.execute(params![
                        r.id, r.list_number, r.kind, r.can_extend, r.name, r.starts_at,
                        r.age0, r.age1, r.age2, r.age3, r.age4, r.age5,
                        r.emergency, r.address, r.phone,
                    ])?;
                }
                pb.inc(1);
            }
        }
        tx.commit()?;
        pb.finish_and_clear();

        info!(dataset = %name, written, "Upserted records");
        Ok(written)
    }
}

/// Keeps the last record for each id, in first-seen order.
fn last_per_id(batch: &[NormalizedRecord]) -> Vec<&NormalizedRecord> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<&NormalizedRecord> = Vec::with_capacity(batch.len());
    for r in batch {
        match slot.get(r.id.as_str()) {
            Some(&i) => out[i] = r,
            None => {
                slot.insert(&r.id, out.len());
                out.push(r);
            }
        }
    }
    out
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
