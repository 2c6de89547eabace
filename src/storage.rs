use crate::error::StoreError;
use crate::model::{
    EmotionRecord, Food, GeoPoint, MetricRow, NotificationRecord, StateCommit, UserId,
};
use crate::ports::{FoodCatalog, NotificationLedger, StateRepository, UserDirectory};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const STORE_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub active: bool,
    pub pet: Option<MetricRow>,
    #[serde(default)]
    pub emotions: Vec<EmotionRecord>,
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
    pub device_token: Option<String>,
    pub location: Option<GeoPoint>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub version: u32,
    pub users: BTreeMap<UserId, UserRecord>,
    pub foods: Vec<Food>,
    pub next_notification_id: u64,
}

impl Database {
    fn fresh() -> Self {
        Self {
            version: STORE_VERSION,
            users: BTreeMap::new(),
            foods: Food::starter_menu(),
            next_notification_id: 1,
        }
    }

    fn user_mut(&mut self, user: UserId) -> &mut UserRecord {
        self.users.entry(user).or_default()
    }
}

/// Reads the document at `path`. A missing file is a fresh store; a file
/// written by a newer build is refused rather than silently downgraded.
fn load_database(path: &Path) -> Result<Database, StoreError> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Database::fresh()),
        Err(e) => return Err(e.into()),
    };
    let db: Database = serde_json::from_str(&s)?;
    if db.version > STORE_VERSION {
        return Err(StoreError::Transient(format!(
            "store version {} is newer than supported version {STORE_VERSION}",
            db.version
        )));
    }
    Ok(db)
}

/// Advisory lock on `<store>.lock`, held for one read or one
/// read-modify-write. The data file itself is replaced by rename, so it
/// cannot carry the lock.
struct StoreLock(File);

impl StoreLock {
    fn acquire(store_path: &Path, exclusive: bool) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(store_path.with_extension("json.lock"))?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(Self(file))
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// Every store port over a single JSON document.
///
/// With a backing file, each call takes the file lock and re-reads the
/// document, so several processes can share one store: revision checks run
/// against what is on disk and no writer clobbers another user's data.
/// Mutations are applied to a copy, written out, then swapped in, so a
/// failed write changes nothing.
pub struct JsonStore {
    path: Option<PathBuf>,
    db: Mutex<Database>,
}

impl JsonStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "creating new store");
        }
        let db = {
            let _lock = StoreLock::acquire(path, false)
                .with_context(|| format!("could not lock {}", path.display()))?;
            load_database(path).with_context(|| format!("could not load {}", path.display()))?
        };
        if db.version != STORE_VERSION {
            bail!("unsupported store version {} in {}", db.version, path.display());
        }
        Ok(Self {
            path: Some(path.to_path_buf()),
            db: Mutex::new(db),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: Mutex::new(Database::fresh()),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Database) -> T) -> Result<T, StoreError> {
        let mut db = self
            .db
            .lock()
            .map_err(|_| StoreError::Transient("store lock poisoned".into()))?;
        if let Some(path) = &self.path {
            let _lock = StoreLock::acquire(path, false)?;
            *db = load_database(path)?;
        }
        Ok(f(&db))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Database) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut db = self
            .db
            .lock()
            .map_err(|_| StoreError::Transient("store lock poisoned".into()))?;
        let _lock = match &self.path {
            Some(path) => Some(StoreLock::acquire(path, true)?),
            None => None,
        };
        let mut next = match &self.path {
            Some(path) => load_database(path)?,
            None => db.clone(),
        };
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            write_json_atomic(path, &next)?;
        }
        *db = next;
        Ok(out)
    }
}

/// Serializes `value` to a sibling temp file, then renames it over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

fn atomic_rename(from: &Path, to: &Path) -> std::io::Result<()> {
    // rename replaces the target atomically on the same filesystem (unix);
    // Windows refuses to rename over an existing file.
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
}

impl StateRepository for JsonStore {
    fn load(&self, user: UserId) -> Result<MetricRow, StoreError> {
        self.read(|db| db.users.get(&user).and_then(|u| u.pet.clone()))?
            .ok_or(StoreError::NotFound(user))
    }

    fn create(
        &self,
        user: UserId,
        row: &MetricRow,
        first_emotion: &EmotionRecord,
    ) -> Result<(), StoreError> {
        self.write(|db| {
            let rec = db.user_mut(user);
            rec.active = true;
            if rec.pet.is_none() {
                rec.pet = Some(row.clone());
                rec.emotions.push(first_emotion.clone());
            }
            Ok(())
        })
    }

    fn commit(
        &self,
        user: UserId,
        commit: &StateCommit,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        self.write(|db| {
            let rec = db.users.get_mut(&user).ok_or(StoreError::NotFound(user))?;
            let pet = rec.pet.as_mut().ok_or(StoreError::NotFound(user))?;
            if pet.revision != expected_revision {
                debug!(user, expected_revision, actual = pet.revision, "stale pet write");
                return Err(StoreError::Conflict(user));
            }
            pet.metrics = commit.metrics.clone();
            pet.last_update = commit.last_update;
            pet.sleep = commit.sleep;
            pet.revision += 1;
            let revision = pet.revision;
            if let Some(emotion) = &commit.emotion {
                rec.emotions.push(emotion.clone());
            }
            Ok(revision)
        })
    }

    fn last_emotion(&self, user: UserId) -> Result<Option<EmotionRecord>, StoreError> {
        self.read(|db| {
            db.users
                .get(&user)
                .and_then(|u| u.emotions.last().cloned())
        })
    }
}

impl FoodCatalog for JsonStore {
    fn lookup(&self, food_id: u32) -> Result<Option<Food>, StoreError> {
        self.read(|db| db.foods.iter().find(|f| f.id == food_id).cloned())
    }

    fn all(&self) -> Result<Vec<Food>, StoreError> {
        self.read(|db| {
            let mut foods = db.foods.clone();
            foods.sort_by(|a, b| a.name.cmp(&b.name));
            foods
        })
    }
}

impl NotificationLedger for JsonStore {
    fn last_fired(&self, user: UserId, kind: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.read(|db| {
            db.users.get(&user).and_then(|u| {
                u.notifications
                    .iter()
                    .filter(|n| n.kind == kind)
                    .map(|n| n.created_at)
                    .max()
            })
        })
    }

    fn record(
        &self,
        user: UserId,
        kind: &str,
        title: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<NotificationRecord, StoreError> {
        self.write(|db| {
            let id = db.next_notification_id;
            db.next_notification_id += 1;
            let rec = NotificationRecord {
                id,
                user,
                kind: kind.to_string(),
                created_at: at,
                title: title.to_string(),
                message: message.to_string(),
                read: false,
            };
            db.user_mut(user).notifications.push(rec.clone());
            Ok(rec)
        })
    }

    fn list_recent(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        self.read(|db| {
            let mut out: Vec<NotificationRecord> = db
                .users
                .get(&user)
                .map(|u| u.notifications.clone())
                .unwrap_or_default();
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            out.truncate(limit);
            out
        })
    }
}

impl UserDirectory for JsonStore {
    fn active_users(&self) -> Result<Vec<UserId>, StoreError> {
        self.read(|db| {
            db.users
                .iter()
                .filter(|(_, u)| u.active)
                .map(|(id, _)| *id)
                .collect()
        })
    }

    fn device_token(&self, user: UserId) -> Result<Option<String>, StoreError> {
        self.read(|db| db.users.get(&user).and_then(|u| u.device_token.clone()))
    }

    fn register_device(&self, user: UserId, token: &str) -> Result<(), StoreError> {
        self.write(|db| {
            db.user_mut(user).device_token = Some(token.to_string());
            Ok(())
        })
    }

    fn last_location(&self, user: UserId) -> Result<Option<GeoPoint>, StoreError> {
        self.read(|db| db.users.get(&user).and_then(|u| u.location))
    }

    fn record_location(&self, user: UserId, point: GeoPoint) -> Result<(), StoreError> {
        self.write(|db| {
            db.user_mut(user).location = Some(point);
            Ok(())
        })
    }
}
