use crate::domain::ports::PendingStore;
use crate::domain::registration::PendingRegistration;
use crate::error::{RegistrationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for pending registrations keyed by order id.
pub const CF_PENDING: &str = "pending_registrations";

/// A persistent pending store using RocksDB.
///
/// Pending registrations survive a restart between payment initiation and the
/// gateway callback. Writes go through a single async lock so that `take` is
/// a true read-and-delete.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBPendingStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBPendingStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the pending registrations column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_pending = ColumnFamilyDescriptor::new(CF_PENDING, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_pending])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn read(&self, order_id: &str) -> Result<Option<PendingRegistration>> {
        let cf = self.db.cf_handle(CF_PENDING).ok_or_else(missing_cf)?;

        match self.db.get_cf(&cf, order_id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, order_id: &str) -> Result<()> {
        let cf = self.db.cf_handle(CF_PENDING).ok_or_else(missing_cf)?;
        self.db.delete_cf(&cf, order_id.as_bytes())?;
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<PendingRegistration> {
    serde_json::from_slice(bytes).map_err(|e| {
        RegistrationError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

fn missing_cf() -> RegistrationError {
    RegistrationError::InternalError(Box::new(std::io::Error::other(
        "Pending registrations column family not found",
    )))
}

#[async_trait]
impl PendingStore for RocksDBPendingStore {
    async fn put(&self, registration: PendingRegistration) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.db.cf_handle(CF_PENDING).ok_or_else(missing_cf)?;

        let value = serde_json::to_vec(&registration).map_err(|e| {
            RegistrationError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;

        self.db
            .put_cf(&cf, registration.order_id.as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Option<PendingRegistration>> {
        self.read(order_id)
    }

    async fn delete(&self, order_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.remove(order_id)
    }

    async fn take(&self, order_id: &str) -> Result<Option<PendingRegistration>> {
        let _guard = self.write_lock.lock().await;
        let registration = self.read(order_id)?;
        if registration.is_some() {
            self.remove(order_id)?;
        }
        Ok(registration)
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let cf = self.db.cf_handle(CF_PENDING).ok_or_else(missing_cf)?;

        let mut stale = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            if decode(&value)?.created_at < cutoff {
                stale.push(key);
            }
        }
        for key in &stale {
            self.db.delete_cf(&cf, key)?;
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registration::{Amount, Applicant, Identifiers};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn pending() -> PendingRegistration {
        PendingRegistration::new(
            "summit",
            Applicant {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
                phone: "9999999999".to_string(),
                package: "gold".to_string(),
                address: Some("Pune".to_string()),
                amount: Amount::new(dec!(1499.00)).unwrap(),
            },
            Identifiers::from_parts("T", 1, 1),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBPendingStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_PENDING).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_pending_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBPendingStore::open(dir.path()).unwrap();
        let registration = pending();

        store.put(registration.clone()).await.unwrap();
        assert_eq!(store.get("ORDER_1_0001").await.unwrap(), Some(registration.clone()));

        assert_eq!(store.take("ORDER_1_0001").await.unwrap(), Some(registration));
        assert!(store.take("ORDER_1_0001").await.unwrap().is_none());
        assert!(store.get("ORDER_1_0001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBPendingStore::open(dir.path()).unwrap();
            store.put(pending()).await.unwrap();
        }

        let reopened = RocksDBPendingStore::open(dir.path()).unwrap();
        let registration = reopened.get("ORDER_1_0001").await.unwrap().unwrap();
        assert_eq!(registration.address.as_deref(), Some("Pune"));
    }

    #[tokio::test]
    async fn test_rocksdb_purge_created_before() {
        let dir = tempdir().unwrap();
        let store = RocksDBPendingStore::open(dir.path()).unwrap();
        let mut stale = pending();
        stale.order_id = "ORDER_STALE".to_string();
        stale.created_at = Utc::now() - chrono::Duration::days(2);
        store.put(stale).await.unwrap();
        store.put(pending()).await.unwrap();

        let purged = store
            .purge_created_before(Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get("ORDER_STALE").await.unwrap().is_none());
        assert!(store.get("ORDER_1_0001").await.unwrap().is_some());
    }
}
