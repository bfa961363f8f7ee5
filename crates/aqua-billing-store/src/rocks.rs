//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//!
//! `RocksDB` has no native read-modify-write, so every compound operation
//! that touches meter counters serializes through striped mutexes (hash of
//! the meter id picks the stripe) and commits through a single `WriteBatch`.
//! Multi-meter settlements acquire their stripes in sorted order, so two
//! overlapping settlements cannot deadlock.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use aqua_billing_core::{
    Bill, BillId, BillPeriod, ConnectionRequest, ConnectionRequestId, CustomerProfile, Meter,
    MeterId, NotificationRecord, PaymentSession, TariffId, TariffTier, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// Number of meter lock stripes. Contention is per-stripe, so this bounds
/// how many unrelated meters can block each other.
const METER_LOCK_STRIPES: u64 = 64;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    meter_locks: Vec<Mutex<()>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let meter_locks = (0..METER_LOCK_STRIPES).map(|_| Mutex::new(())).collect();

        Ok(Self {
            db: Arc::new(db),
            meter_locks,
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Lock stripe for a meter.
    #[allow(clippy::cast_possible_truncation)]
    fn stripe_index(meter_id: &MeterId) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        meter_id.hash(&mut hasher);
        (hasher.finish() % METER_LOCK_STRIPES) as usize
    }

    /// Acquire the lock stripe guarding one meter's counters.
    fn meter_lock(&self, meter_id: &MeterId) -> Result<MutexGuard<'_, ()>> {
        self.meter_locks[Self::stripe_index(meter_id)]
            .lock()
            .map_err(|_| StoreError::Database("meter lock poisoned".to_string()))
    }

    /// Acquire the lock stripes for a set of meters in sorted order.
    fn lock_meters(&self, meter_ids: &[MeterId]) -> Result<Vec<MutexGuard<'_, ()>>> {
        let mut stripes: Vec<usize> = meter_ids.iter().map(Self::stripe_index).collect();
        stripes.sort_unstable();
        stripes.dedup();
        stripes
            .into_iter()
            .map(|stripe| {
                self.meter_locks[stripe]
                    .lock()
                    .map_err(|_| StoreError::Database("meter lock poisoned".to_string()))
            })
            .collect()
    }

    /// Overwrite a meter record without touching its owner index. Callers
    /// hold the meter's lock stripe.
    fn write_meter(&self, meter: &Meter) -> Result<()> {
        let cf = self.cf(cf::METERS)?;
        self.db
            .put_cf(&cf, keys::meter_key(&meter.id), Self::serialize(meter)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Load a meter or fail with `NotFound`.
    fn require_meter(&self, meter_id: &MeterId) -> Result<Meter> {
        self.get_meter(meter_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "meter",
            id: meter_id.to_string(),
        })
    }

    /// Deserialize every record in a column family.
    fn scan_all<T: serde::de::DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            records.push(Self::deserialize(&value)?);
        }
        Ok(records)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Tariff Operations
    // =========================================================================

    fn put_tariff(&self, tier: &TariffTier) -> Result<()> {
        let cf = self.cf(cf::TARIFFS)?;
        self.db
            .put_cf(&cf, keys::tariff_key(&tier.id), Self::serialize(tier)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_tariff(&self, tariff_id: &TariffId) -> Result<Option<TariffTier>> {
        let cf = self.cf(cf::TARIFFS)?;
        self.db
            .get_cf(&cf, keys::tariff_key(tariff_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_tariffs(&self) -> Result<Vec<TariffTier>> {
        self.scan_all(cf::TARIFFS)
    }

    // =========================================================================
    // Customer Operations
    // =========================================================================

    fn put_customer(&self, profile: &CustomerProfile) -> Result<()> {
        let cf = self.cf(cf::CUSTOMERS)?;
        let key = keys::customer_key(&profile.user_id);
        let value = Self::serialize(profile)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_customer(&self, user_id: &UserId) -> Result<Option<CustomerProfile>> {
        let cf = self.cf(cf::CUSTOMERS)?;
        self.db
            .get_cf(&cf, keys::customer_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Meter Operations
    // =========================================================================

    fn put_meter(&self, meter: &Meter) -> Result<()> {
        let cf_meters = self.cf(cf::METERS)?;
        let cf_index = self.cf(cf::METERS_BY_USER)?;

        let meter_key = keys::meter_key(&meter.id);
        let index_key = keys::user_meter_key(&meter.user_id, &meter.id);
        let value = Self::serialize(meter)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_meters, &meter_key, &value);
        batch.put_cf(&cf_index, &index_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_meter(&self, meter_id: &MeterId) -> Result<Option<Meter>> {
        let cf = self.cf(cf::METERS)?;
        self.db
            .get_cf(&cf, keys::meter_key(meter_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_meters(&self) -> Result<Vec<Meter>> {
        self.scan_all(cf::METERS)
    }

    fn list_meters_by_user(&self, user_id: &UserId) -> Result<Vec<Meter>> {
        let cf_index = self.cf(cf::METERS_BY_USER)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut meters = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let meter_id = keys::extract_meter_id_from_user_key(&key);
            if let Some(meter) = self.get_meter(&meter_id)? {
                meters.push(meter);
            }
        }
        Ok(meters)
    }

    // =========================================================================
    // Meter Ledger Operations
    // =========================================================================

    fn record_usage(&self, meter_id: &MeterId, amount: i64) -> Result<Meter> {
        if amount < 0 {
            return Err(StoreError::InvalidState(format!(
                "negative usage amount: {amount}"
            )));
        }

        let _guard = self.meter_lock(meter_id)?;
        let mut meter = self.require_meter(meter_id)?;
        meter.record_usage(amount, Utc::now());
        self.write_meter(&meter)?;
        Ok(meter)
    }

    fn credit_payment(&self, meter_id: &MeterId, usage_amount: i64) -> Result<Meter> {
        let _guard = self.meter_lock(meter_id)?;
        let mut meter = self.require_meter(meter_id)?;
        meter.credit_payment(usage_amount, Utc::now());
        self.write_meter(&meter)?;
        Ok(meter)
    }

    fn reverse_payment(&self, meter_id: &MeterId, usage_amount: i64) -> Result<Meter> {
        let _guard = self.meter_lock(meter_id)?;
        let mut meter = self.require_meter(meter_id)?;
        meter.reverse_payment(usage_amount, Utc::now());
        self.write_meter(&meter)?;
        Ok(meter)
    }

    // =========================================================================
    // Bill Operations
    // =========================================================================

    fn insert_bill(&self, bill: &Bill) -> Result<()> {
        let _guard = self.meter_lock(&bill.meter_id)?;

        let cf_by_period = self.cf(cf::BILLS_BY_METER_PERIOD)?;
        let index_key = keys::meter_period_key(&bill.meter_id, bill.period);
        let exists = self
            .db
            .get_cf(&cf_by_period, &index_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Err(StoreError::AlreadyExists {
                entity: "bill",
                key: format!("{}/{}", bill.meter_id, bill.period),
            });
        }

        let mut meter = self.require_meter(&bill.meter_id)?;
        meter.next_due_date = Some(bill.due_date);
        meter.updated_at = Utc::now();

        let cf_bills = self.cf(cf::BILLS)?;
        let cf_by_user = self.cf(cf::BILLS_BY_USER)?;
        let cf_meters = self.cf(cf::METERS)?;

        let user_key = keys::user_bill_key(&bill.user_id, &bill.id);
        let bill_value = Self::serialize(bill)?;
        let meter_value = Self::serialize(&meter)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_bills, keys::bill_key(&bill.id), &bill_value);
        batch.put_cf(&cf_by_period, &index_key, bill.id.as_bytes());
        batch.put_cf(&cf_by_user, &user_key, []); // Index entry (empty value)
        batch.put_cf(&cf_meters, keys::meter_key(&bill.meter_id), &meter_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn mark_bill_overdue(&self, bill_id: &BillId, now: DateTime<Utc>) -> Result<Option<Bill>> {
        let Some(bill) = self.get_bill(bill_id)? else {
            return Ok(None);
        };

        let _guard = self.meter_lock(&bill.meter_id)?;
        let Some(mut bill) = self.get_bill(bill_id)? else {
            return Ok(None);
        };
        if bill.is_paid || bill.is_overdue {
            return Ok(None);
        }
        bill.mark_overdue(now);

        let cf_bills = self.cf(cf::BILLS)?;
        self.db
            .put_cf(&cf_bills, keys::bill_key(bill_id), Self::serialize(&bill)?)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Some(bill))
    }

    fn get_bill(&self, bill_id: &BillId) -> Result<Option<Bill>> {
        let cf = self.cf(cf::BILLS)?;
        self.db
            .get_cf(&cf, keys::bill_key(bill_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_bill_for_period(
        &self,
        meter_id: &MeterId,
        period: BillPeriod,
    ) -> Result<Option<Bill>> {
        let cf = self.cf(cf::BILLS_BY_METER_PERIOD)?;
        let key = keys::meter_period_key(meter_id, period);
        let Some(value) = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        let bill_id = keys::bill_id_from_index_value(&value);
        self.get_bill(&bill_id)
    }

    fn list_bills(&self) -> Result<Vec<Bill>> {
        self.scan_all(cf::BILLS)
    }

    fn list_bills_by_user(&self, user_id: &UserId) -> Result<Vec<Bill>> {
        let cf_index = self.cf(cf::BILLS_BY_USER)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut bills = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let bill_id = keys::extract_bill_id_from_user_key(&key);
            if let Some(bill) = self.get_bill(&bill_id)? {
                bills.push(bill);
            }
        }

        bills.sort_by(|a, b| {
            b.period
                .cmp(&a.period)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(bills)
    }

    fn delete_bill(&self, bill_id: &BillId) -> Result<()> {
        let bill = self.get_bill(bill_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "bill",
            id: bill_id.to_string(),
        })?;

        let _guard = self.meter_lock(&bill.meter_id)?;
        if self.get_bill(bill_id)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "bill",
                id: bill_id.to_string(),
            });
        }

        let cf_bills = self.cf(cf::BILLS)?;
        let cf_by_period = self.cf(cf::BILLS_BY_METER_PERIOD)?;
        let cf_by_user = self.cf(cf::BILLS_BY_USER)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_bills, keys::bill_key(bill_id));
        batch.delete_cf(
            &cf_by_period,
            keys::meter_period_key(&bill.meter_id, bill.period),
        );
        batch.delete_cf(&cf_by_user, keys::user_bill_key(&bill.user_id, bill_id));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Settlement Compound Operations
    // =========================================================================

    fn settle_bills(
        &self,
        bill_ids: &[BillId],
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bill>> {
        // Dedup while keeping caller order; a repeated id must not credit twice.
        let mut seen = HashSet::with_capacity(bill_ids.len());
        let unique_ids: Vec<BillId> = bill_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        // First pass (unlocked) learns the lock set. A bill's meter linkage
        // is immutable, so the set cannot go stale while we wait.
        let mut found = Vec::new();
        let mut meter_ids = Vec::new();
        for bill_id in &unique_ids {
            match self.get_bill(bill_id)? {
                Some(bill) => {
                    meter_ids.push(bill.meter_id);
                    found.push(*bill_id);
                }
                None => tracing::warn!(bill_id = %bill_id, "skipping settlement of missing bill"),
            }
        }
        let _guards = self.lock_meters(&meter_ids)?;

        // Re-read under the locks; only still-unpaid bills settle.
        let mut settled = Vec::new();
        for bill_id in &found {
            let Some(mut bill) = self.get_bill(bill_id)? else {
                continue;
            };
            if bill.is_paid {
                continue;
            }
            bill.settle(payment_method, now);
            settled.push(bill);
        }
        if settled.is_empty() {
            return Ok(settled);
        }

        // One ledger credit per meter, not per bill.
        let mut usage_by_meter: HashMap<MeterId, i64> = HashMap::new();
        for bill in &settled {
            *usage_by_meter.entry(bill.meter_id).or_insert(0) += bill.usage_delta;
        }

        let cf_bills = self.cf(cf::BILLS)?;
        let cf_meters = self.cf(cf::METERS)?;

        let mut batch = WriteBatch::default();
        for bill in &settled {
            batch.put_cf(&cf_bills, keys::bill_key(&bill.id), Self::serialize(bill)?);
        }
        for (meter_id, usage) in &usage_by_meter {
            let mut meter = self.require_meter(meter_id)?;
            meter.credit_payment(*usage, now);
            let value = Self::serialize(&meter)?;
            batch.put_cf(&cf_meters, keys::meter_key(meter_id), &value);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(settled)
    }

    fn reverse_settlement(&self, bill_id: &BillId, now: DateTime<Utc>) -> Result<Bill> {
        let bill = self.get_bill(bill_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "bill",
            id: bill_id.to_string(),
        })?;

        let _guard = self.meter_lock(&bill.meter_id)?;
        let mut bill = self.get_bill(bill_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "bill",
            id: bill_id.to_string(),
        })?;
        if !bill.is_paid {
            return Err(StoreError::InvalidState(format!(
                "bill {bill_id} is not settled"
            )));
        }

        let mut meter = self.require_meter(&bill.meter_id)?;
        bill.reverse_settlement(now);
        meter.reverse_payment(bill.usage_delta, now);

        let cf_bills = self.cf(cf::BILLS)?;
        let cf_meters = self.cf(cf::METERS)?;

        let bill_value = Self::serialize(&bill)?;
        let meter_value = Self::serialize(&meter)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_bills, keys::bill_key(&bill.id), &bill_value);
        batch.put_cf(&cf_meters, keys::meter_key(&meter.id), &meter_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(bill)
    }

    // =========================================================================
    // Payment Session Operations
    // =========================================================================

    fn put_session(&self, session: &PaymentSession) -> Result<()> {
        let cf = self.cf(cf::SESSIONS)?;
        let key = keys::session_key(&session.key());
        let value = Self::serialize(session)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_session(&self, reference: &str) -> Result<Option<PaymentSession>> {
        let cf = self.cf(cf::SESSIONS)?;
        self.db
            .get_cf(&cf, keys::session_key(reference))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Connection Request Operations
    // =========================================================================

    fn put_connection_request(&self, request: &ConnectionRequest) -> Result<()> {
        let cf = self.cf(cf::CONNECTION_REQUESTS)?;
        let key = keys::connection_request_key(&request.id);
        let value = Self::serialize(request)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_connection_request(
        &self,
        request_id: &ConnectionRequestId,
    ) -> Result<Option<ConnectionRequest>> {
        let cf = self.cf(cf::CONNECTION_REQUESTS)?;
        self.db
            .get_cf(&cf, keys::connection_request_key(request_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    fn put_notification(&self, notification: &NotificationRecord) -> Result<()> {
        let cf = self.cf(cf::NOTIFICATIONS)?;
        let key = keys::notification_key(&notification.user_id, &notification.id);
        self.db
            .put_cf(&cf, key, Self::serialize(notification)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_notifications_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        let cf = self.cf(cf::NOTIFICATIONS)?;
        let prefix = keys::user_prefix(user_id);

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(Self::deserialize(&value)?);
        }

        // ULID keys scan oldest first
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    fn has_notification_since(
        &self,
        user_id: &UserId,
        since_ms: u64,
        title: &str,
        link: Option<&str>,
    ) -> Result<bool> {
        let cf = self.cf(cf::NOTIFICATIONS)?;
        let prefix = keys::user_prefix(user_id);
        let start = keys::notification_scan_start(user_id, since_ms);

        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&start, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let record: NotificationRecord = Self::deserialize(&value)?;
            if record.title == title && record.link.as_deref() == link {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
