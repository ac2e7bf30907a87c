use crate::{
    db::{
        query::{Condition, KeyCondition, Operator, matches, matches_all},
        store::{Item, Key, PutCondition, StoreDriver, StoreError, TransactOp},
    },
    model::registry::TableSchema,
    value::{Value, sort_order},
};
use async_trait::async_trait;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};

///
/// RequestStats
///
/// Count of driver calls by kind since the driver was created.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RequestStats {
    pub get: u64,
    pub put: u64,
    pub delete: u64,
    pub query: u64,
    pub scan: u64,
    pub transact: u64,
}

#[derive(Default)]
struct Counters {
    get: AtomicU64,
    put: AtomicU64,
    delete: AtomicU64,
    query: AtomicU64,
    scan: AtomicU64,
    transact: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RequestStats {
        RequestStats {
            get: self.get.load(Ordering::Relaxed),
            put: self.put.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
            query: self.query.load(Ordering::Relaxed),
            scan: self.scan.load(Ordering::Relaxed),
            transact: self.transact.load(Ordering::Relaxed),
        }
    }
}

///
/// MemTable
///

struct MemTable {
    schema: TableSchema,
    items: BTreeMap<String, Item>,
}

impl MemTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            items: BTreeMap::new(),
        }
    }

    // Storage slot for an item, derived from its key attributes.
    fn item_slot(&self, item: &Item) -> Result<String, StoreError> {
        let partition = self.key_attribute(item, &self.schema.partition_key)?;
        let mut slot = partition.key_string();

        if let Some(sort_key) = &self.schema.sort_key {
            let sort = self.key_attribute(item, sort_key)?;
            slot.push('|');
            slot.push_str(&sort.key_string());
        }

        Ok(slot)
    }

    fn key_slot(&self, key: &Key) -> Result<String, StoreError> {
        let mut item = Item::new();
        item.insert(key.partition.0.clone(), key.partition.1.clone());
        if let Some((attribute, value)) = &key.sort {
            item.insert(attribute.clone(), value.clone());
        }

        self.item_slot(&item)
    }

    fn key_attribute<'a>(&self, item: &'a Item, attribute: &str) -> Result<&'a Value, StoreError> {
        item.get(attribute)
            .filter(|value| value.is_scalar())
            .ok_or_else(|| StoreError::MissingKeyAttribute {
                table: self.schema.table.clone(),
                attribute: attribute.to_string(),
            })
    }
}

///
/// MemoryDriver
///
/// In-process [`StoreDriver`] with store semantics close enough to a real
/// key-value service for tests and embedding: tables must exist, items are
/// addressed by their key attributes, and `transact_write` is all-or-nothing.
///

#[derive(Default)]
pub struct MemoryDriver {
    tables: RwLock<BTreeMap<String, MemTable>>,
    counters: Counters,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver with one table per schema already provisioned.
    #[must_use]
    pub fn with_schemas(schemas: impl IntoIterator<Item = TableSchema>) -> Self {
        let driver = Self::new();
        for schema in schemas {
            // a fresh lock cannot be poisoned
            let _ = driver.create_table(schema);
        }

        driver
    }

    /// Provision a table. Re-creating an existing table keeps its items.
    pub fn create_table(&self, schema: TableSchema) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables
            .entry(schema.table.clone())
            .or_insert_with(|| MemTable::new(schema));

        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> RequestStats {
        self.counters.snapshot()
    }

    /// Number of items currently stored in `table`.
    pub fn item_count(&self, table: &str) -> Result<usize, StoreError> {
        let tables = self.read()?;
        let table = Self::table(&tables, table)?;

        Ok(table.items.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, MemTable>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, MemTable>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))
    }

    fn table<'a>(
        tables: &'a BTreeMap<String, MemTable>,
        name: &str,
    ) -> Result<&'a MemTable, StoreError> {
        tables
            .get(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn table_mut<'a>(
        tables: &'a mut BTreeMap<String, MemTable>,
        name: &str,
    ) -> Result<&'a mut MemTable, StoreError> {
        tables
            .get_mut(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }
}

#[async_trait]
impl StoreDriver for MemoryDriver {
    async fn get_item(&self, table: &str, key: &Key) -> Result<Option<Item>, StoreError> {
        Counters::bump(&self.counters.get);

        let tables = self.read()?;
        let table = Self::table(&tables, table)?;
        let slot = table.key_slot(key)?;

        Ok(table.items.get(&slot).cloned())
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<(), StoreError> {
        Counters::bump(&self.counters.put);

        let mut tables = self.write()?;
        let table = Self::table_mut(&mut tables, table)?;
        let slot = table.item_slot(&item)?;

        if condition == Some(PutCondition::NotExists) && table.items.contains_key(&slot) {
            return Err(StoreError::ConditionFailed {
                table: table.schema.table.clone(),
                key: slot,
            });
        }
        table.items.insert(slot, item);

        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Key) -> Result<(), StoreError> {
        Counters::bump(&self.counters.delete);

        let mut tables = self.write()?;
        let table = Self::table_mut(&mut tables, table)?;
        let slot = table.key_slot(key)?;
        table.items.remove(&slot);

        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        key_condition: &KeyCondition,
        filter: &[Condition],
        forward: bool,
    ) -> Result<Vec<Item>, StoreError> {
        Counters::bump(&self.counters.query);

        let tables = self.read()?;
        let table = Self::table(&tables, table)?;
        let (partition_attr, partition_value) = &key_condition.partition;
        let partition = Condition::new(partition_attr.as_str(), Operator::Eq, partition_value.clone());

        let mut items: Vec<Item> = table
            .items
            .values()
            .filter(|item| matches(item, &partition))
            .filter(|item| key_condition.sort.as_ref().is_none_or(|sort| matches(item, sort)))
            .filter(|item| matches_all(item, filter))
            .cloned()
            .collect();

        if let Some(sort_key) = &table.schema.sort_key {
            items.sort_by(|a, b| {
                let ordering = match (a.get(sort_key), b.get(sort_key)) {
                    (Some(a), Some(b)) => sort_order(a, b),
                    (a, b) => a.is_none().cmp(&b.is_none()),
                };
                if forward { ordering } else { ordering.reverse() }
            });
        }

        Ok(items)
    }

    async fn scan(&self, table: &str, filter: &[Condition]) -> Result<Vec<Item>, StoreError> {
        Counters::bump(&self.counters.scan);

        let tables = self.read()?;
        let table = Self::table(&tables, table)?;

        Ok(table
            .items
            .values()
            .filter(|item| matches_all(item, filter))
            .cloned()
            .collect())
    }

    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<(), StoreError> {
        Counters::bump(&self.counters.transact);

        let mut tables = self.write()?;

        // phase 1: resolve and check every op without touching state
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::with_capacity(ops.len());
        for (index, op) in ops.into_iter().enumerate() {
            let table = Self::table(&tables, op.table())?;
            let slot = match &op {
                TransactOp::Put { item, .. } => table.item_slot(item)?,
                TransactOp::Delete { key, .. } => table.key_slot(key)?,
            };

            if !seen.insert((op.table().to_string(), slot.clone())) {
                return Err(StoreError::TransactionCanceled {
                    reason: format!(
                        "operation {index} targets item {slot} in '{}' more than once",
                        op.table()
                    ),
                });
            }

            if let TransactOp::Put {
                condition: Some(PutCondition::NotExists),
                ..
            } = &op
                && table.items.contains_key(&slot)
            {
                return Err(StoreError::TransactionCanceled {
                    reason: format!(
                        "operation {index}: conditional check failed for item {slot} in '{}'",
                        op.table()
                    ),
                });
            }

            resolved.push((slot, op));
        }

        // phase 2: apply
        for (slot, op) in resolved {
            match op {
                TransactOp::Put { table, item, .. } => {
                    Self::table_mut(&mut tables, &table)?.items.insert(slot, item);
                }
                TransactOp::Delete { table, .. } => {
                    Self::table_mut(&mut tables, &table)?.items.remove(&slot);
                }
            }
        }

        Ok(())
    }
}
