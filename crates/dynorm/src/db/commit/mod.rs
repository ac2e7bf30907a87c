//! Bounded multi-item transactions.
//!
//! Contract: operations are only queued until `commit`; commit checks the
//! operation cap, rejects `unique` values claimed twice within the batch,
//! runs save-time validation for every queued entity, then
//! issues exactly one all-or-nothing driver call. Nothing is written when
//! any step fails.


use crate::{
    db::{
        Db,
        session::check_batch_unique,
        store::{Item, Key, PutCondition, TransactOp},
    },
    entity::Entity,
    error::Error,
    model::pipeline::WriteMode,
    obs::sink::MetricsEvent,
    value::Record,
};
use chrono::Utc;
use std::fmt;

///
/// TransactionState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionState {
    Open,
    Committing,
    Closed,
    Failed,
    Discarded,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Closed => "closed",
            Self::Failed => "failed",
            Self::Discarded => "discarded",
        };
        write!(f, "{label}")
    }
}

///
/// Transaction
///
/// Ordered batch of puts and deletes, committed atomically. Single use:
/// once committed, failed or discarded it rejects further operations.
///

pub struct Transaction<'a> {
    db: &'a Db,
    ops: Vec<TransactOp>,
    pending: Vec<Entity>,
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    pub(crate) const fn new(db: &'a Db) -> Self {
        Self {
            db,
            ops: Vec::new(),
            pending: Vec::new(),
            state: TransactionState::Open,
        }
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    // ---------------------------------------------------------------------
    // Queueing
    // ---------------------------------------------------------------------

    /// Queue an insert (new entity) or overwrite (persisted entity).
    /// Lifecycle timestamps are stamped now; lazy validators and unique
    /// checks run at commit.
    pub fn put(&mut self, entity: &Entity) -> Result<(), Error> {
        self.ensure_open()?;

        let mode = if entity.is_persisted() {
            WriteMode::Update
        } else {
            WriteMode::Insert
        };
        let mut staged = entity.clone();
        staged.stamp(mode, Utc::now());
        staged.check_required()?;

        let table = self.db.table_name(staged.model());
        self.ops.push(TransactOp::Put {
            table,
            item: staged.to_item(),
            condition: (mode == WriteMode::Insert).then_some(PutCondition::NotExists),
        });
        self.pending.push(staged);

        Ok(())
    }

    /// Build an entity of `type_name` from `record` and queue its insert.
    pub fn create(&mut self, type_name: &str, record: Record) -> Result<Entity, Error> {
        self.ensure_open()?;

        let entity = self.db.table(type_name)?.build(record)?;
        self.put(&entity)?;

        Ok(entity)
    }

    /// Queue a raw item write against a physical table.
    pub fn put_item(&mut self, table: impl Into<String>, item: Item) -> Result<(), Error> {
        self.ensure_open()?;

        self.ops.push(TransactOp::Put {
            table: table.into(),
            item,
            condition: None,
        });

        Ok(())
    }

    /// Queue a delete: a marker write when the model soft-deletes, a hard
    /// delete otherwise.
    pub fn delete(&mut self, entity: &Entity) -> Result<(), Error> {
        self.ensure_open()?;

        let table = self.db.table_name(entity.model());
        if entity.model().soft_delete_field().is_some() {
            let mut trashed = entity.clone();
            trashed.set_trashed(Some(Utc::now()))?;
            self.ops.push(TransactOp::Put {
                table,
                item: trashed.to_item(),
                condition: None,
            });
        } else {
            self.ops.push(TransactOp::Delete {
                table,
                key: entity.key()?,
            });
        }

        Ok(())
    }

    /// Queue a hard delete by key against a physical table.
    pub fn delete_key(&mut self, table: impl Into<String>, key: Key) -> Result<(), Error> {
        self.ensure_open()?;

        self.ops.push(TransactOp::Delete {
            table: table.into(),
            key,
        });

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------

    /// Validate and write every queued operation atomically.
    pub async fn commit(&mut self) -> Result<(), Error> {
        self.ensure_open()?;

        let count = self.ops.len();
        let limit = self.db.config().transaction_limit;
        if count > limit {
            return Err(self.fail(Error::transaction_limit(count, limit)));
        }
        if count == 0 {
            self.state = TransactionState::Closed;
            return Ok(());
        }

        self.state = TransactionState::Committing;

        if let Err(err) = check_batch_unique(&self.pending) {
            return Err(self.fail(err));
        }

        let mut rejected = None;
        for entity in &self.pending {
            let checked = match self.db.table(entity.type_name()) {
                Ok(table) => table.validate_for_save(entity).await,
                Err(err) => Err(err),
            };
            if let Err(err) = checked {
                rejected = Some(err);
                break;
            }
        }
        if let Some(err) = rejected {
            return Err(self.fail(err));
        }

        tracing::debug!(ops = count, "transact write");
        if let Err(err) = self.db.driver().transact_write(self.ops.clone()).await {
            return Err(self.fail(err.into()));
        }

        self.state = TransactionState::Closed;
        self.ops.clear();
        self.pending.clear();
        self.db.record(MetricsEvent::TransactionCommit {
            ops: u64::try_from(count).unwrap_or(u64::MAX),
            committed: true,
        });

        Ok(())
    }

    /// Drop every queued operation without writing.
    pub fn discard(&mut self) {
        if self.state == TransactionState::Open {
            self.state = TransactionState::Discarded;
        }
        self.ops.clear();
        self.pending.clear();
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.state == TransactionState::Open {
            Ok(())
        } else {
            Err(Error::transaction_invariant(format!(
                "transaction is {}; it accepts no further operations",
                self.state
            )))
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        tracing::warn!(ops = self.ops.len(), error = %err, "transaction aborted");
        self.db.record(MetricsEvent::TransactionCommit {
            ops: u64::try_from(self.ops.len()).unwrap_or(u64::MAX),
            committed: false,
        });
        self.state = TransactionState::Failed;

        err
    }
}
