//! Logical bulk operations bound to one session and one database context.

use crate::compose::{self, BulkOperationPlan};
use crate::transfer;
use sqlbulk_core::{BulkConnection, Connection, Cx, Entity, Error, Outcome, Projection, Result};
use sqlbulk_query::{Assignments, Filter, Predicate, SelectQuery};
use sqlbulk_schema::{ContextTableMappings, DbContext, MetadataCache, TimeoutRegistry};
use sqlbulk_session::{OperationGuard, Session};
use std::marker::PhantomData;
use std::sync::Arc;

/// Bulk operations for the entities of context `Ctx`, run on one session.
///
/// Every operation claims the session for its whole duration (a concurrent
/// call fails with `Error::SessionInUse`) and arms the timeout the registry
/// resolves for its target table.
///
/// ```ignore
/// let cache = MetadataCacheBuilder::new().register::<Shop>()?.freeze();
/// let ctx = BulkContext::<Shop, _>::new(Session::new(conn), &cache, Arc::new(timeouts));
///
/// ctx.bulk_delete::<Order>(&cx, !Order::paid).await;
/// ctx.bulk_update::<Customer>(
///     &cx,
///     Customer::country.eq("NL"),
///     Assignments::new().set(Customer::vat_rate, 21),
/// ).await;
/// ```
pub struct BulkContext<Ctx: DbContext, C: BulkConnection> {
    session: Session<C>,
    cache: MetadataCache,
    timeouts: Arc<TimeoutRegistry>,
    _context: PhantomData<fn() -> Ctx>,
}

impl<Ctx: DbContext, C: BulkConnection> BulkContext<Ctx, C> {
    /// Bind a session to the mappings of `Ctx` held by `cache`.
    ///
    /// The cache may still be unpopulated; operations then fail with
    /// `Error::NotInitialized` until it is.
    pub fn new(session: Session<C>, cache: &MetadataCache, timeouts: Arc<TimeoutRegistry>) -> Self {
        Self {
            session,
            cache: cache.clone(),
            timeouts,
            _context: PhantomData,
        }
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Give the session back, e.g. to `close` it.
    pub fn into_session(self) -> Session<C> {
        self.session
    }

    /// Mappings of `Ctx`.
    pub fn mappings(&self) -> Result<Arc<ContextTableMappings>> {
        self.cache.mappings::<Ctx>()
    }

    /// Delete the rows matching a predicate or selected by a query.
    pub async fn bulk_delete<E: Entity>(
        &self,
        cx: &Cx,
        filter: impl Into<Filter<E>>,
    ) -> Outcome<u64, Error> {
        let plan = self.compose(|m| compose::delete::<E>(m, filter.into()));
        self.run::<E>(cx, plan).await
    }

    /// Apply `assignments` to the rows matching `filter`.
    pub async fn bulk_update<E: Entity>(
        &self,
        cx: &Cx,
        filter: impl Into<Filter<E>>,
        assignments: Assignments<E>,
    ) -> Outcome<u64, Error> {
        let plan = self.compose(|m| compose::update::<E>(m, filter.into(), &assignments));
        self.run::<E>(cx, plan).await
    }

    /// Insert `entities` through a staging table.
    pub async fn bulk_add<E: Entity>(&self, cx: &Cx, entities: &[E]) -> Outcome<u64, Error> {
        let mappings = match self.mappings() {
            Ok(m) => m,
            Err(e) => return Outcome::Err(e),
        };
        let mapping = match mappings.get::<E>() {
            Ok(m) => m,
            Err(e) => return Outcome::Err(e),
        };
        let guard = match self.acquire::<E>() {
            Ok(g) => g,
            Err(e) => return Outcome::Err(e),
        };
        transfer::bulk_insert(cx, &guard, mapping, entities).await
    }

    /// Empty `E`'s table and restart its keys; refused when referenced.
    pub async fn truncate<E: Entity>(&self, cx: &Cx) -> Outcome<u64, Error> {
        let plan = self.compose(compose::truncate::<E>);
        self.run::<E>(cx, plan).await
    }

    /// Empty `E`'s table and restart its keys even when referenced.
    pub async fn truncate_with_foreign_keys<E: Entity>(&self, cx: &Cx) -> Outcome<u64, Error> {
        let plan = self.compose(compose::truncate_with_foreign_keys::<E>);
        self.run::<E>(cx, plan).await
    }

    /// Insert the rows `source` produces into `T`'s table.
    pub async fn select_and_add<T: Entity, W: Projection>(
        &self,
        cx: &Cx,
        source: SelectQuery<W>,
    ) -> Outcome<u64, Error> {
        let plan = self.compose(|m| compose::select_and_insert::<T, W>(m, &source));
        self.run::<T>(cx, plan).await
    }

    /// Update `T`'s rows from the rows `source` produces, matched by key.
    pub async fn select_and_update<T: Entity, W: Projection>(
        &self,
        cx: &Cx,
        source: SelectQuery<W>,
    ) -> Outcome<u64, Error> {
        let plan = self.compose(|m| compose::select_and_update::<T, W>(m, &source));
        self.run::<T>(cx, plan).await
    }

    /// Count `E`'s rows, optionally restricted by `predicate`.
    pub async fn count<E: Entity>(
        &self,
        cx: &Cx,
        predicate: Option<Predicate<E>>,
    ) -> Outcome<u64, Error> {
        let statement = match self.mappings().and_then(|m| compose::count::<E>(&m, predicate)) {
            Ok(s) => s,
            Err(e) => return Outcome::Err(e),
        };
        let guard = match self.acquire::<E>() {
            Ok(g) => g,
            Err(e) => return Outcome::Err(e),
        };
        match guard
            .connection()
            .query_one(cx, &statement.sql, &statement.params)
            .await
        {
            Outcome::Ok(Some(row)) => match row.get_as::<u64>(0) {
                Ok(n) => Outcome::Ok(n),
                Err(e) => Outcome::Err(e),
            },
            Outcome::Ok(None) => Outcome::Ok(0),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    fn compose(
        &self,
        build: impl FnOnce(&ContextTableMappings) -> Result<BulkOperationPlan>,
    ) -> Result<BulkOperationPlan> {
        let mappings = self.mappings()?;
        build(&mappings)
    }

    async fn run<E: Entity>(
        &self,
        cx: &Cx,
        plan: Result<BulkOperationPlan>,
    ) -> Outcome<u64, Error> {
        let plan = match plan {
            Ok(plan) => plan,
            Err(e) => {
                tracing::debug!(table = E::TABLE_NAME, error = %e, "Bulk operation rejected");
                return Outcome::Err(e);
            }
        };
        let guard = match self.acquire::<E>() {
            Ok(g) => g,
            Err(e) => return Outcome::Err(e),
        };
        plan.execute(cx, guard.connection()).await
    }

    fn acquire<E: Entity>(&self) -> Result<OperationGuard<'_, C>> {
        let timeout = self.timeouts.resolve_for::<Ctx, E>();
        Ok(self.session.acquire()?.with_timeout(timeout))
    }
}

impl<Ctx: DbContext, C: BulkConnection> std::fmt::Debug for BulkContext<Ctx, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkContext")
            .field("context", &Ctx::NAME)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
