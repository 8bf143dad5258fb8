// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::domain_record::{
    CrawlState, DomainRecord, ParseModelError, Reachability, TechnologyProfile,
};
use crate::domain::repositories::domain_repository::{
    DomainFilter, DomainRepository, NormalizationOp, NormalizationOutcome, RepositoryError,
};
use crate::infrastructure::database::entities::domain as domain_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType, OnConflict, Order},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;

/// 域名仓库实现
///
/// 基于SeaORM实现的域名注册表，生产环境使用 PostgreSQL，测试使用 SQLite
#[derive(Clone)]
pub struct DomainRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl DomainRepositoryImpl {
    /// 创建新的域名仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn pending_model(domain: &str, now: DateTime<Utc>) -> domain_entity::ActiveModel {
        domain_entity::ActiveModel {
            domain: Set(domain.to_string()),
            crawl_state: Set(CrawlState::Pending.to_string()),
            created_at: Set(now.into()),
            ..Default::default()
        }
    }

    fn on_conflict_ignore() -> OnConflict {
        OnConflict::column(domain_entity::Column::Domain)
            .do_nothing()
            .to_owned()
    }
}

impl TryFrom<domain_entity::Model> for DomainRecord {
    type Error = ParseModelError;

    fn try_from(model: domain_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            crawl_state: model.crawl_state.parse()?,
            reachability: model
                .reachability
                .as_deref()
                .map(str::parse::<Reachability>)
                .transpose()?,
            technologies: model
                .technologies
                .as_deref()
                .map(str::parse::<TechnologyProfile>)
                .transpose()?,
            domain: model.domain,
            claimed_at: model.claimed_at,
            crawled_at: model.crawled_at,
            probed_at: model.probed_at,
            created_at: model.created_at,
        })
    }
}

fn filter_condition(filter: DomainFilter) -> Condition {
    use domain_entity::Column;

    match filter {
        DomainFilter::All => Condition::all(),
        DomainFilter::Pending => {
            Condition::all().add(Column::CrawlState.eq(CrawlState::Pending.to_string()))
        }
        DomainFilter::Claimed => {
            Condition::all().add(Column::CrawlState.eq(CrawlState::Claimed.to_string()))
        }
        DomainFilter::Done => {
            Condition::all().add(Column::CrawlState.eq(CrawlState::Done.to_string()))
        }
        DomainFilter::Unprobed => Condition::all().add(Column::Reachability.is_null()),
        DomainFilter::Probed => Condition::all().add(Column::Reachability.is_not_null()),
        DomainFilter::Reachable => Condition::all()
            .add(Column::Reachability.is_not_null())
            .add(Column::Reachability.ne(Reachability::Unreachable.to_string())),
        DomainFilter::Fingerprinted => Condition::all()
            .add(Column::Technologies.is_not_null())
            .add(Column::Technologies.is_not_in(TechnologyProfile::sentinels())),
    }
}

fn records(models: Vec<domain_entity::Model>) -> Result<Vec<DomainRecord>, RepositoryError> {
    models
        .into_iter()
        .map(|model| DomainRecord::try_from(model).map_err(RepositoryError::from))
        .collect()
}

#[async_trait]
impl DomainRepository for DomainRepositoryImpl {
    async fn insert_if_absent(&self, domain: &str) -> Result<bool, RepositoryError> {
        let inserted = domain_entity::Entity::insert(Self::pending_model(domain, Utc::now()))
            .on_conflict(Self::on_conflict_ignore())
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(inserted == 1)
    }

    async fn insert_many(&self, domains: &[String]) -> Result<u64, RepositoryError> {
        // 空的 INSERT 语句无法构造
        if domains.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let models = domains
            .iter()
            .map(|domain| Self::pending_model(domain, now));

        let inserted = domain_entity::Entity::insert_many(models)
            .on_conflict(Self::on_conflict_ignore())
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(inserted)
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<DomainRecord>, RepositoryError> {
        let model = domain_entity::Entity::find()
            .filter(domain_entity::Column::Domain.eq(domain))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(DomainRecord::try_from).transpose()?)
    }

    async fn claim_next(&self) -> Result<Option<DomainRecord>, RepositoryError> {
        loop {
            let txn = self.db.begin().await?;

            // FOR UPDATE SKIP LOCKED: concurrent claimants never wait on or see the same row
            let candidate = domain_entity::Entity::find()
                .filter(domain_entity::Column::CrawlState.eq(CrawlState::Pending.to_string()))
                .order_by_asc(domain_entity::Column::Id)
                .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                .one(&txn)
                .await?;

            let Some(mut model) = candidate else {
                txn.commit().await?;
                return Ok(None);
            };

            let claimed_at: DateTime<FixedOffset> = Utc::now().into();
            let result = domain_entity::Entity::update_many()
                .col_expr(
                    domain_entity::Column::CrawlState,
                    Expr::value(CrawlState::Claimed.to_string()),
                )
                .col_expr(
                    domain_entity::Column::ClaimedAt,
                    Expr::value::<Option<DateTime<FixedOffset>>>(Some(claimed_at)),
                )
                .filter(domain_entity::Column::Id.eq(model.id))
                .filter(domain_entity::Column::CrawlState.eq(CrawlState::Pending.to_string()))
                .exec(&txn)
                .await?;

            txn.commit().await?;

            if result.rows_affected == 1 {
                model.crawl_state = CrawlState::Claimed.to_string();
                model.claimed_at = Some(claimed_at);
                return Ok(Some(DomainRecord::try_from(model)?));
            }

            // Only reachable on backends without row locks: another claimant won the row
            debug!("Lost claim race for domain id {}, retrying", model.id);
        }
    }

    async fn mark_crawled(&self, id: i32) -> Result<(), RepositoryError> {
        let result = domain_entity::Entity::update_many()
            .col_expr(
                domain_entity::Column::CrawlState,
                Expr::value(CrawlState::Done.to_string()),
            )
            .col_expr(
                domain_entity::Column::CrawledAt,
                Expr::value::<Option<DateTime<FixedOffset>>>(Some(Utc::now().into())),
            )
            .filter(domain_entity::Column::Id.eq(id))
            .filter(domain_entity::Column::CrawlState.is_in([
                CrawlState::Pending.to_string(),
                CrawlState::Claimed.to_string(),
            ]))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            // Already done is fine, a missing row is not
            let exists = domain_entity::Entity::find_by_id(id)
                .count(self.db.as_ref())
                .await?;
            if exists == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        Ok(())
    }

    async fn record_probe(
        &self,
        id: i32,
        reachability: &Reachability,
        technologies: &TechnologyProfile,
    ) -> Result<bool, RepositoryError> {
        let result = domain_entity::Entity::update_many()
            .col_expr(
                domain_entity::Column::Reachability,
                Expr::value(Some(reachability.to_string())),
            )
            .col_expr(
                domain_entity::Column::Technologies,
                Expr::value(Some(technologies.to_string())),
            )
            .col_expr(
                domain_entity::Column::ProbedAt,
                Expr::value::<Option<DateTime<FixedOffset>>>(Some(Utc::now().into())),
            )
            .filter(domain_entity::Column::Id.eq(id))
            .filter(domain_entity::Column::Reachability.is_null())
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn count(&self, filter: DomainFilter) -> Result<u64, RepositoryError> {
        let count = domain_entity::Entity::find()
            .filter(filter_condition(filter))
            .count(self.db.as_ref())
            .await?;

        Ok(count)
    }

    async fn scan(
        &self,
        filter: DomainFilter,
        after_id: i32,
        limit: u64,
    ) -> Result<Vec<DomainRecord>, RepositoryError> {
        let models = domain_entity::Entity::find()
            .filter(filter_condition(filter))
            .filter(domain_entity::Column::Id.gt(after_id))
            .order_by_asc(domain_entity::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        records(models)
    }

    async fn sample_crawled(&self) -> Result<Option<DomainRecord>, RepositoryError> {
        let model = domain_entity::Entity::find()
            .filter(domain_entity::Column::CrawlState.eq(CrawlState::Done.to_string()))
            .order_by(Expr::cust("RANDOM()"), Order::Asc)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(DomainRecord::try_from).transpose()?)
    }

    async fn load_keys(&self) -> Result<Vec<(i32, String)>, RepositoryError> {
        let keys = domain_entity::Entity::find()
            .select_only()
            .column(domain_entity::Column::Id)
            .column(domain_entity::Column::Domain)
            .order_by_asc(domain_entity::Column::Id)
            .into_tuple::<(i32, String)>()
            .all(self.db.as_ref())
            .await?;

        Ok(keys)
    }

    async fn apply_normalization(
        &self,
        ops: &[NormalizationOp],
    ) -> Result<NormalizationOutcome, RepositoryError> {
        let mut outcome = NormalizationOutcome::default();
        if ops.is_empty() {
            return Ok(outcome);
        }

        // Dropping the transaction on any error rolls the whole batch back
        let txn = self.db.begin().await?;

        for op in ops {
            match op {
                NormalizationOp::Delete { id } => {
                    let result = domain_entity::Entity::delete_by_id(*id).exec(&txn).await?;
                    outcome.deleted += result.rows_affected;
                }
                NormalizationOp::Rewrite { id, domain } => {
                    let result = domain_entity::Entity::update_many()
                        .col_expr(domain_entity::Column::Domain, Expr::value(domain.clone()))
                        .filter(domain_entity::Column::Id.eq(*id))
                        .exec(&txn)
                        .await?;
                    outcome.rewritten += result.rows_affected;
                }
            }
        }

        txn.commit().await?;
        Ok(outcome)
    }

    async fn reset_probe_results(&self) -> Result<u64, RepositoryError> {
        let result = domain_entity::Entity::update_many()
            .col_expr(
                domain_entity::Column::Reachability,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                domain_entity::Column::Technologies,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                domain_entity::Column::ProbedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .filter(
                Condition::any()
                    .add(domain_entity::Column::Reachability.is_not_null())
                    .add(domain_entity::Column::Technologies.is_not_null()),
            )
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[path = "domain_repo_impl_test.rs"]
mod tests;
