use async_trait::async_trait;
use chrono::Duration;

use merchhours_core::domain::period::Period;
use merchhours_core::domain::supplier::SupplierIdentity;
use merchhours_core::lookup::{resolve_supplier, LookupError, LookupProvider};

use super::RepositoryError;
use crate::DbPool;

/// Lookups over the `merch_fix`, `merchandiser` and `merchandiser_log` tables.
pub struct SqlLookupProvider {
    pool: DbPool,
}

impl SqlLookupProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_suppliers(&self) -> Result<Vec<SupplierIdentity>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT supplier FROM merch_fix WHERE supplier IS NOT NULL ORDER BY supplier",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names.into_iter().map(SupplierIdentity::from).collect())
    }

    async fn fetch_worked_seconds(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<i64>, RepositoryError> {
        let seconds: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(CAST(strftime('%s', ml.exit_date) AS INTEGER)
                        - CAST(strftime('%s', ml.enter_date) AS INTEGER))
             FROM merchandiser_log ml
             JOIN merchandiser m ON ml.merchant_id = m.merchant_id AND ml.iin = m.iin
             WHERE date(ml.enter_date) BETWEEN ?1 AND ?2
               AND m.supplier = ?3",
        )
        .bind(period.start)
        .bind(period.end)
        .bind(supplier.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(seconds)
    }

    async fn fetch_planned_fte(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<f64>, RepositoryError> {
        let fte: Option<f64> = sqlx::query_scalar(
            "SELECT fte FROM merch_fix
             WHERE supplier = ?1 AND date(month_date) BETWEEN ?2 AND ?3
             ORDER BY month_date
             LIMIT 1",
        )
        .bind(supplier.as_str())
        .bind(period.start)
        .bind(period.end)
        .fetch_optional(&self.pool)
        .await?;
        Ok(fte)
    }
}

#[async_trait]
impl LookupProvider for SqlLookupProvider {
    async fn list_suppliers(&self) -> Result<Vec<SupplierIdentity>, LookupError> {
        Ok(self.fetch_suppliers().await?)
    }

    // Matching runs in Rust over the ordered list so LIKE wildcards in user input stay literal and
    // case folding covers Cyrillic names.
    async fn resolve(&self, token: &str) -> Result<Option<SupplierIdentity>, LookupError> {
        let suppliers = self.fetch_suppliers().await?;
        Ok(resolve_supplier(&suppliers, token).cloned())
    }

    async fn actual_hours(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<Duration>, LookupError> {
        Ok(self.fetch_worked_seconds(supplier, period).await?.map(Duration::seconds))
    }

    async fn planned_fte(
        &self,
        supplier: &SupplierIdentity,
        period: &Period,
    ) -> Result<Option<f64>, LookupError> {
        Ok(self.fetch_planned_fte(supplier, period).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use merchhours_core::domain::period::Period;
    use merchhours_core::domain::supplier::SupplierIdentity;
    use merchhours_core::lookup::{LookupError, LookupProvider};

    use super::SqlLookupProvider;
    use crate::{connect_with_settings, migrations::run_pending, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        pool
    }

    async fn insert_plan(pool: &DbPool, supplier: &str, month_date: &str, fte: f64) {
        sqlx::query("INSERT INTO merch_fix (supplier, month_date, fte) VALUES (?1, ?2, ?3)")
            .bind(supplier)
            .bind(month_date)
            .bind(fte)
            .execute(pool)
            .await
            .expect("insert plan");
    }

    async fn insert_merchandiser(pool: &DbPool, merchant_id: &str, iin: &str, supplier: &str) {
        sqlx::query("INSERT INTO merchandiser (merchant_id, iin, supplier) VALUES (?1, ?2, ?3)")
            .bind(merchant_id)
            .bind(iin)
            .bind(supplier)
            .execute(pool)
            .await
            .expect("insert merchandiser");
    }

    async fn insert_shift(pool: &DbPool, merchant_id: &str, iin: &str, enter: &str, exit: &str) {
        sqlx::query(
            "INSERT INTO merchandiser_log (merchant_id, iin, enter_date, exit_date)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(merchant_id)
        .bind(iin)
        .bind(enter)
        .bind(exit)
        .execute(pool)
        .await
        .expect("insert shift");
    }

    #[tokio::test]
    async fn suppliers_are_distinct_and_ordered() {
        let pool = pool().await;
        insert_plan(&pool, "Gamma Trade (4100)", "2025-05-01", 1.0).await;
        insert_plan(&pool, "Alpha Foods (1064)", "2025-05-01", 1.0).await;
        insert_plan(&pool, "Alpha Foods (1064)", "2025-06-01", 1.5).await;
        let provider = SqlLookupProvider::new(pool);

        let suppliers = provider.list_suppliers().await.expect("list");

        assert_eq!(
            suppliers,
            vec![SupplierIdentity::new("Alpha Foods (1064)"), SupplierIdentity::new("Gamma Trade (4100)")]
        );
    }

    #[tokio::test]
    async fn resolve_applies_code_then_substring_policy() {
        let pool = pool().await;
        insert_plan(&pool, "Beta 1064 Logistics (3300)", "2025-05-01", 1.0).await;
        insert_plan(&pool, "Alpha Foods (1064)", "2025-05-01", 1.0).await;
        let provider = SqlLookupProvider::new(pool);

        let by_code = provider.resolve("1064").await.expect("resolve");
        assert_eq!(by_code, Some(SupplierIdentity::new("Alpha Foods (1064)")));

        let by_name = provider.resolve("LOGISTICS").await.expect("resolve");
        assert_eq!(by_name, Some(SupplierIdentity::new("Beta 1064 Logistics (3300)")));

        assert_eq!(provider.resolve("%").await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn worked_time_sums_shifts_entered_inside_the_month() {
        let pool = pool().await;
        insert_plan(&pool, "Alpha Foods (1064)", "2025-05-01", 1.0).await;
        insert_merchandiser(&pool, "M-1", "900101300001", "Alpha Foods (1064)").await;
        insert_merchandiser(&pool, "M-2", "900101300002", "Other (9999)").await;
        insert_shift(&pool, "M-1", "900101300001", "2025-05-01 09:00:00", "2025-05-01 17:30:00")
            .await;
        insert_shift(&pool, "M-1", "900101300001", "2025-05-31 22:00:00", "2025-06-01 02:00:00")
            .await;
        insert_shift(&pool, "M-1", "900101300001", "2025-04-30 22:00:00", "2025-05-01 06:00:00")
            .await;
        insert_shift(&pool, "M-2", "900101300002", "2025-05-02 09:00:00", "2025-05-02 19:00:00")
            .await;
        let provider = SqlLookupProvider::new(pool);
        let supplier = SupplierIdentity::new("Alpha Foods (1064)");
        let may = Period::for_month(2025, 5).expect("period");

        let worked = provider.actual_hours(&supplier, &may).await.expect("hours");
        assert_eq!(worked, Some(Duration::minutes(8 * 60 + 30 + 4 * 60)));

        let june = Period::for_month(2025, 6).expect("period");
        assert_eq!(provider.actual_hours(&supplier, &june).await.expect("hours"), None);
    }

    #[tokio::test]
    async fn planned_fte_is_found_by_month_date() {
        let pool = pool().await;
        insert_plan(&pool, "Alpha Foods (1064)", "2025-05-01", 1.25).await;
        let provider = SqlLookupProvider::new(pool);
        let supplier = SupplierIdentity::new("Alpha Foods (1064)");

        let may = Period::for_month(2025, 5).expect("period");
        assert_eq!(provider.planned_fte(&supplier, &may).await.expect("fte"), Some(1.25));

        let april = Period::for_month(2025, 4).expect("period");
        assert_eq!(provider.planned_fte(&supplier, &april).await.expect("fte"), None);
    }

    #[tokio::test]
    async fn closed_pool_reports_data_unavailable() {
        let pool = pool().await;
        let provider = SqlLookupProvider::new(pool.clone());
        pool.close().await;

        let error = provider.list_suppliers().await.expect_err("closed pool");
        assert!(matches!(error, LookupError::DataUnavailable(_)));
    }
}
