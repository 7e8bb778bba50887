use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected shape of the demo dataset, kept in step with `config/fixtures/demo_seed_data.sql`.
const SEED_SUPPLIERS: &[SeedSupplierContract] = &[
    SeedSupplierContract {
        supplier: "Alpha Foods (1064)",
        planned_fte: 1.0,
        merchandisers: 1,
        worked_seconds: Some(150 * 3600),
    },
    SeedSupplierContract {
        supplier: "Beta Logistics (3300)",
        planned_fte: 1.0,
        merchandisers: 1,
        worked_seconds: Some(180 * 3600),
    },
    SeedSupplierContract {
        supplier: "Delta Retail (5200)",
        planned_fte: 0.5,
        merchandisers: 0,
        worked_seconds: None,
    },
    SeedSupplierContract {
        supplier: "Gamma Trade (4100)",
        planned_fte: 2.0,
        merchandisers: 2,
        worked_seconds: Some(336 * 3600),
    },
];

const SEED_MONTH_START: &str = "2025-05-01";
const SEED_MONTH_END: &str = "2025-05-31";

/// Demo dataset covering one underworked, one overtime, one exact and one unstaffed supplier in
/// May 2025.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the dataset. Rows carry fixed keys so loading twice changes nothing.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM merch_fix").fetch_one(pool).await?;
        let shifts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM merchandiser_log").fetch_one(pool).await?;

        Ok(SeedResult {
            suppliers_seeded: SEED_SUPPLIERS.iter().map(|seed| seed.supplier).collect(),
            plan_rows: plans,
            shift_rows: shifts,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for seed in SEED_SUPPLIERS {
            let plan_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM merch_fix WHERE supplier = ?1 AND month_date = ?2 AND fte = ?3)",
            )
            .bind(seed.supplier)
            .bind(SEED_MONTH_START)
            .bind(seed.planned_fte)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}: plan", seed.supplier), plan_ok == 1));

            let merchandisers: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM merchandiser WHERE supplier = ?1")
                    .bind(seed.supplier)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}: merchandisers", seed.supplier), merchandisers == seed.merchandisers));

            let worked: Option<i64> = sqlx::query_scalar(
                "SELECT SUM(CAST(strftime('%s', ml.exit_date) AS INTEGER)
                            - CAST(strftime('%s', ml.enter_date) AS INTEGER))
                 FROM merchandiser_log ml
                 JOIN merchandiser m ON ml.merchant_id = m.merchant_id AND ml.iin = m.iin
                 WHERE date(ml.enter_date) BETWEEN ?1 AND ?2 AND m.supplier = ?3",
            )
            .bind(SEED_MONTH_START)
            .bind(SEED_MONTH_END)
            .bind(seed.supplier)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}: worked time", seed.supplier), worked == seed.worked_seconds));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows, leaving anything else in place.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for seed in SEED_SUPPLIERS {
            sqlx::query(
                "DELETE FROM merchandiser_log WHERE (merchant_id, iin) IN
                     (SELECT merchant_id, iin FROM merchandiser WHERE supplier = ?1)",
            )
            .bind(seed.supplier)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM merchandiser WHERE supplier = ?1")
                .bind(seed.supplier)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM merch_fix WHERE supplier = ?1")
                .bind(seed.supplier)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedSupplierContract {
    supplier: &'static str,
    planned_fte: f64,
    merchandisers: i64,
    worked_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub suppliers_seeded: Vec<&'static str>,
    pub plan_rows: i64,
    pub shift_rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
