use chrono::{Datelike, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct StatusCounts {
    pub submitted: i64,
    pub under_review: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub submitted: i64,
    pub approved: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_institutions: i64,
    pub total_users: i64,
    pub total_applications: i64,
    pub total_documents: i64,
    pub active_templates: i64,
    pub applications_by_status: StatusCounts,
    pub institutions_by_type: Vec<(String, i64)>,
    pub users_by_role: Vec<(String, i64)>,
    pub monthly_applications: Vec<MonthlyCount>,
}

pub struct StatsService {
    pool: PgPool,
}

impl StatsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Aggregate counts for the admin dashboard; independent counts run
    /// concurrently.
    pub async fn dashboard(&self) -> Result<DashboardStats, ApiError> {
        let (total_institutions, total_users, total_applications, total_documents, active_templates) =
            tokio::try_join!(
                self.count("SELECT COUNT(*) FROM institutions"),
                self.count("SELECT COUNT(*) FROM users"),
                self.count("SELECT COUNT(*) FROM applications"),
                self.count("SELECT COUNT(*) FROM documents"),
                self.count("SELECT COUNT(*) FROM parameter_templates WHERE is_active"),
            )?;

        let (by_status, institutions_by_type, users_by_role, monthly_applications) = tokio::try_join!(
            self.applications_by_status(),
            self.grouped("SELECT institution_type, COUNT(*) FROM institutions GROUP BY institution_type"),
            self.grouped("SELECT role, COUNT(*) FROM users GROUP BY role"),
            self.monthly_applications(),
        )?;

        Ok(DashboardStats {
            total_institutions,
            total_users,
            total_applications,
            total_documents,
            active_templates,
            applications_by_status: by_status,
            institutions_by_type,
            users_by_role,
            monthly_applications,
        })
    }

    /// Public-facing summary exposed on the central repository surface.
    pub async fn public_summary(&self) -> Result<serde_json::Value, ApiError> {
        let (total_institutions, universities, colleges, approved) = tokio::try_join!(
            self.count("SELECT COUNT(*) FROM institutions"),
            self.count("SELECT COUNT(*) FROM institutions WHERE institution_type = 'university'"),
            self.count("SELECT COUNT(*) FROM institutions WHERE institution_type = 'college'"),
            self.count("SELECT COUNT(*) FROM applications WHERE status = 'approved'"),
        )?;

        Ok(serde_json::json!({
            "total_institutions": total_institutions,
            "universities": universities,
            "colleges": colleges,
            "approved_applications": approved,
        }))
    }

    async fn count(&self, query: &str) -> Result<i64, ApiError> {
        let (count,): (i64,) = sqlx::query_as(query).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn grouped(&self, query: &str) -> Result<Vec<(String, i64)>, ApiError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(query).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn applications_by_status(&self) -> Result<StatusCounts, ApiError> {
        let rows = self
            .grouped("SELECT status, COUNT(*) FROM applications GROUP BY status")
            .await?;
        let mut counts = StatusCounts {
            submitted: 0,
            under_review: 0,
            approved: 0,
            rejected: 0,
        };
        for (status, count) in rows {
            match status.as_str() {
                "submitted" => counts.submitted = count,
                "under_review" => counts.under_review = count,
                "approved" => counts.approved = count,
                "rejected" => counts.rejected = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Last 12 calendar months of submissions and approvals, oldest first.
    /// Months with no applications still appear with zero counts.
    async fn monthly_applications(&self) -> Result<Vec<MonthlyCount>, ApiError> {
        let since = Utc::now() - Duration::days(366);
        let rows: Vec<(i32, i32, i64, i64)> = sqlx::query_as(
            "SELECT EXTRACT(YEAR FROM submitted_at)::int, EXTRACT(MONTH FROM submitted_at)::int, \
                    COUNT(*), COUNT(*) FILTER (WHERE status = 'approved') \
             FROM applications \
             WHERE submitted_at >= $1 \
             GROUP BY 1, 2",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let mut series = Vec::with_capacity(12);
        for offset in (0..12).rev() {
            let mut year = now.year();
            let mut month = now.month() as i32 - offset;
            while month < 1 {
                month += 12;
                year -= 1;
            }
            let (submitted, approved) = rows
                .iter()
                .find(|(y, m, _, _)| *y == year && *m == month)
                .map(|(_, _, s, a)| (*s, *a))
                .unwrap_or((0, 0));
            series.push(MonthlyCount {
                month: format!("{:04}-{:02}", year, month),
                submitted,
                approved,
            });
        }
        Ok(series)
    }
}
