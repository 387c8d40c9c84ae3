use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

use crate::domain::{
    MatchAggregate, MatchStatus, PredictionAggregate, Score, UserAggregate, UserStats,
};
use crate::error::{CoreError, CoreResult};
use crate::event_sourcing::core::Watermark;
use super::rows::{MatchRow, PredictionRow, UserRow};
use super::store::{MatchFilters, PredictionFilters, ReadModelStore};

// ============================================================================
// PostgreSQL Read Model
// ============================================================================
//
// One table per aggregate kind, every row carrying `version` and
// `last_sequence`. Watermark-checked updates lock the row first
// (`SELECT ... FOR UPDATE`) so the check and the write are one step.
//
// ============================================================================

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

/// Column layout of one view table. `id` comes first; the watermark last.
struct ViewTable {
    name: &'static str,
    columns: &'static [&'static str],
}

impl ViewTable {
    fn placeholders(&self) -> String {
        (1..=self.columns.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            self.columns.join(", "),
            self.placeholders()
        )
    }

    /// Insert-or-overwrite; with `monotonic`, a row further along the log wins.
    fn upsert_sql(&self, monotonic: bool) -> String {
        let assignments = self
            .columns
            .iter()
            .skip(1)
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let guard = if monotonic {
            format!(" WHERE {}.last_sequence <= EXCLUDED.last_sequence", self.name)
        } else {
            String::new()
        };
        format!(
            "{} ON CONFLICT (id) DO UPDATE SET {}{}",
            self.insert_sql(),
            assignments,
            guard
        )
    }

    fn select_sql(&self) -> String {
        format!("SELECT {} FROM {}", self.columns.join(", "), self.name)
    }
}

const MATCHES: ViewTable = ViewTable {
    name: "matches_view",
    columns: &[
        "id", "home_team", "away_team", "date", "competition", "status", "home_goals",
        "away_goals", "version", "last_sequence",
    ],
};

const PREDICTIONS: ViewTable = ViewTable {
    name: "predictions_view",
    columns: &[
        "id", "user_id", "match_id", "home_goals", "away_goals", "created_at", "points",
        "awarded_at", "version", "last_sequence",
    ],
};

const USERS: ViewTable = ViewTable {
    name: "users_view",
    columns: &[
        "id", "external_id", "email", "name", "picture", "created_at", "updated_at",
        "is_active", "version", "last_sequence",
    ],
};

fn bind_match<'q>(query: PgQuery<'q>, row: &'q MatchRow) -> PgQuery<'q> {
    let m = &row.data;
    query
        .bind(&m.id)
        .bind(&m.home_team)
        .bind(&m.away_team)
        .bind(m.date)
        .bind(&m.competition)
        .bind(m.status.as_str())
        .bind(m.score.map(|s| s.home_goals))
        .bind(m.score.map(|s| s.away_goals))
        .bind(row.watermark.version)
        .bind(row.watermark.last_sequence)
}

fn bind_prediction<'q>(query: PgQuery<'q>, row: &'q PredictionRow) -> PgQuery<'q> {
    let p = &row.data;
    query
        .bind(&p.id)
        .bind(&p.user_id)
        .bind(&p.match_id)
        .bind(p.home_goals)
        .bind(p.away_goals)
        .bind(p.created_at)
        .bind(p.points)
        .bind(p.awarded_at)
        .bind(row.watermark.version)
        .bind(row.watermark.last_sequence)
}

fn bind_user<'q>(query: PgQuery<'q>, row: &'q UserRow) -> PgQuery<'q> {
    let u = &row.data;
    query
        .bind(&u.id)
        .bind(&u.external_id)
        .bind(&u.email)
        .bind(&u.name)
        .bind(&u.picture)
        .bind(u.created_at)
        .bind(u.updated_at)
        .bind(u.is_active)
        .bind(row.watermark.version)
        .bind(row.watermark.last_sequence)
}

fn watermark_from_row(row: &PgRow) -> Result<Watermark, sqlx::Error> {
    Ok(Watermark {
        version: row.try_get("version")?,
        last_sequence: row.try_get("last_sequence")?,
    })
}

fn match_from_row(row: &PgRow) -> Result<MatchRow, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status: MatchStatus = status
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
    let home_goals: Option<i32> = row.try_get("home_goals")?;
    let away_goals: Option<i32> = row.try_get("away_goals")?;

    Ok(MatchRow {
        data: MatchAggregate {
            id: row.try_get("id")?,
            home_team: row.try_get("home_team")?,
            away_team: row.try_get("away_team")?,
            date: row.try_get("date")?,
            competition: row.try_get("competition")?,
            status,
            score: home_goals.zip(away_goals).map(|(h, a)| Score::new(h, a)),
        },
        watermark: watermark_from_row(row)?,
    })
}

fn prediction_from_row(row: &PgRow) -> Result<PredictionRow, sqlx::Error> {
    Ok(PredictionRow {
        data: PredictionAggregate {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            match_id: row.try_get("match_id")?,
            home_goals: row.try_get("home_goals")?,
            away_goals: row.try_get("away_goals")?,
            created_at: row.try_get("created_at")?,
            points: row.try_get("points")?,
            awarded_at: row.try_get("awarded_at")?,
        },
        watermark: watermark_from_row(row)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<UserRow, sqlx::Error> {
    Ok(UserRow {
        data: UserAggregate {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            picture: row.try_get("picture")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_active: row.try_get("is_active")?,
            // derived from prediction rows on read
            stats: UserStats::default(),
        },
        watermark: watermark_from_row(row)?,
    })
}

pub struct PostgresReadModel {
    pool: PgPool,
}

impl PostgresReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the view and cursor tables if missing.
    pub async fn migrate(&self) -> CoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS matches_view (
                id TEXT PRIMARY KEY,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                date TIMESTAMPTZ NOT NULL,
                competition TEXT NOT NULL,
                status TEXT NOT NULL,
                home_goals INTEGER,
                away_goals INTEGER,
                version BIGINT NOT NULL,
                last_sequence BIGINT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS matches_view_date_idx ON matches_view (date, id)",
            r#"
            CREATE TABLE IF NOT EXISTS predictions_view (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                match_id TEXT NOT NULL,
                home_goals INTEGER NOT NULL,
                away_goals INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                awarded_at TIMESTAMPTZ,
                version BIGINT NOT NULL,
                last_sequence BIGINT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS predictions_view_user_idx ON predictions_view (user_id)",
            "CREATE INDEX IF NOT EXISTS predictions_view_match_idx ON predictions_view (match_id)",
            r#"
            CREATE TABLE IF NOT EXISTS users_view (
                id TEXT PRIMARY KEY,
                external_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                picture TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                is_active BOOLEAN NOT NULL,
                version BIGINT NOT NULL,
                last_sequence BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS projection_cursors (
                consumer TEXT PRIMARY KEY,
                sequence BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Overwrite `id` in `table` only if its stored watermark is `expected`.
    async fn update_checked(
        &self,
        table: &ViewTable,
        id: &str,
        expected: Watermark,
        write: PgQuery<'_>,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT version, last_sequence FROM {} WHERE id = $1 FOR UPDATE",
            table.name
        );
        let stored = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| watermark_from_row(&row))
            .transpose()?;

        match stored {
            None => return Err(CoreError::NotFound(format!("{} row {}", table.name, id))),
            Some(stored) if stored != expected => {
                return Err(CoreError::Conflict {
                    aggregate: format!("{} row {}", table.name, id),
                    expected: expected.version,
                    found: stored.version,
                });
            }
            Some(_) => {}
        }

        write.execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ReadModelStore for PostgresReadModel {
    async fn create_match(&self, row: &MatchRow) -> CoreResult<()> {
        let sql = MATCHES.insert_sql();
        bind_match(sqlx::query(&sql), row).execute(&self.pool).await?;
        Ok(())
    }

    async fn update_match(&self, row: &MatchRow, expected: Watermark) -> CoreResult<()> {
        let sql = MATCHES.upsert_sql(false);
        self.update_checked(&MATCHES, &row.data.id, expected, bind_match(sqlx::query(&sql), row))
            .await
    }

    async fn upsert_match(&self, row: &MatchRow) -> CoreResult<()> {
        let sql = MATCHES.upsert_sql(true);
        bind_match(sqlx::query(&sql), row).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_match(&self, id: &str) -> CoreResult<Option<MatchRow>> {
        let sql = format!("{} WHERE id = $1", MATCHES.select_sql());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| match_from_row(&r)).transpose()?)
    }

    async fn list_matches(&self, filters: &MatchFilters) -> CoreResult<Vec<MatchRow>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("{} WHERE TRUE", MATCHES.select_sql()));
        if let Some(competition) = &filters.competition {
            qb.push(" AND competition = ").push_bind(competition.clone());
        }
        if let Some(start) = filters.start_date {
            qb.push(" AND date >= ").push_bind(start);
        }
        if let Some(end) = filters.end_date {
            qb.push(" AND date <= ").push_bind(end);
        }
        if let Some(status) = filters.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY date, id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(match_from_row).collect::<Result<_, _>>()?)
    }

    async fn create_prediction(&self, row: &PredictionRow) -> CoreResult<()> {
        let sql = PREDICTIONS.insert_sql();
        bind_prediction(sqlx::query(&sql), row).execute(&self.pool).await?;
        Ok(())
    }

    async fn update_prediction(&self, row: &PredictionRow, expected: Watermark) -> CoreResult<()> {
        let sql = PREDICTIONS.upsert_sql(false);
        self.update_checked(
            &PREDICTIONS,
            &row.data.id,
            expected,
            bind_prediction(sqlx::query(&sql), row),
        )
        .await
    }

    async fn upsert_prediction(&self, row: &PredictionRow) -> CoreResult<()> {
        let sql = PREDICTIONS.upsert_sql(true);
        bind_prediction(sqlx::query(&sql), row).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_prediction(&self, id: &str) -> CoreResult<Option<PredictionRow>> {
        let sql = format!("{} WHERE id = $1", PREDICTIONS.select_sql());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| prediction_from_row(&r)).transpose()?)
    }

    async fn list_predictions(&self, filters: &PredictionFilters) -> CoreResult<Vec<PredictionRow>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("{} WHERE TRUE", PREDICTIONS.select_sql()));
        if let Some(user_id) = &filters.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(match_id) = &filters.match_id {
            qb.push(" AND match_id = ").push_bind(match_id.clone());
        }
        qb.push(" ORDER BY created_at, id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(prediction_from_row).collect::<Result<_, _>>()?)
    }

    async fn create_user(&self, row: &UserRow) -> CoreResult<()> {
        let sql = USERS.insert_sql();
        bind_user(sqlx::query(&sql), row).execute(&self.pool).await?;
        Ok(())
    }

    async fn update_user(&self, row: &UserRow, expected: Watermark) -> CoreResult<()> {
        let sql = USERS.upsert_sql(false);
        self.update_checked(&USERS, &row.data.id, expected, bind_user(sqlx::query(&sql), row))
            .await
    }

    async fn upsert_user(&self, row: &UserRow) -> CoreResult<()> {
        let sql = USERS.upsert_sql(true);
        bind_user(sqlx::query(&sql), row).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> CoreResult<Option<UserRow>> {
        let sql = format!("{} WHERE id = $1", USERS.select_sql());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| user_from_row(&r)).transpose()?)
    }

    async fn list_users(&self, active_only: bool) -> CoreResult<Vec<UserRow>> {
        let filter = if active_only { " WHERE is_active" } else { "" };
        let sql = format!("{}{} ORDER BY created_at, id", USERS.select_sql(), filter);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(user_from_row).collect::<Result<_, _>>()?)
    }

    async fn clear(&self) -> CoreResult<()> {
        sqlx::query("TRUNCATE matches_view, predictions_view, users_view, projection_cursors")
            .execute(&self.pool)
            .await?;
        tracing::info!("Cleared PostgreSQL read model");
        Ok(())
    }

    async fn load_cursor(&self, consumer: &str) -> CoreResult<i64> {
        let sequence: Option<i64> =
            sqlx::query_scalar("SELECT sequence FROM projection_cursors WHERE consumer = $1")
                .bind(consumer)
                .fetch_optional(&self.pool)
                .await?;
        Ok(sequence.unwrap_or(0))
    }

    async fn save_cursor(&self, consumer: &str, sequence: i64) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projection_cursors (consumer, sequence, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (consumer) DO UPDATE
            SET sequence = GREATEST(projection_cursors.sequence, EXCLUDED.sequence),
                updated_at = NOW()
            "#,
        )
        .bind(consumer)
        .bind(sequence)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_lists_every_column() {
        let sql = PREDICTIONS.insert_sql();
        assert!(sql.starts_with("INSERT INTO predictions_view (id, user_id, match_id"));
        assert!(sql.ends_with("$9, $10)"));
    }

    #[test]
    fn test_monotonic_upsert_guards_on_last_sequence() {
        let sql = MATCHES.upsert_sql(true);
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE SET home_team = EXCLUDED.home_team"));
        assert!(!sql.contains("id = EXCLUDED.id,"));
        assert!(sql.ends_with("WHERE matches_view.last_sequence <= EXCLUDED.last_sequence"));
    }

    #[test]
    fn test_plain_upsert_has_no_guard() {
        assert!(!USERS.upsert_sql(false).contains("WHERE"));
    }

    #[test]
    fn test_users_view_stores_no_derived_stats() {
        let sql = USERS.insert_sql();
        assert!(sql.ends_with("$9, $10)"));
        assert!(!sql.contains("total_points"));
        assert!(!sql.contains("current_rank"));
    }
}
