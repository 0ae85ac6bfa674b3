//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use sqlx::FromRow;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Bus, BusId, DepartureTime, FavoriteBusEntry, FavoriteStop, FavoriteStopEntry, NewReminder,
    NewUser, Reminder, RouteStop, ScheduledDeparture, Stop, StopId, UnknownRole, UserId,
    UserRecord,
};

use super::{
    FavoriteRepository, ReminderRepository, StoreError, TransitRepository, UserRepository,
};

/// Store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        info!("database migrations applied");
        Ok(())
    }
}

fn stop_id(raw: String) -> Result<StopId, StoreError> {
    StopId::try_from(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn bus_id(raw: String) -> Result<BusId, StoreError> {
    BusId::try_from(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row
                .role
                .parse()
                .map_err(|e: UnknownRole| StoreError::Corrupt(e.to_string()))?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct StopRow {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    description: Option<String>,
}

impl TryFrom<StopRow> for Stop {
    type Error = StoreError;

    fn try_from(row: StopRow) -> Result<Self, Self::Error> {
        Ok(Stop {
            id: stop_id(row.id)?,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct DepartureRow {
    onibus_id: String,
    onibus_nome: String,
    onibus_codigo: String,
    horario: NaiveTime,
}

impl TryFrom<DepartureRow> for ScheduledDeparture {
    type Error = StoreError;

    fn try_from(row: DepartureRow) -> Result<Self, Self::Error> {
        Ok(ScheduledDeparture {
            bus_id: bus_id(row.onibus_id)?,
            bus_name: row.onibus_nome,
            bus_code: row.onibus_codigo,
            departure_time: DepartureTime::new(row.horario),
        })
    }
}

#[derive(FromRow)]
struct RouteRow {
    stop_sequence: i32,
    stop_id: String,
    stop_name: String,
    stop_description: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RouteRow> for RouteStop {
    type Error = StoreError;

    fn try_from(row: RouteRow) -> Result<Self, Self::Error> {
        Ok(RouteStop {
            stop_sequence: row.stop_sequence,
            stop_id: stop_id(row.stop_id)?,
            stop_name: row.stop_name,
            stop_description: row.stop_description,
            latitude: row.latitude,
            longitude: row.longitude,
        })
    }
}

#[derive(FromRow)]
struct FavoriteStopRow {
    id: i64,
    user_id: Uuid,
    stop_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FavoriteStopRow> for FavoriteStop {
    type Error = StoreError;

    fn try_from(row: FavoriteStopRow) -> Result<Self, Self::Error> {
        Ok(FavoriteStop {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            stop_id: stop_id(row.stop_id)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct FavoriteStopEntryRow {
    id: i64,
    stop_id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FavoriteStopEntryRow> for FavoriteStopEntry {
    type Error = StoreError;

    fn try_from(row: FavoriteStopEntryRow) -> Result<Self, Self::Error> {
        Ok(FavoriteStopEntry {
            id: row.id,
            stop: Stop {
                id: stop_id(row.stop_id)?,
                name: row.name,
                latitude: row.latitude,
                longitude: row.longitude,
                description: row.description,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct FavoriteBusRow {
    onibus_id: String,
    nome: String,
    codigo: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FavoriteBusRow> for FavoriteBusEntry {
    type Error = StoreError;

    fn try_from(row: FavoriteBusRow) -> Result<Self, Self::Error> {
        Ok(FavoriteBusEntry {
            bus: Bus {
                id: bus_id(row.onibus_id)?,
                name: row.nome,
                code: row.codigo,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ReminderRow {
    id: i64,
    user_id: Uuid,
    ponto_id: String,
    ponto_nome: String,
    onibus_id: String,
    onibus_nome: String,
    onibus_codigo: String,
    horario: NaiveTime,
    reminder_datetime: NaiveDateTime,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = StoreError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        Ok(Reminder {
            id: row.id,
            user_id: UserId::from_uuid(row.user_id),
            stop_id: stop_id(row.ponto_id)?,
            stop_name: row.ponto_nome,
            bus_id: bus_id(row.onibus_id)?,
            bus_name: row.onibus_nome,
            bus_code: row.onibus_codigo,
            departure_time: DepartureTime::new(row.horario),
            remind_at: row.reminder_datetime,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, role, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let result: Result<UserRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, name, email, password_hash, role, created_at",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Conflict("email"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TransitRepository for PgStore {
    async fn all_stops(&self) -> Result<Vec<Stop>, StoreError> {
        let rows: Vec<StopRow> =
            sqlx::query_as("SELECT id, name, latitude, longitude, description FROM stops")
                .fetch_all(&self.pool)
                .await?;
        convert_all(rows)
    }

    async fn stop_exists(&self, stop: &StopId) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM stops WHERE id = $1)")
            .bind(stop.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn bus_exists(&self, bus: &BusId) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM onibus WHERE id = $1)")
                .bind(bus.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn stop_schedule(&self, stop: &StopId) -> Result<Vec<ScheduledDeparture>, StoreError> {
        let rows: Vec<DepartureRow> = sqlx::query_as(
            "SELECT o.id AS onibus_id, o.nome AS onibus_nome, o.codigo AS onibus_codigo, \
                    st.departure_time AS horario \
             FROM stop_times st \
             JOIN onibus o ON o.id = st.onibus_id \
             WHERE st.stop_id = $1 \
             ORDER BY o.codigo, st.departure_time",
        )
        .bind(stop.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn bus_route(&self, bus: &BusId) -> Result<Vec<RouteStop>, StoreError> {
        let rows: Vec<RouteRow> = sqlx::query_as(
            "SELECT MIN(st.stop_sequence) AS stop_sequence, s.id AS stop_id, \
                    s.name AS stop_name, s.description AS stop_description, \
                    s.latitude, s.longitude \
             FROM stop_times st \
             JOIN stops s ON s.id = st.stop_id \
             WHERE st.onibus_id = $1 \
             GROUP BY s.id, s.name, s.description, s.latitude, s.longitude \
             ORDER BY stop_sequence",
        )
        .bind(bus.as_str())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl FavoriteRepository for PgStore {
    async fn favorite_stops(&self, user: UserId) -> Result<Vec<FavoriteStopEntry>, StoreError> {
        let rows: Vec<FavoriteStopEntryRow> = sqlx::query_as(
            "SELECT f.id, f.stop_id, s.name, s.latitude, s.longitude, s.description, f.created_at \
             FROM favorite_stops f \
             JOIN stops s ON s.id = f.stop_id \
             WHERE f.user_id = $1 \
             ORDER BY f.created_at DESC, f.id DESC",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn add_favorite_stop(
        &self,
        user: UserId,
        stop: &StopId,
    ) -> Result<Option<FavoriteStop>, StoreError> {
        let row: Option<FavoriteStopRow> = sqlx::query_as(
            "INSERT INTO favorite_stops (user_id, stop_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, stop_id) DO NOTHING \
             RETURNING id, user_id, stop_id, created_at",
        )
        .bind(user.as_uuid())
        .bind(stop.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(FavoriteStop::try_from).transpose()
    }

    async fn remove_favorite_stop(&self, user: UserId, stop: &StopId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM favorite_stops WHERE user_id = $1 AND stop_id = $2")
            .bind(user.as_uuid())
            .bind(stop.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn favorite_buses(&self, user: UserId) -> Result<Vec<FavoriteBusEntry>, StoreError> {
        let rows: Vec<FavoriteBusRow> = sqlx::query_as(
            "SELECT o.id AS onibus_id, o.nome, o.codigo, f.created_at \
             FROM favorite_onibus f \
             JOIN onibus o ON o.id = f.onibus_id \
             WHERE f.user_id = $1 \
             ORDER BY o.codigo",
        )
        .bind(user.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn add_favorite_bus(&self, user: UserId, bus: &BusId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO favorite_onibus (user_id, onibus_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, onibus_id) DO NOTHING",
        )
        .bind(user.as_uuid())
        .bind(bus.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_favorite_bus(&self, user: UserId, bus: &BusId) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM favorite_onibus WHERE user_id = $1 AND onibus_id = $2")
                .bind(user.as_uuid())
                .bind(bus.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

const REMINDER_COLUMNS: &str = "id, user_id, ponto_id, ponto_nome, onibus_id, onibus_nome, \
                                onibus_codigo, horario, reminder_datetime, created_at";

#[async_trait]
impl ReminderRepository for PgStore {
    async fn reminders(&self, user: UserId) -> Result<Vec<Reminder>, StoreError> {
        let sql = format!(
            "SELECT {REMINDER_COLUMNS} FROM lembretes \
             WHERE user_id = $1 ORDER BY reminder_datetime, id"
        );
        let rows: Vec<ReminderRow> = sqlx::query_as(&sql)
            .bind(user.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn create_reminder(&self, reminder: NewReminder) -> Result<Reminder, StoreError> {
        let sql = format!(
            "INSERT INTO lembretes (user_id, ponto_id, ponto_nome, onibus_id, onibus_nome, \
                                    onibus_codigo, horario, reminder_datetime) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {REMINDER_COLUMNS}"
        );
        let row: ReminderRow = sqlx::query_as(&sql)
            .bind(reminder.user_id.as_uuid())
            .bind(reminder.stop_id.as_str())
            .bind(&reminder.stop_name)
            .bind(reminder.bus_id.as_str())
            .bind(&reminder.bus_name)
            .bind(&reminder.bus_code)
            .bind(reminder.departure_time.time())
            .bind(reminder.remind_at)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn delete_reminder(&self, user: UserId, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM lembretes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
