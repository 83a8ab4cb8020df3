//! Appointment repository and its Redis backend
//!
//! Data model:
//! - appointment:{id} → JSON document
//! - appointments:all → Set of all ids
//! - appointments:status:{status} → Set of ids per status
//! - appointments:student:{id} / appointments:trainer:{id} / appointments:course:{id} → Sets
//!
//! Every write goes through one Lua script so the document and its index
//! entries change together, and so a conditional write can compare the stored
//! status and version inside Redis.

use anyhow::Context;
use async_trait::async_trait;
use classbook_common::{
    Appointment, AppointmentId, AppointmentStatus, CourseId, Error, Result, UserId,
};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

const INDEX_PREFIX: &str = "appointments";

const WRITE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
local expected = ARGV[3]
if expected ~= '' then
  if not current then return -1 end
  local stored = cjson.decode(current)
  if stored.status ~= expected then return 0 end
  if (tonumber(stored.version) or 0) ~= tonumber(ARGV[5]) then return 0 end
end
local id = ARGV[2]
local prefix = ARGV[4]
if current then
  local prev = cjson.decode(current)
  redis.call('SREM', prefix .. ':status:' .. prev.status, id)
  redis.call('SREM', prefix .. ':student:' .. prev.student_id, id)
  redis.call('SREM', prefix .. ':course:' .. prev.course_id, id)
  if type(prev.trainer_id) == 'string' then
    redis.call('SREM', prefix .. ':trainer:' .. prev.trainer_id, id)
  end
end
local next = cjson.decode(ARGV[1])
redis.call('SET', KEYS[1], ARGV[1])
redis.call('SADD', prefix .. ':all', id)
redis.call('SADD', prefix .. ':status:' .. next.status, id)
redis.call('SADD', prefix .. ':student:' .. next.student_id, id)
redis.call('SADD', prefix .. ':course:' .. next.course_id, id)
if type(next.trainer_id) == 'string' then
  redis.call('SADD', prefix .. ':trainer:' .. next.trainer_id, id)
end
return 1
"#;

/// Source of truth for appointment records
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// All records, oldest first
    async fn get_all(&self) -> Result<Vec<Appointment>>;

    /// Fails with `Error::NotFound` if absent
    async fn get_by_id(&self, id: &AppointmentId) -> Result<Appointment>;

    /// Insert or totally replace by id
    async fn upsert(&self, appointment: &Appointment) -> Result<()>;

    async fn find_by_student(&self, student_id: &UserId) -> Result<Vec<Appointment>>;

    async fn find_by_trainer(&self, trainer_id: &UserId) -> Result<Vec<Appointment>>;

    async fn find_by_course(&self, course_id: &CourseId) -> Result<Vec<Appointment>>;

    async fn find_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>>;

    /// Replace the record only if its stored status is still `expected` and
    /// its stored version is still `version`.
    ///
    /// Returns `Ok(false)` when the record moved on, `Error::NotFound` when
    /// it is gone.
    async fn replace_if_current(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        version: u64,
    ) -> Result<bool>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Redis storage backend
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    write_script: Script,
}

impl RedisStorage {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            write_script: Script::new(WRITE_SCRIPT),
        })
    }

    /// A handle on the shared multiplexed connection
    pub(crate) fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    fn record_key(id: &AppointmentId) -> String {
        format!("appointment:{}", id)
    }

    /// Run the write script; `expected` is the status and version to compare
    async fn write(
        &self,
        appointment: &Appointment,
        expected: Option<(AppointmentStatus, u64)>,
    ) -> Result<i64> {
        let json = serde_json::to_string(appointment)?;
        let mut conn = self.connection();
        let (status, version) = match expected {
            Some((status, version)) => (status.as_str(), version),
            None => ("", 0),
        };

        let outcome: i64 = self
            .write_script
            .key(Self::record_key(&appointment.id))
            .arg(json)
            .arg(appointment.id.as_str())
            .arg(status)
            .arg(INDEX_PREFIX)
            .arg(version)
            .invoke_async(&mut conn)
            .await?;

        Ok(outcome)
    }

    async fn load_index(&self, index_key: &str) -> Result<Vec<Appointment>> {
        let mut conn = self.connection();
        let ids: Vec<String> = conn.smembers(index_key).await?;
        self.load_many(&ids).await
    }

    async fn load_many(&self, ids: &[String]) -> Result<Vec<Appointment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids
            .iter()
            .map(|id| Self::record_key(&AppointmentId::new(id.as_str())))
            .collect();

        let mut conn = self.connection();
        let documents: Vec<Option<String>> = conn.mget(&keys).await?;

        let mut appointments = documents
            .into_iter()
            .flatten()
            .map(|data| serde_json::from_str::<Appointment>(&data))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        appointments.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(appointments)
    }
}

#[async_trait]
impl AppointmentRepository for RedisStorage {
    async fn get_all(&self) -> Result<Vec<Appointment>> {
        self.load_index(&format!("{}:all", INDEX_PREFIX)).await
    }

    async fn get_by_id(&self, id: &AppointmentId) -> Result<Appointment> {
        let mut conn = self.connection();
        let json: Option<String> = conn.get(Self::record_key(id)).await?;

        match json {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(Error::not_found("appointment", id)),
        }
    }

    async fn upsert(&self, appointment: &Appointment) -> Result<()> {
        self.write(appointment, None).await?;
        debug!(
            "Stored appointment: {} status: {}",
            appointment.id, appointment.status
        );
        Ok(())
    }

    async fn find_by_student(&self, student_id: &UserId) -> Result<Vec<Appointment>> {
        self.load_index(&format!("{}:student:{}", INDEX_PREFIX, student_id))
            .await
    }

    async fn find_by_trainer(&self, trainer_id: &UserId) -> Result<Vec<Appointment>> {
        self.load_index(&format!("{}:trainer:{}", INDEX_PREFIX, trainer_id))
            .await
    }

    async fn find_by_course(&self, course_id: &CourseId) -> Result<Vec<Appointment>> {
        self.load_index(&format!("{}:course:{}", INDEX_PREFIX, course_id))
            .await
    }

    async fn find_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>> {
        self.load_index(&format!("{}:status:{}", INDEX_PREFIX, status))
            .await
    }

    async fn replace_if_current(
        &self,
        appointment: &Appointment,
        expected: AppointmentStatus,
        version: u64,
    ) -> Result<bool> {
        match self.write(appointment, Some((expected, version))).await? {
            1 => {
                debug!(
                    "Updated appointment: {} {} -> {}",
                    appointment.id, expected, appointment.status
                );
                Ok(true)
            }
            0 => Ok(false),
            _ => Err(Error::not_found("appointment", &appointment.id)),
        }
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
