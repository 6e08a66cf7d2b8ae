use redis::{aio::MultiplexedConnection, Client};
use tracing::warn;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(RedisClient { conn })
    }

    /// SET key 1 EX ttl NX: true, если лок достался именно этому вызову.
    pub async fn acquire_lock(&self, key: &str, ttl_seconds: u64) -> redis::RedisResult<bool> {
        let mut conn = self.conn.clone();
        let res: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("EX")
            .arg(ttl_seconds)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(res.is_some())
    }

    // Безусловный DEL: токена владения нет, см. DESIGN.md
    pub async fn release_lock(&self, key: &str) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(key).query_async(&mut conn).await
    }

    /// Захват лока в форме скоуп-гарда. None - ключ уже занят.
    pub async fn try_lock(
        &self,
        key: &str,
        ttl_seconds: u64,
    ) -> redis::RedisResult<Option<SeatLock>> {
        if self.acquire_lock(key, ttl_seconds).await? {
            Ok(Some(SeatLock {
                key: key.to_string(),
                conn: self.conn.clone(),
            }))
        } else {
            Ok(None)
        }
    }
}

/// Гард distributed lock'а: ключ удаляется на любом пути выхода,
/// включая ранний `?` внутри транзакции под локом.
pub struct SeatLock {
    key: String,
    conn: MultiplexedConnection,
}

impl SeatLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Явное освобождение с ожиданием DEL на нормальном пути.
    pub async fn release(mut self) {
        let key = std::mem::take(&mut self.key);
        let mut conn = self.conn.clone();
        let res: redis::RedisResult<()> = redis::cmd("DEL").arg(&key).query_async(&mut conn).await;
        if let Err(e) = res {
            warn!("failed to release seat lock {}: {}", key, e);
        }
        // Drop увидит пустой ключ и ничего не сделает
    }
}

impl Drop for SeatLock {
    fn drop(&mut self) {
        if self.key.is_empty() {
            return;
        }
        let key = std::mem::take(&mut self.key);
        let mut conn = self.conn.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let res: redis::RedisResult<()> =
                    redis::cmd("DEL").arg(&key).query_async(&mut conn).await;
                if let Err(e) = res {
                    warn!("failed to release seat lock {}: {}", key, e);
                }
            });
        }
    }
}
