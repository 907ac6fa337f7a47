use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use std::env;

fn session_key(user_id: &str) -> String {
    format!("session:{}", user_id)
}

fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

fn describe(context: &str, e: RedisError) -> String {
    format!("{}: {}", context, e)
}

/// Holds the multiplexed connection handed out to services
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    /// Connect using `REDIS_URL`, falling back to a local instance
    pub async fn init() -> Result<Self, String> {
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let client =
            Client::open(redis_url).map_err(|e| describe("Failed to create Redis client", e))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| describe("Failed to connect to Redis", e))?;

        log::info!("Connected successfully to Redis");

        Ok(Self { connection })
    }

    pub fn get_connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

/// Session records and rate-limit counters.
///
/// A live session is a pair of keys sharing the session TTL:
/// `session:{user_id}` holds the user's newest token, and `token:{token}`
/// maps back to the user id for request validation. The reverse key is what
/// makes revocation-by-scan possible after a password reset.
#[derive(Clone)]
pub struct RedisService {
    connection: MultiplexedConnection,
}

impl RedisService {
    pub fn new(client: &RedisClient) -> Self {
        Self {
            connection: client.get_connection(),
        }
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// Record a freshly minted token as the user's current session
    pub async fn store_session(
        &self,
        user_id: &str,
        token: &str,
        expiry_seconds: u64,
    ) -> Result<(), String> {
        let mut conn = self.conn();

        conn.set_ex::<_, _, ()>(session_key(user_id), token, expiry_seconds)
            .await
            .map_err(|e| describe("Failed to store session", e))?;
        conn.set_ex::<_, _, ()>(token_key(token), user_id, expiry_seconds)
            .await
            .map_err(|e| describe("Failed to store token mapping", e))?;

        Ok(())
    }

    /// Resolve a presented token to the user id it was issued for
    pub async fn validate_session(&self, token: &str) -> Result<Option<String>, String> {
        self.conn()
            .get(token_key(token))
            .await
            .map_err(|e| describe("Failed to validate session", e))
    }

    /// The token currently recorded for a user, if any
    pub async fn get_session(&self, user_id: &str) -> Result<Option<String>, String> {
        self.conn()
            .get(session_key(user_id))
            .await
            .map_err(|e| describe("Failed to get session", e))
    }

    /// Drop a user's current session (logout)
    pub async fn invalidate_session(&self, user_id: &str) -> Result<(), String> {
        let mut conn = self.conn();

        // The reverse lookup goes first so the token stops validating even
        // if the second delete fails
        if let Some(token) = self.get_session(user_id).await? {
            conn.del::<_, ()>(token_key(&token))
                .await
                .map_err(|e| describe("Failed to delete token", e))?;
        }

        conn.del::<_, ()>(session_key(user_id))
            .await
            .map_err(|e| describe("Failed to delete session", e))?;

        Ok(())
    }

    /// Revoke every live session for a user by scanning the token keyspace.
    /// Runs after a password reset so tokens other than the one recorded
    /// under `session:{user_id}` stop working too.
    pub async fn invalidate_all_sessions(&self, user_id: &str) -> Result<(), String> {
        let mut conn = self.conn();

        let mut token_keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> = conn
                .scan_match("token:*")
                .await
                .map_err(|e| describe("Failed to scan sessions", e))?;
            while let Some(key) = iter.next_item().await {
                token_keys.push(key);
            }
        }

        for key in token_keys {
            let owner: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| describe("Failed to read session owner", e))?;
            if owner.as_deref() == Some(user_id) {
                conn.del::<_, ()>(&key)
                    .await
                    .map_err(|e| describe("Failed to delete token", e))?;
            }
        }

        conn.del::<_, ()>(session_key(user_id))
            .await
            .map_err(|e| describe("Failed to delete session", e))?;

        Ok(())
    }

    /// Bump a rate-limit counter, starting the window on first use
    pub async fn rate_limit_increment(
        &self,
        key: &str,
        window_seconds: u64,
    ) -> Result<u64, String> {
        let mut conn = self.conn();
        let rate_key = format!("ratelimit:{}", key);

        let count: u64 = conn
            .incr(&rate_key, 1)
            .await
            .map_err(|e| describe("Failed to increment rate limit", e))?;

        if count == 1 {
            conn.expire::<_, ()>(&rate_key, window_seconds as i64)
                .await
                .map_err(|e| describe("Failed to set rate limit expiry", e))?;
        }

        Ok(count)
    }

    /// True once a caller has gone past `max_requests` in the current window
    pub async fn is_rate_limited(
        &self,
        key: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> Result<bool, String> {
        let count = self.rate_limit_increment(key, window_seconds).await?;
        Ok(count > max_requests)
    }
}

/// Convenience function to connect to Redis
pub async fn connect_to_redis() -> Result<RedisClient, String> {
    RedisClient::init().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_are_namespaced() {
        assert_eq!(session_key("abc"), "session:abc");
        assert_eq!(token_key("xyz"), "token:xyz");
    }
}
