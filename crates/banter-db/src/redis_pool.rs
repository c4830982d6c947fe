//! Redis command helpers.
//!
//! Thin wrappers so repositories read as a sequence of named operations.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Set a key with expiration.
pub async fn set_ex(
    conn: &mut ConnectionManager,
    key: &str,
    value: &str,
    ttl_secs: u64,
) -> Result<(), redis::RedisError> {
    conn.set_ex(key, value, ttl_secs).await
}

/// Get a value by key.
pub async fn get(conn: &mut ConnectionManager, key: &str) -> Result<Option<String>, redis::RedisError> {
    conn.get(key).await
}

/// Get a value and delete its key in one atomic step (`GETDEL`, Redis >= 6.2).
pub async fn get_del(
    conn: &mut ConnectionManager,
    key: &str,
) -> Result<Option<String>, redis::RedisError> {
    let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(conn).await?;
    Ok(value)
}

/// Fetch many values at once. The result lines up index-for-index with `keys`.
pub async fn mget(
    conn: &mut ConnectionManager,
    keys: &[String],
) -> Result<Vec<Option<String>>, redis::RedisError> {
    let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(conn).await?;
    Ok(values)
}

/// One `SCAN` step. Returns the next cursor (0 once the iteration is complete) and a batch
/// of matching keys. `count` is a hint to Redis, not a limit; batches may repeat keys.
pub async fn scan_match(
    conn: &mut ConnectionManager,
    cursor: u64,
    pattern: &str,
    count: usize,
) -> Result<(u64, Vec<String>), redis::RedisError> {
    let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(pattern)
        .arg("COUNT")
        .arg(count.max(1))
        .query_async(conn)
        .await?;
    Ok((next, keys))
}

/// Whether Redis answers `PING`.
pub async fn ping(conn: &mut ConnectionManager) -> bool {
    let pong: Result<String, _> = redis::cmd("PING").query_async(conn).await;
    pong.is_ok()
}
