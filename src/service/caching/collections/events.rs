use redis::AsyncCommands;

use crate::models::{CanonicalEvent, EventId};
use crate::service::caching::{CacheError, RedisCache};

pub const EVENT_SET_KEY: &str = "earnings:events";

const EVENT_KEY_PREFIX: &str = "earnings:event:";

pub fn event_key(id: &EventId) -> String {
    format!("{EVENT_KEY_PREFIX}{id}")
}

/// Upsert canonical events keyed by (ticker, effective date). Re-running with
/// fresh input overwrites the stored event instead of adding a second one.
pub async fn upsert_events(cache: &RedisCache, events: &[CanonicalEvent]) -> Result<usize, CacheError> {
    if events.is_empty() {
        return Ok(0);
    }

    let mut conn = cache.connection();
    let mut pipe = redis::pipe();
    for event in events {
        let id = event.id();
        let payload = serde_json::to_string(event)?;
        pipe.set(event_key(&id), payload)
            .ignore()
            .sadd(EVENT_SET_KEY, id.to_string())
            .ignore();
    }
    pipe.query_async::<()>(&mut conn).await?;

    Ok(events.len())
}

/// Load every stored event, ordered by identity.
pub async fn load_events(cache: &RedisCache) -> Result<Vec<CanonicalEvent>, CacheError> {
    let mut conn = cache.connection();
    let mut ids: Vec<String> = conn.smembers(EVENT_SET_KEY).await?;
    ids.sort();

    let mut events = Vec::with_capacity(ids.len());
    for id in ids {
        let stored: Option<String> = conn.get(format!("{EVENT_KEY_PREFIX}{id}")).await?;
        match stored {
            Some(json) => events.push(serde_json::from_str(&json)?),
            None => {
                // Index entry without a payload; drop it from the set.
                let _: () = conn.srem(EVENT_SET_KEY, &id).await?;
            }
        }
    }

    Ok(events)
}
