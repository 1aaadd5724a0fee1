use redis::AsyncCommands;

use crate::models::{CanonicalEvent, EventId, EventOutcome};
use crate::service::caching::{CacheError, RedisCache};

pub fn outcome_key(id: &EventId) -> String {
    format!("earnings:outcome:{id}")
}

/// Upsert outcomes keyed by event identity; null horizons stay JSON `null`.
pub async fn upsert_outcomes(cache: &RedisCache, outcomes: &[EventOutcome]) -> Result<usize, CacheError> {
    if outcomes.is_empty() {
        return Ok(0);
    }

    let mut conn = cache.connection();
    let mut pipe = redis::pipe();
    for outcome in outcomes {
        let payload = serde_json::to_string(outcome)?;
        pipe.set(outcome_key(&outcome.event), payload).ignore();
    }
    pipe.query_async::<()>(&mut conn).await?;

    Ok(outcomes.len())
}

pub async fn load_outcome(cache: &RedisCache, id: &EventId) -> Result<Option<EventOutcome>, CacheError> {
    let mut conn = cache.connection();
    let stored: Option<String> = conn.get(outcome_key(id)).await?;
    Ok(stored.map(|json| serde_json::from_str(&json)).transpose()?)
}

/// Events that have no stored outcome yet.
pub async fn pending_events(
    cache: &RedisCache,
    events: Vec<CanonicalEvent>,
) -> Result<Vec<CanonicalEvent>, CacheError> {
    let mut conn = cache.connection();
    let mut pending = Vec::new();
    for event in events {
        let exists: bool = conn.exists(outcome_key(&event.id())).await?;
        if !exists {
            pending.push(event);
        }
    }
    Ok(pending)
}
