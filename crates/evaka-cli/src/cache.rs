use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use evaka_core::{CalendarEvent, CalendarSnapshot, Municipality};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

const EVENTS_CACHE: &str = "events";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }
}

/// Human-readable age: "just now", "5m ago", "2h ago", "3d ago"
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// The last published event set of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEvents {
    pub municipality: Municipality,
    pub username: String,
    pub events: Vec<CalendarEvent>,
}

impl CachedEvents {
    fn belongs_to(&self, municipality: Municipality, username: &str) -> bool {
        self.municipality == municipality && self.username == username
    }
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, cached: &CachedData<T>) -> Result<()> {
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(cached)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    pub fn load_events(&self) -> Result<Option<CachedData<CachedEvents>>> {
        self.load(EVENTS_CACHE)
    }

    /// Save the snapshot's events for `username`, stamped with their fetch
    /// time. Snapshots that never had a successful fetch are not written.
    pub fn save_snapshot(&self, snapshot: &CalendarSnapshot, username: &str) -> Result<()> {
        let Some(fetched_at) = snapshot.last_success else {
            return Ok(());
        };
        let cached = CachedData::new(
            CachedEvents {
                municipality: snapshot.municipality,
                username: username.to_string(),
                events: snapshot.events.clone(),
            },
            fetched_at,
        );
        self.save(EVENTS_CACHE, &cached)
    }

    /// Starting snapshot for an account: cached events when the cache
    /// belongs to the same municipality and username, otherwise empty.
    pub fn restore_snapshot(&self, municipality: Municipality, username: &str) -> CalendarSnapshot {
        match self.load_events() {
            Ok(Some(cached)) if cached.data.belongs_to(municipality, username) => {
                debug!(
                    events = cached.data.events.len(),
                    age = %cached.age_display(),
                    "Restored cached events"
                );
                CalendarSnapshot::restored(municipality, cached.data.events, cached.cached_at)
            }
            Ok(_) => CalendarSnapshot::new(municipality),
            Err(e) => {
                debug!(error = %e, "Ignoring unreadable event cache");
                CalendarSnapshot::new(municipality)
            }
        }
    }
}
