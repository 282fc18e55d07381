use crate::syncthing::EventSource;
use crate::watcher::accumulator::RemoteEvent;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// An event as returned by `/rest/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEventKind {
    /// Remote changes were announced; more item events are likely to follow.
    SyncStarting,
    ItemStarted,
    ItemFinished,
    ConfigurationChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncthingEvent {
    /// Empty for configuration changes.
    pub folder: String,
    /// Empty unless the kind is an item event.
    pub item: String,
    pub kind: RemoteEventKind,
}

impl SyncthingEvent {
    /// Decodes the event kinds we care about; everything else is `None`.
    pub fn decode(raw: &RawEvent) -> Option<Self> {
        let kind = match raw.kind.as_str() {
            "RemoteIndexUpdated" => RemoteEventKind::SyncStarting,
            "ItemStarted" => RemoteEventKind::ItemStarted,
            "ItemFinished" => RemoteEventKind::ItemFinished,
            "ConfigSaved" => {
                return Some(SyncthingEvent {
                    folder: String::new(),
                    item: String::new(),
                    kind: RemoteEventKind::ConfigurationChanged,
                });
            }
            _ => return None,
        };

        let field = |name: &str| raw.data.get(name).and_then(|v| v.as_str());
        let folder = field("folder")?.to_string();
        let item = match kind {
            RemoteEventKind::SyncStarting => String::new(),
            _ => field("item")?.to_string(),
        };

        Some(SyncthingEvent { folder, item, kind })
    }

    /// The accumulator input for this event, if it concerns a folder.
    pub fn to_remote(&self) -> Option<RemoteEvent> {
        match self.kind {
            RemoteEventKind::SyncStarting => Some(RemoteEvent::sync_starting()),
            RemoteEventKind::ItemStarted => Some(RemoteEvent::started(self.item.clone())),
            RemoteEventKind::ItemFinished => Some(RemoteEvent::finished(self.item.clone())),
            RemoteEventKind::ConfigurationChanged => None,
        }
    }
}

/// Long-polls an [`EventSource`], remembering the last seen event id.
pub struct EventPoller<E: EventSource + ?Sized> {
    source: Arc<E>,
    last_seen: u64,
    retry_after: Duration,
}

impl<E: EventSource + ?Sized> EventPoller<E> {
    pub fn new(source: Arc<E>, retry_after: Duration) -> Self {
        EventPoller {
            source,
            last_seen: 0,
            retry_after,
        }
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// Fetches and decodes the next batch. On failure Syncthing has most likely
    /// restarted, so the cursor is reset and an empty batch returned after a pause.
    pub async fn next_batch(&mut self) -> Vec<SyncthingEvent> {
        trace!(since = self.last_seen, "requesting syncthing events");
        let events = match self.source.events(self.last_seen).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "resetting event stream");
                self.last_seen = 0;
                tokio::time::sleep(self.retry_after).await;
                return Vec::new();
            }
        };

        if let Some(last) = events.last() {
            self.last_seen = last.id;
        }

        events
            .iter()
            .filter_map(|raw| {
                let decoded = SyncthingEvent::decode(raw);
                if decoded.is_none() {
                    trace!(id = raw.id, kind = %raw.kind, "skipping event");
                } else {
                    debug!(id = raw.id, kind = %raw.kind, "syncthing event");
                }
                decoded
            })
            .collect()
    }
}
