use super::{StoreFuture, StreamStore};
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
enum Data {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug)]
struct Slot {
    data: Data,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process [`StreamStore`] with lazy key expiry and tokio broadcast
/// channels for pub-sub.
pub struct MemoryStreamStore {
    slots: Mutex<HashMap<String, Slot>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    channel_capacity: usize,
}

impl Default for MemoryStreamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            channel_capacity: capacity.max(1),
        }
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut HashMap<String, Slot>) -> T) -> T {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        slots.retain(|_, slot| !slot.is_expired(now));
        f(&mut slots)
    }

    /// Channels whose readers are all gone are dropped before `f` runs.
    fn with_channels<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, broadcast::Sender<String>>) -> T,
    ) -> T {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|_, sender| sender.receiver_count() > 0);
        f(&mut channels)
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.with_channels(|channels| channels.len())
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::Codec(format!("key {key} holds the wrong kind of value"))
    }
}

impl StreamStore for MemoryStreamStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            self.with_slots(|slots| match slots.get(key).map(|slot| &slot.data) {
                None => Ok(None),
                Some(Data::Text(value)) => Ok(Some(value.clone())),
                Some(Data::List(_)) => Err(Self::wrong_type(key)),
            })
        })
    }

    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_slots(|slots| {
                slots.insert(
                    key.to_string(),
                    Slot {
                        data: Data::Text(value.to_string()),
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
            });
            Ok(())
        })
    }

    fn set_nx_ex<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            Ok(self.with_slots(|slots| {
                if slots.contains_key(key) {
                    return false;
                }
                slots.insert(
                    key.to_string(),
                    Slot {
                        data: Data::Text(value.to_string()),
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
                true
            }))
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_slots(|slots| {
                slots.remove(key);
            });
            Ok(())
        })
    }

    fn rpush<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            self.with_slots(|slots| {
                let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
                    data: Data::List(Vec::new()),
                    expires_at: None,
                });
                match &mut slot.data {
                    Data::List(items) => {
                        items.push(value.to_string());
                        Ok(items.len())
                    }
                    Data::Text(_) => Err(Self::wrong_type(key)),
                }
            })
        })
    }

    fn lrange_from<'a>(&'a self, key: &'a str, start: usize) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.with_slots(|slots| match slots.get(key).map(|slot| &slot.data) {
                None => Ok(Vec::new()),
                Some(Data::List(items)) => Ok(items.iter().skip(start).cloned().collect()),
                Some(Data::Text(_)) => Err(Self::wrong_type(key)),
            })
        })
    }

    fn last<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            self.with_slots(|slots| match slots.get(key).map(|slot| &slot.data) {
                None => Ok(None),
                Some(Data::List(items)) => Ok(items.last().cloned()),
                Some(Data::Text(_)) => Err(Self::wrong_type(key)),
            })
        })
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_slots(|slots| {
                if let Some(slot) = slots.get_mut(key) {
                    slot.expires_at = Some(Instant::now() + ttl);
                }
            });
            Ok(())
        })
    }

    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_channels(|channels| {
                if let Some(sender) = channels.get(channel) {
                    // A receiver dropping between the sweep and the send is not an error.
                    let _ = sender.send(payload);
                }
            });
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> StoreFuture<'a, broadcast::Receiver<String>> {
        Box::pin(async move {
            Ok(self.with_channels(|channels| {
                channels
                    .entry(channel.to_string())
                    .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
                    .subscribe()
            }))
        })
    }
}
