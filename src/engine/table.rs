//! Bounded id -> Stream mapping with LRU eviction.

use std::collections::{HashMap, VecDeque};

use super::stream::{NewStream, Stream};

/// Outcome of a `get_or_create` call.
pub struct GetOrCreateOutcome {
    pub created: bool,
    /// Id of a stream evicted to make room, if any.
    pub evicted: Option<String>,
}

/// Bounded id -> Stream mapping. Recency is tracked with a plain `VecDeque`
/// and a retain-based touch; at MAX_STREAMS ~= 1000 this is fast enough and
/// far simpler than an intrusive linked-hashmap.
pub struct StreamTable {
    streams: HashMap<String, Stream>,
    recency: VecDeque<String>,
    max_streams: usize,
    max_messages_per_stream: usize,
}

impl StreamTable {
    pub fn new(max_streams: usize, max_messages_per_stream: usize) -> Self {
        Self {
            streams: HashMap::new(),
            recency: VecDeque::new(),
            max_streams,
            max_messages_per_stream,
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Stream> {
        self.streams.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.streams.contains_key(id)
    }

    /// Mark `id` as most-recently-used. No-op if absent.
    pub fn touch(&mut self, id: &str) {
        if self.streams.contains_key(id) {
            self.recency.retain(|x| x != id);
            self.recency.push_back(id.to_string());
        }
    }

    /// Return the existing stream's id if present (after touching it), or
    /// create it with `defaults`, evicting the least-recently-used stream if
    /// the table is already at capacity.
    pub fn get_or_create(&mut self, id: &str, defaults: NewStream) -> GetOrCreateOutcome {
        if self.streams.contains_key(id) {
            self.touch(id);
            return GetOrCreateOutcome {
                created: false,
                evicted: None,
            };
        }

        let evicted = if self.streams.len() >= self.max_streams {
            self.evict_lru()
        } else {
            None
        };

        self.streams.insert(
            id.to_string(),
            Stream::new(id.to_string(), defaults, self.max_messages_per_stream),
        );
        self.recency.push_back(id.to_string());

        GetOrCreateOutcome {
            created: true,
            evicted,
        }
    }

    /// Explicitly register a stream (used by `POST /streams`); fails if the
    /// id already exists.
    pub fn create(&mut self, id: &str, defaults: NewStream) -> Result<Option<String>, ()> {
        if self.streams.contains_key(id) {
            return Err(());
        }
        let evicted = if self.streams.len() >= self.max_streams {
            self.evict_lru()
        } else {
            None
        };
        self.streams.insert(
            id.to_string(),
            Stream::new(id.to_string(), defaults, self.max_messages_per_stream),
        );
        self.recency.push_back(id.to_string());
        Ok(evicted)
    }

    fn evict_lru(&mut self) -> Option<String> {
        while let Some(candidate) = self.recency.pop_front() {
            if self.streams.remove(&candidate).is_some() {
                return Some(candidate);
            }
        }
        None
    }

    /// Remove a stream without any eviction bookkeeping (used by the reaper).
    pub fn delete(&mut self, id: &str) -> Option<Stream> {
        self.recency.retain(|x| x != id);
        self.streams.remove(id)
    }

    /// All stream ids currently idle longer than their TTL, as of `now`.
    pub fn expired_ids(&self, now: i64) -> Vec<String> {
        self.streams
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.streams.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn defaults() -> NewStream {
        NewStream::auto_created(Duration::from_secs(3600))
    }

    #[test]
    fn get_or_create_creates_once() {
        let mut t = StreamTable::new(10, 10);
        let out = t.get_or_create("a", defaults());
        assert!(out.created);
        assert!(out.evicted.is_none());
        let out2 = t.get_or_create("a", defaults());
        assert!(!out2.created);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let mut t = StreamTable::new(2, 10);
        t.get_or_create("a", defaults());
        t.get_or_create("b", defaults());
        // touch a so b is least-recently-used
        t.touch("a");
        let out = t.get_or_create("c", defaults());
        assert!(out.created);
        assert_eq!(out.evicted, Some("b".to_string()));
        assert!(t.contains("a"));
        assert!(t.contains("c"));
        assert!(!t.contains("b"));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn create_fails_on_collision() {
        let mut t = StreamTable::new(10, 10);
        t.create("a", defaults()).unwrap();
        assert!(t.create("a", defaults()).is_err());
    }

    #[test]
    fn delete_removes_from_recency() {
        let mut t = StreamTable::new(10, 10);
        t.get_or_create("a", defaults());
        assert!(t.delete("a").is_some());
        assert!(!t.contains("a"));
        // Evicting after delete should not resurrect "a"
        t.get_or_create("b", defaults());
        assert_eq!(t.len(), 1);
    }
}
