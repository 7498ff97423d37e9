// src/cache.rs

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    time::Duration,
};
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// 有界缓存: 超出容量时淘汰最早插入的条目，可选过期时间。
///
/// 时间取自 `tokio::time::Instant`，测试中可以用暂停的时钟推进。
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: VecDeque<K>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    /// 命中过期条目时顺手删除
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = self.entries.get(key).is_some_and(|e| self.is_expired(e));
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_evicts_oldest_insertion() {
        let mut cache = TtlCache::new(2, None);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_reinsert_refreshes_position() {
        let mut cache = TtlCache::new(2, None);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert!(cache.get(&"b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_dropped_on_read() {
        let mut cache = TtlCache::new(8, Some(Duration::from_secs(300)));
        cache.insert("page", vec![1, 2, 3]);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.contains(&"page"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&"page").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = TtlCache::new(4, None);
        cache.insert(1, "x");
        cache.insert(2, "y");
        assert_eq!(cache.remove(&1), Some("x"));
        assert_eq!(cache.remove(&1), None);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
