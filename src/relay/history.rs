//! 历史存储 - 有界有序的通知历史与未读计数

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record::{now_timestamp, NotificationRecord, RawNotification};

/// 默认历史容量
pub const DEFAULT_CAPACITY: usize = 20;

/// 历史快照 - 展示层只读副本，最新记录在前
#[derive(Debug, Clone, Serialize)]
pub struct HistorySnapshot {
    pub records: Vec<NotificationRecord>,
    pub unread: usize,
    pub total: usize,
}

/// 有界通知历史
///
/// 内部按到达顺序保存（最旧在前）。容量溢出时淘汰最旧记录，
/// 未读计数在每次插入、淘汰、标记操作中增量维护。
#[derive(Debug)]
pub struct HistoryStore {
    records: VecDeque<NotificationRecord>,
    capacity: usize,
    unread: usize,
    next_seq: u64,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            unread: 0,
            next_seq: 1,
        }
    }

    /// 插入一条通知并返回存储后的记录
    ///
    /// 永不失败：缺省字段在归一化阶段已填充，缺失的时间戳在此分配。
    pub fn insert(&mut self, raw: RawNotification) -> NotificationRecord {
        let record = NotificationRecord {
            seq: self.next_seq,
            title: raw.title,
            message: raw.message,
            timestamp: raw.timestamp.unwrap_or_else(now_timestamp),
            read: false,
        };
        self.next_seq += 1;

        self.records.push_back(record.clone());
        self.unread += 1;

        // 超出容量时淘汰最旧记录，未读被淘汰时同步扣减计数
        while self.records.len() > self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                if !evicted.read {
                    self.unread -= 1;
                }
            }
        }

        debug_assert_eq!(self.unread, self.recount_unread());
        record
    }

    /// 标记单条记录已读；幂等，重复标记是空操作
    ///
    /// 记录已被淘汰时返回 false。
    pub fn mark_read(&mut self, seq: u64) -> bool {
        if let Some(record) = self.records.iter_mut().find(|r| r.seq == seq) {
            if !record.read {
                record.read = true;
                self.unread -= 1;
                debug_assert_eq!(self.unread, self.recount_unread());
                return true;
            }
        }
        false
    }

    /// 标记全部已读，返回本次清零的未读数量
    pub fn mark_all_read(&mut self) -> usize {
        let cleared = self.unread;
        for record in self.records.iter_mut() {
            record.read = true;
        }
        self.unread = 0;
        cleared
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 展示层快照（最新在前）
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            records: self.records.iter().rev().cloned().collect(),
            unread: self.unread,
            total: self.records.len(),
        }
    }

    /// 全量重算未读数，用于校验增量计数没有漂移
    fn recount_unread(&self) -> usize {
        self.records.iter().filter(|r| !r.read).count()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// 历史存储共享句柄 - 所有读写的唯一互斥入口
///
/// 总线消费者和展示层回调都经由此句柄串行访问，
/// 锁内只做同步短操作，不允许持锁等待。
#[derive(Debug, Clone)]
pub struct SharedHistory {
    inner: Arc<Mutex<HistoryStore>>,
}

impl SharedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HistoryStore::new(capacity))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HistoryStore> {
        self.inner.lock().expect("history store mutex poisoned")
    }

    pub fn insert(&self, raw: RawNotification) -> NotificationRecord {
        self.lock().insert(raw)
    }

    pub fn mark_read(&self, seq: u64) -> bool {
        self.lock().mark_read(seq)
    }

    pub fn mark_all_read(&self) -> usize {
        self.lock().mark_all_read()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.lock().snapshot()
    }

    /// 当前 (未读, 总数)
    pub fn counts(&self) -> (usize, usize) {
        let store = self.lock();
        (store.unread(), store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(n: usize) -> RawNotification {
        RawNotification::new(format!("标题{}", n), format!("消息{}", n))
    }

    #[test]
    fn test_insert_assigns_timestamp_and_seq() {
        let mut store = HistoryStore::new(5);
        let first = store.insert(raw(1));
        let second = store.insert(raw(2).with_timestamp("2026-08-06 09:00:00"));

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert!(!first.timestamp.is_empty());
        assert_eq!(second.timestamp, "2026-08-06 09:00:00");
        assert!(!first.read);
    }

    #[test]
    fn test_insertion_order_is_arrival_order() {
        let mut store = HistoryStore::new(5);
        for n in 1..=3 {
            store.insert(raw(n));
        }

        let snapshot = store.snapshot();
        // 快照最新在前，内部最旧在前
        assert_eq!(snapshot.records[0].title, "标题3");
        assert_eq!(snapshot.records[2].title, "标题1");
        assert_eq!(snapshot.total, 3);
    }

    #[test]
    fn test_unread_accounting_matches_recount() {
        let mut store = HistoryStore::new(10);
        for n in 1..=6 {
            store.insert(raw(n));
        }
        store.mark_read(2);
        store.mark_read(4);

        assert_eq!(store.unread(), 4);
        assert_eq!(store.unread(), store.recount_unread());

        store.mark_all_read();
        assert_eq!(store.unread(), 0);
        assert_eq!(store.unread(), store.recount_unread());
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut store = HistoryStore::new(5);
        let record = store.insert(raw(1));

        assert!(store.mark_read(record.seq));
        assert_eq!(store.unread(), 0);
        // 重复标记不改变计数
        assert!(!store.mark_read(record.seq));
        assert_eq!(store.unread(), 0);
    }

    #[test]
    fn test_mark_read_evicted_record_is_noop() {
        let mut store = HistoryStore::new(2);
        let first = store.insert(raw(1));
        store.insert(raw(2));
        store.insert(raw(3)); // 淘汰 seq=1

        assert!(!store.mark_read(first.seq));
        assert_eq!(store.unread(), 2);
    }

    #[test]
    fn test_eviction_of_unread_oldest_decrements_unread() {
        let mut store = HistoryStore::new(20);
        for n in 1..=20 {
            store.insert(raw(n));
        }
        assert_eq!(store.len(), 20);
        assert_eq!(store.unread(), 20);

        // 第 21 条：最旧未读被淘汰，未读数不变（-1 +1）
        store.insert(raw(21));
        assert_eq!(store.len(), 20);
        assert_eq!(store.unread(), 20);
        assert_eq!(store.snapshot().records.last().unwrap().title, "标题2");
    }

    #[test]
    fn test_eviction_of_read_oldest_keeps_unread() {
        let mut store = HistoryStore::new(20);
        let first = store.insert(raw(1));
        for n in 2..=20 {
            store.insert(raw(n));
        }
        store.mark_read(first.seq);
        assert_eq!(store.unread(), 19);

        store.insert(raw(21));
        assert_eq!(store.len(), 20);
        // 淘汰的是已读记录，未读数只因新插入 +1
        assert_eq!(store.unread(), 20);
        assert_eq!(store.unread(), store.recount_unread());
    }

    #[test]
    fn test_mark_all_read_returns_cleared_count() {
        let mut store = HistoryStore::new(5);
        for n in 1..=3 {
            store.insert(raw(n));
        }
        store.mark_read(1);

        assert_eq!(store.mark_all_read(), 2);
        assert_eq!(store.mark_all_read(), 0);
        assert!(store.snapshot().records.iter().all(|r| r.read));
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let mut store = HistoryStore::new(0);
        store.insert(raw(1));
        store.insert(raw(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.unread(), 1);
    }

    #[test]
    fn test_shared_history_concurrent_inserts() {
        let shared = SharedHistory::new(50);
        let mut handles = Vec::new();

        for t in 0..4 {
            let shared = shared.clone();
            handles.push(std::thread::spawn(move || {
                for n in 0..10 {
                    shared.insert(RawNotification::new(
                        format!("线程{}", t),
                        format!("消息{}", n),
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let (unread, total) = shared.counts();
        assert_eq!(total, 40);
        assert_eq!(unread, 40);
        // 序号唯一且单调分配
        let snapshot = shared.snapshot();
        let mut seqs: Vec<u64> = snapshot.records.iter().map(|r| r.seq).collect();
        seqs.sort_unstable();
        seqs.dedup();
        assert_eq!(seqs.len(), 40);
    }
}
