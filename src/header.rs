// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 头部表
//!
//! 请求与响应共用的、键名大小写不敏感的哈希表。
//!
//! 底层是拉链法的桶数组：键名的小写形式参与哈希，负载因子超过 0.75 时桶数翻倍并重新散列。
//! 同一个键（忽略大小写）最多只保存一个值，重复写入会覆盖旧值，但保留首次写入时的键名拼写。

use std::fmt;

use crate::exception::Exception;

const INITIAL_BUCKETS: usize = 16;
const LOAD_FACTOR: f64 = 0.75;

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: String,
}

/// 大小写不敏感的头部表
#[derive(Clone)]
pub struct HeaderMap {
    buckets: Vec<Vec<Entry>>,
    count: usize,
}

/// djb2，对每个字节先转小写
fn hash(key: &str, bucket_count: usize) -> usize {
    let mut hash: usize = 5381;
    for byte in key.bytes() {
        hash = (hash << 5)
            .wrapping_add(hash)
            .wrapping_add(byte.to_ascii_lowercase() as usize);
    }
    hash % bucket_count
}

/// 分配失败时返回 `MemoryExhausted` 而不是直接终止进程
fn try_copy(s: &str) -> Result<String, Exception> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}

fn try_buckets(count: usize) -> Result<Vec<Vec<Entry>>, Exception> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(count)?;
    buckets.resize_with(count, Vec::new);
    Ok(buckets)
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            buckets: (0..INITIAL_BUCKETS).map(|_| Vec::new()).collect(),
            count: 0,
        }
    }

    /// 插入或覆盖一个头部字段。
    ///
    /// 插入后若负载因子超过阈值，会自动扩容为两倍桶数。
    /// 返回 `MemoryExhausted` 时，已有的条目依然可以查询。
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Exception> {
        let index = hash(key, self.buckets.len());

        if let Some(entry) = self.buckets[index]
            .iter_mut()
            .find(|e| e.key.eq_ignore_ascii_case(key))
        {
            entry.value = try_copy(value)?;
            return Ok(());
        }

        let entry = Entry {
            key: try_copy(key)?,
            value: try_copy(value)?,
        };
        self.buckets[index].try_reserve(1)?;
        self.buckets[index].push(entry);
        self.count += 1;

        if self.count as f64 / self.buckets.len() as f64 > LOAD_FACTOR {
            self.resize(self.buckets.len() * 2)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let index = hash(key, self.buckets.len());
        self.buckets[index]
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value.as_str())
    }

    /// 删除一个字段，返回被删除的值
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = hash(key, self.buckets.len());
        let bucket = &mut self.buckets[index];
        let position = bucket.iter().position(|e| e.key.eq_ignore_ascii_case(key))?;
        self.count -= 1;
        Some(bucket.swap_remove(position).value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.count = 0;
    }

    /// 遍历所有 (键, 值)，顺序不确定。
    ///
    /// 迭代器借用了整张表，遍历期间无法修改。
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buckets: &self.buckets,
            bucket_index: 0,
            entry_index: 0,
        }
    }

    /// 新桶数组分配成功后才会替换旧桶，失败时表保持原样
    fn resize(&mut self, new_size: usize) -> Result<(), Exception> {
        if new_size < self.count {
            return Err(Exception::InternalFailure);
        }
        let old = std::mem::replace(&mut self.buckets, try_buckets(new_size)?);
        for entry in old.into_iter().flatten() {
            let index = hash(&entry.key, new_size);
            self.buckets[index].push(entry);
        }
        Ok(())
    }
}

impl Default for HeaderMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// 头部表的游标：当前桶下标与桶内条目下标
pub struct Iter<'a> {
    buckets: &'a [Vec<Entry>],
    bucket_index: usize,
    entry_index: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while self.bucket_index < self.buckets.len() {
            if let Some(entry) = self.buckets[self.bucket_index].get(self.entry_index) {
                self.entry_index += 1;
                return Some((entry.key.as_str(), entry.value.as_str()));
            }
            self.bucket_index += 1;
            self.entry_index = 0;
        }
        None
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
