//! Separate-chaining hash table.
//!
//! The bucket array is obtained with `zeroed_allocate`, relying on
//! `Option<NonNull<_>>` being null when zeroed. The table doubles once the
//! load factor reaches 0.75. Hashing uses a fixed-key `DefaultHasher`, so the
//! bucket layout for a given key sequence is the same on every run.

use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use super::{AllocBox, RawBuf};
use crate::backend::Allocator;
use crate::error::BenchError;

pub const DEFAULT_BUCKETS: usize = 64;
const MAX_LOAD_NUM: usize = 3;
const MAX_LOAD_DEN: usize = 4;

type Bucket<K, V> = Option<NonNull<HashEntry<K, V>>>;

struct HashEntry<K, V> {
    key: K,
    value: V,
    next: Bucket<K, V>,
}

pub struct HashTable<'a, K, V> {
    buckets: RawBuf<'a, Bucket<K, V>>,
    len: usize,
    hasher: BuildHasherDefault<DefaultHasher>,
    _owns: PhantomData<HashEntry<K, V>>,
}

impl<'a, K: Hash + Eq, V> HashTable<'a, K, V> {
    pub fn new(alloc: &'a dyn Allocator) -> Result<Self, BenchError> {
        Self::with_buckets(alloc, DEFAULT_BUCKETS)
    }

    pub fn with_buckets(alloc: &'a dyn Allocator, buckets: usize) -> Result<Self, BenchError> {
        Ok(Self {
            buckets: RawBuf::zeroed(alloc, buckets.max(1))?,
            len: 0,
            hasher: BuildHasherDefault::default(),
            _owns: PhantomData,
        })
    }

    /// Bytes requested from the allocator per entry.
    pub fn entry_size() -> usize {
        mem::size_of::<HashEntry<K, V>>()
    }

    fn bucket_of(&self, key: &K, buckets: usize) -> usize {
        (self.hasher.hash_one(key) % buckets as u64) as usize
    }

    fn slot(&self, index: usize) -> *mut Bucket<K, V> {
        debug_assert!(index < self.buckets.capacity());
        unsafe { self.buckets.as_ptr().add(index) }
    }

    fn find(&self, key: &K) -> Option<NonNull<HashEntry<K, V>>> {
        let mut cur = unsafe { *self.slot(self.bucket_of(key, self.buckets.capacity())) };
        while let Some(entry) = cur {
            let e = unsafe { entry.as_ref() };
            if e.key == *key {
                return Some(entry);
            }
            cur = e.next;
        }
        None
    }

    /// Insert or replace; the previous value for `key` is returned.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, BenchError> {
        if let Some(mut entry) = self.find(&key) {
            let old = mem::replace(unsafe { &mut entry.as_mut().value }, value);
            return Ok(Some(old));
        }
        if (self.len + 1) * MAX_LOAD_DEN > self.buckets.capacity() * MAX_LOAD_NUM {
            self.grow()?;
        }
        let index = self.bucket_of(&key, self.buckets.capacity());
        let slot = self.slot(index);
        let entry = HashEntry {
            key,
            value,
            next: unsafe { *slot },
        };
        let entry = AllocBox::into_raw(AllocBox::try_new(entry, self.buckets.allocator())?);
        unsafe { *slot = Some(entry) };
        self.len += 1;
        Ok(None)
    }

    fn grow(&mut self) -> Result<(), BenchError> {
        let new_cap = self.buckets.capacity() * 2;
        let fresh: RawBuf<'a, Bucket<K, V>> = RawBuf::zeroed(self.buckets.allocator(), new_cap)?;
        for i in 0..self.buckets.capacity() {
            let mut cur = unsafe { self.slot(i).replace(None) };
            while let Some(mut entry) = cur {
                let e = unsafe { entry.as_mut() };
                cur = e.next;
                let target = unsafe { fresh.as_ptr().add(self.bucket_of(&e.key, new_cap)) };
                e.next = unsafe { *target };
                unsafe { *target = Some(entry) };
            }
        }
        // The old (now empty) array is released when `fresh` replaces it.
        self.buckets = fresh;
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|entry| unsafe { &(*entry.as_ptr()).value })
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let mut link = self.slot(self.bucket_of(key, self.buckets.capacity()));
        unsafe {
            while let Some(entry) = *link {
                if entry.as_ref().key == *key {
                    *link = entry.as_ref().next;
                    self.len -= 1;
                    let owned = AllocBox::from_raw(entry, self.buckets.allocator());
                    return Some(AllocBox::into_inner(owned).value);
                }
                link = &raw mut (*entry.as_ptr()).next;
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.capacity()
    }
}

impl<K, V> Drop for HashTable<'_, K, V> {
    fn drop(&mut self) {
        let alloc = self.buckets.allocator();
        for i in 0..self.buckets.capacity() {
            let mut cur = unsafe { self.buckets.as_ptr().add(i).replace(None) };
            while let Some(entry) = cur {
                let owned = unsafe { AllocBox::from_raw(entry, alloc) };
                cur = owned.next;
                drop(owned);
            }
        }
    }
}
