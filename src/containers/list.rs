use std::marker::PhantomData;
use std::ptr::NonNull;

use super::AllocBox;
use crate::backend::Allocator;
use crate::error::BenchError;

struct ListNode<T> {
    value: T,
    prev: Option<NonNull<ListNode<T>>>,
    next: Option<NonNull<ListNode<T>>>,
}

/// Doubly linked list; one allocation per element.
pub struct LinkedList<'a, T> {
    head: Option<NonNull<ListNode<T>>>,
    tail: Option<NonNull<ListNode<T>>>,
    len: usize,
    alloc: &'a dyn Allocator,
    _owns: PhantomData<T>,
}

impl<'a, T> LinkedList<'a, T> {
    pub fn new(alloc: &'a dyn Allocator) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Bytes requested from the allocator per element.
    pub fn node_size() -> usize {
        std::mem::size_of::<ListNode<T>>()
    }

    fn new_node(&self, value: T) -> Result<NonNull<ListNode<T>>, BenchError> {
        let node = ListNode { value, prev: None, next: None };
        Ok(AllocBox::into_raw(AllocBox::try_new(node, self.alloc)?))
    }

    fn free_node(&self, node: NonNull<ListNode<T>>) -> T {
        AllocBox::into_inner(unsafe { AllocBox::from_raw(node, self.alloc) }).value
    }

    pub fn push_back(&mut self, value: T) -> Result<(), BenchError> {
        let mut node = self.new_node(value)?;
        unsafe {
            node.as_mut().prev = self.tail;
            match self.tail {
                Some(mut tail) => tail.as_mut().next = Some(node),
                None => self.head = Some(node),
            }
        }
        self.tail = Some(node);
        self.len += 1;
        Ok(())
    }

    pub fn push_front(&mut self, value: T) -> Result<(), BenchError> {
        let mut node = self.new_node(value)?;
        unsafe {
            node.as_mut().next = self.head;
            match self.head {
                Some(mut head) => head.as_mut().prev = Some(node),
                None => self.tail = Some(node),
            }
        }
        self.head = Some(node);
        self.len += 1;
        Ok(())
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let node = self.tail?;
        unsafe {
            self.tail = node.as_ref().prev;
            match self.tail {
                Some(mut tail) => tail.as_mut().next = None,
                None => self.head = None,
            }
        }
        self.len -= 1;
        Some(self.free_node(node))
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.head?;
        unsafe {
            self.head = node.as_ref().next;
            match self.head {
                Some(mut head) => head.as_mut().prev = None,
                None => self.tail = None,
            }
        }
        self.len -= 1;
        Some(self.free_node(node))
    }

    pub fn front(&self) -> Option<&T> {
        self.head.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    pub fn back(&self) -> Option<&T> {
        self.tail.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            _list: PhantomData,
        }
    }
}

impl<T> Drop for LinkedList<'_, T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}

pub struct Iter<'l, T> {
    next: Option<NonNull<ListNode<T>>>,
    _list: PhantomData<&'l T>,
}

impl<'l, T> Iterator for Iter<'l, T> {
    type Item = &'l T;

    fn next(&mut self) -> Option<&'l T> {
        let node = unsafe { &*self.next?.as_ptr() };
        self.next = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SystemAllocator, TrackingAllocator};

    #[test]
    fn test_both_ends() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut list = LinkedList::new(&t);
        list.push_back(2).unwrap();
        list.push_back(3).unwrap();
        list.push_front(1).unwrap();
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(list.front(), Some(&1));
        assert_eq!(list.back(), Some(&3));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert!(list.is_empty());
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_drop_releases_all_nodes() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut list = LinkedList::new(&t);
        for i in 0..1000 {
            list.push_back(i).unwrap();
        }
        assert_eq!(t.snapshot().live_blocks, 1000);
        drop(list);
        assert_eq!(t.snapshot().live_blocks, 0);
    }
}
