use super::AllocBox;
use crate::backend::Allocator;
use crate::error::BenchError;

struct StackNode<'a, T> {
    value: T,
    below: Option<AllocBox<'a, StackNode<'a, T>>>,
}

/// Singly linked LIFO; one allocation per push.
pub struct Stack<'a, T> {
    top: Option<AllocBox<'a, StackNode<'a, T>>>,
    len: usize,
    alloc: &'a dyn Allocator,
}

impl<'a, T> Stack<'a, T> {
    pub fn new(alloc: &'a dyn Allocator) -> Self {
        Self { top: None, len: 0, alloc }
    }

    /// Bytes requested from the allocator per element.
    pub fn node_size() -> usize {
        std::mem::size_of::<StackNode<'a, T>>()
    }

    pub fn push(&mut self, value: T) -> Result<(), BenchError> {
        let mut node = AllocBox::try_new(StackNode { value, below: None }, self.alloc)?;
        node.below = self.top.take();
        self.top = Some(node);
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        let node = AllocBox::into_inner(self.top.take()?);
        self.top = node.below;
        self.len -= 1;
        Some(node.value)
    }

    pub fn peek(&self) -> Option<&T> {
        self.top.as_ref().map(|node| &node.value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Drop for Stack<'_, T> {
    fn drop(&mut self) {
        // Unlink one node at a time; the default recursive drop would be as
        // deep as the stack.
        let mut cur = self.top.take();
        while let Some(mut node) = cur {
            cur = node.below.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SystemAllocator, TrackingAllocator};

    #[test]
    fn test_lifo_order() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut s = Stack::new(&t);
        for i in 0..10 {
            s.push(i).unwrap();
        }
        assert_eq!(s.peek(), Some(&9));
        assert_eq!(s.pop(), Some(9));
        assert_eq!(s.pop(), Some(8));
        assert_eq!(s.len(), 8);
        assert_eq!(t.snapshot().live_blocks, 8);
    }

    #[test]
    fn test_deep_stack_drops_iteratively() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut s = Stack::new(&t);
        for i in 0..200_000u32 {
            s.push(i).unwrap();
        }
        drop(s);
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_node_size_matches_requests() {
        let t = TrackingAllocator::new(SystemAllocator).recording_sizes();
        let mut s = Stack::new(&t);
        s.push(1u64).unwrap();
        assert_eq!(t.recorded_sizes(), vec![Stack::<u64>::node_size()]);
    }
}
