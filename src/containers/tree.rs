//! Unbalanced binary search tree.
//!
//! Children are owned through [`AllocBox`]; each node also keeps a raw
//! back-pointer to its parent. The back-pointer is only read by in-order
//! iteration and never decides when a node is freed. Node addresses never
//! change while a node is in the tree, so the pointers stay valid.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use super::AllocBox;
use crate::backend::Allocator;
use crate::error::BenchError;

type Link<'a, K, V> = Option<AllocBox<'a, TreeNode<'a, K, V>>>;

struct TreeNode<'a, K, V> {
    key: K,
    value: V,
    left: Link<'a, K, V>,
    right: Link<'a, K, V>,
    parent: Option<NonNull<TreeNode<'a, K, V>>>,
}

pub struct BinaryTree<'a, K, V> {
    root: Link<'a, K, V>,
    len: usize,
    alloc: &'a dyn Allocator,
}

impl<'a, K: Ord, V> BinaryTree<'a, K, V> {
    pub fn new(alloc: &'a dyn Allocator) -> Self {
        Self { root: None, len: 0, alloc }
    }

    /// Bytes requested from the allocator per key.
    pub fn node_size() -> usize {
        mem::size_of::<TreeNode<'a, K, V>>()
    }

    /// Returns `true` when a node was allocated, `false` when an existing
    /// key's value was replaced.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool, BenchError> {
        let mut parent = None;
        let mut link = &mut self.root;
        while let Some(node) = link {
            match key.cmp(&node.key) {
                Ordering::Less => {
                    parent = Some(AllocBox::as_ptr(node));
                    link = &mut node.left;
                }
                Ordering::Greater => {
                    parent = Some(AllocBox::as_ptr(node));
                    link = &mut node.right;
                }
                Ordering::Equal => {
                    node.value = value;
                    return Ok(false);
                }
            }
        }
        let node = TreeNode {
            key,
            value,
            left: None,
            right: None,
            parent,
        };
        *link = Some(AllocBox::try_new(node, self.alloc)?);
        self.len += 1;
        Ok(true)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut cur = self.root.as_ref();
        while let Some(node) = cur {
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_ref(),
                Ordering::Greater => node.right.as_ref(),
                Ordering::Equal => return Some(&node.value),
            };
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let mut link = &mut self.root;
        loop {
            let ordering = key.cmp(&link.as_ref()?.key);
            match ordering {
                Ordering::Equal => break,
                Ordering::Less => {
                    if let Some(node) = link {
                        link = &mut node.left;
                    }
                }
                Ordering::Greater => {
                    if let Some(node) = link {
                        link = &mut node.right;
                    }
                }
            }
        }

        let mut node = link.take()?;
        self.len -= 1;
        match (node.left.take(), node.right.take()) {
            (None, None) => {}
            (Some(mut child), None) | (None, Some(mut child)) => {
                child.parent = node.parent;
                *link = Some(child);
            }
            (Some(left), Some(right)) => {
                // Keep this node in place and move the successor's entry into
                // it, so no child's parent pointer has to change.
                node.left = Some(left);
                node.right = Some(right);
                let mut successor = take_min(&mut node.right)?;
                mem::swap(&mut node.key, &mut successor.key);
                mem::swap(&mut node.value, &mut successor.value);
                *link = Some(node);
                return Some(AllocBox::into_inner(successor).value);
            }
        }
        Some(AllocBox::into_inner(node).value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// In-order traversal.
    pub fn iter(&self) -> Iter<'_, 'a, K, V> {
        let mut first = self.root.as_ref().map(AllocBox::as_ptr);
        if let Some(node) = first {
            first = Some(unsafe { leftmost(node) });
        }
        Iter {
            next: first,
            _tree: PhantomData,
        }
    }

    pub fn height(&self) -> usize {
        fn depth<K, V>(link: &Link<'_, K, V>) -> usize {
            match link {
                None => 0,
                Some(node) => 1 + depth(&node.left).max(depth(&node.right)),
            }
        }
        depth(&self.root)
    }
}

/// Detach the minimum node of a non-empty subtree, splicing its right child
/// into its place.
fn take_min<'a, K, V>(mut link: &mut Link<'a, K, V>) -> Option<AllocBox<'a, TreeNode<'a, K, V>>> {
    while link.as_ref()?.left.is_some() {
        if let Some(node) = link {
            link = &mut node.left;
        }
    }
    let mut min = link.take()?;
    if let Some(mut right) = min.right.take() {
        right.parent = min.parent;
        *link = Some(right);
    }
    Some(min)
}

unsafe fn leftmost<'a, K, V>(mut node: NonNull<TreeNode<'a, K, V>>) -> NonNull<TreeNode<'a, K, V>> {
    while let Some(left) = unsafe { node.as_ref() }.left.as_ref() {
        node = AllocBox::as_ptr(left);
    }
    node
}

pub struct Iter<'t, 'a, K, V> {
    next: Option<NonNull<TreeNode<'a, K, V>>>,
    _tree: PhantomData<&'t BinaryTree<'a, K, V>>,
}

impl<'t, 'a, K, V> Iterator for Iter<'t, 'a, K, V> {
    type Item = (&'t K, &'t V);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let node: &'t TreeNode<'a, K, V> = unsafe { &*current.as_ptr() };

        self.next = match node.right.as_ref() {
            Some(right) => Some(unsafe { leftmost(AllocBox::as_ptr(right)) }),
            None => {
                // Climb until we arrive from a left child.
                let mut child = current;
                let mut parent = node.parent;
                while let Some(p) = parent {
                    let p_ref = unsafe { p.as_ref() };
                    let from_right = p_ref
                        .right
                        .as_ref()
                        .is_some_and(|r| AllocBox::as_ptr(r) == child);
                    if !from_right {
                        break;
                    }
                    child = p;
                    parent = p_ref.parent;
                }
                parent
            }
        };
        Some((&node.key, &node.value))
    }
}

impl<K, V> Drop for BinaryTree<'_, K, V> {
    fn drop(&mut self) {
        // Flatten with an explicit worklist instead of recursing per level.
        let mut pending: Vec<_> = self.root.take().into_iter().collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(node.left.take());
            pending.extend(node.right.take());
        }
    }
}
