use std::borrow::Borrow;
use std::hash::Hash;

use ahash::{HashMap, HashMapExt};
use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K> {
  key: K,
  next: Option<Index>,
  prev: Option<Index>,
}

/// An arena-backed doubly-linked list of keys ordered by recency of use.
///
/// The head is the least-recently-used key and the tail the most recent one,
/// so eviction pops from the front and every touch moves a key to the back.
/// Each key appears at most once.
#[derive(Debug)]
pub(crate) struct RecencyList<K: Eq + Hash + Clone> {
  nodes: Arena<Node<K>>,
  lookup: HashMap<K, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K: Eq + Hash + Clone> RecencyList<K> {
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  // Detaches a node from its neighbours without freeing it.
  fn unlink(&mut self, index: Index) {
    let (prev, next) = match self.nodes.get(index) {
      Some(node) => (node.prev, node.next),
      None => return,
    };

    match prev {
      Some(prev_idx) => self.nodes[prev_idx].next = next,
      None => self.head = next,
    }
    match next {
      Some(next_idx) => self.nodes[next_idx].prev = prev,
      None => self.tail = prev,
    }
  }

  // Links an already-allocated node in as the new tail.
  fn link_back(&mut self, index: Index) {
    let old_tail = self.tail;
    self.nodes[index].prev = old_tail;
    self.nodes[index].next = None;
    self.tail = Some(index);

    match old_tail {
      Some(old) => self.nodes[old].next = Some(index),
      None => self.head = Some(index),
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  #[cfg(test)]
  pub(crate) fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.lookup.contains_key(key)
  }

  /// Appends `key` as most recently used. An existing key is moved instead,
  /// never duplicated.
  pub(crate) fn push_back(&mut self, key: K) {
    if self.lookup.contains_key(&key) {
      self.move_to_back::<K>(&key);
      return;
    }
    let index = self.nodes.insert(Node {
      key: key.clone(),
      next: None,
      prev: None,
    });
    self.lookup.insert(key, index);
    self.link_back(index);
  }

  pub(crate) fn move_to_back<Q>(&mut self, key: &Q)
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    if let Some(&index) = self.lookup.get(key) {
      if self.tail != Some(index) {
        self.unlink(index);
        self.link_back(index);
      }
    }
  }

  /// The least-recently-used key, without removing it.
  pub(crate) fn front(&self) -> Option<&K> {
    self.head.and_then(|index| self.nodes.get(index)).map(|node| &node.key)
  }

  /// Removes and returns the least-recently-used key.
  pub(crate) fn pop_front(&mut self) -> Option<K> {
    let key = self.front()?.clone();
    self.remove::<K>(&key);
    Some(key)
  }

  pub(crate) fn remove<Q>(&mut self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    match self.lookup.remove(key) {
      Some(index) => {
        self.unlink(index);
        self.nodes.remove(index);
        true
      }
      None => false,
    }
  }

  pub(crate) fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
  }

  /// Iterates keys from least to most recently used.
  pub(crate) fn iter(&self) -> Iter<'_, K> {
    Iter {
      list: self,
      current: self.head,
    }
  }
}

pub(crate) struct Iter<'a, K: Eq + Hash + Clone> {
  list: &'a RecencyList<K>,
  current: Option<Index>,
}

impl<'a, K: Eq + Hash + Clone> Iterator for Iter<'a, K> {
  type Item = &'a K;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.list.nodes.get(self.current?)?;
    self.current = node.next;
    Some(&node.key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys(list: &RecencyList<i32>) -> Vec<i32> {
    list.iter().copied().collect()
  }

  #[test]
  fn new_list_is_empty() {
    let list = RecencyList::<i32>::new();
    assert!(keys(&list).is_empty());
    assert_eq!(list.len(), 0);
    assert!(list.front().is_none());
    assert!(!list.contains(&123));
  }

  #[test]
  fn push_back_appends_most_recent_last() {
    let mut list = RecencyList::new();
    list.push_back(10);
    list.push_back(20);
    list.push_back(30);
    assert_eq!(keys(&list), vec![10, 20, 30]);
    assert_eq!(list.front(), Some(&10));
  }

  #[test]
  fn push_back_existing_key_moves_without_duplicating() {
    let mut list = RecencyList::new();
    list.push_back(1);
    list.push_back(2);
    list.push_back(3);

    list.push_back(1);
    assert_eq!(list.len(), 3, "Length should not change");
    assert_eq!(keys(&list), vec![2, 3, 1]);
  }

  #[test]
  fn move_to_back_of_tail_is_a_no_op() {
    let mut list = RecencyList::new();
    list.push_back(1);
    list.push_back(2);
    list.move_to_back(&2);
    assert_eq!(keys(&list), vec![1, 2]);
    list.move_to_back(&99);
    assert_eq!(keys(&list), vec![1, 2]);
  }

  #[test]
  fn pop_front_returns_least_recent() {
    let mut list = RecencyList::new();
    list.push_back(1);
    list.push_back(2);
    list.push_back(3);
    list.move_to_back(&1);

    assert_eq!(list.pop_front(), Some(2));
    assert_eq!(keys(&list), vec![3, 1]);
    assert_eq!(list.pop_front(), Some(3));
    assert_eq!(list.pop_front(), Some(1));
    assert_eq!(list.pop_front(), None);
    assert_eq!(list.len(), 0);
  }

  #[test]
  fn remove_from_middle_and_ends() {
    let mut list = RecencyList::new();
    for k in 1..=5 {
      list.push_back(k);
    }
    assert!(list.remove(&3));
    assert!(list.remove(&1));
    assert!(list.remove(&5));
    assert!(!list.remove(&99));
    assert_eq!(keys(&list), vec![2, 4]);

    list.push_back(6);
    assert_eq!(keys(&list), vec![2, 4, 6]);
  }

  #[test]
  fn clear_resets_list() {
    let mut list = RecencyList::new();
    list.push_back(1);
    list.push_back(2);
    list.clear();
    assert!(keys(&list).is_empty());
    assert!(!list.contains(&1));
    list.push_back(7);
    assert_eq!(keys(&list), vec![7]);
  }
}
