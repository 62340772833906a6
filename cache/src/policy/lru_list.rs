use generational_arena::{Arena, Index};

#[derive(Debug)]
pub(crate) struct Node<K> {
  pub(crate) key: K,
  pub(crate) next: Option<Index>,
  pub(crate) prev: Option<Index>,
}

/// The recency order of every key in the store.
///
/// Nodes live in an arena and the store keeps each key's `Index` on its entry,
/// so touching, unlinking and popping the least recently used key are all O(1)
/// without a second hash lookup.
#[derive(Debug)]
pub(crate) struct LruList<K> {
  // Arena stores all nodes contiguously.
  pub(crate) nodes: Arena<Node<K>>,
  // Head is the most-recently-used item.
  pub(crate) head: Option<Index>,
  // Tail is the least-recently-used item.
  pub(crate) tail: Option<Index>,
}

impl<K> LruList<K> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      head: None,
      tail: None,
    }
  }

  // Unlinks a node without removing it from the arena.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Links a node that is already in the arena in as the new head.
  fn link_front(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  /// Adds a key as the most recently used and returns its node index.
  pub fn push_front(&mut self, key: K) -> Index {
    let index = self.nodes.insert(Node {
      key,
      next: None,
      prev: None,
    });
    self.link_front(index);
    index
  }

  pub fn move_to_front(&mut self, index: Index) {
    if self.head != Some(index) && self.nodes.contains(index) {
      self.unlink(index);
      self.link_front(index);
    }
  }

  /// Removes and returns the least recently used key.
  pub fn pop_back(&mut self) -> Option<K> {
    let tail_index = self.tail?;
    self.remove(tail_index)
  }

  pub fn remove(&mut self, index: Index) -> Option<K> {
    if !self.nodes.contains(index) {
      return None;
    }
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.key)
  }

  pub fn clear(&mut self) {
    self.nodes.clear();
    self.head = None;
    self.tail = None;
  }

  // A helper for tests, to get the order of keys from head to tail.
  #[cfg(test)]
  pub(crate) fn keys_as_vec(&self) -> Vec<K>
  where
    K: Clone,
  {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}
