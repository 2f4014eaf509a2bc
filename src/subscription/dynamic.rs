use smallvec::SmallVec;

/// A container of open subscriptions keyed by a unique id.
///
/// Used where subscriptions come and go independently of each other and
/// the owner must be able to remove one when it finishes.
///
/// - Ids are never reused.
/// - `reserve_id()` + `insert()` covers the case where the item needs to
///   know its own id before it can be constructed.
///
/// # Examples
///
/// ```rust
/// use rxdemand::subscription::{DynamicSubscriptions, EmptySubscription};
///
/// let mut subs = DynamicSubscriptions::new();
/// let first = subs.reserve_id();
/// subs.insert(first, EmptySubscription);
///
/// let second = subs.reserve_id();
/// subs.insert(second, EmptySubscription);
/// assert_eq!(subs.len(), 2);
///
/// assert!(subs.remove(first).is_some());
/// assert!(subs.remove(first).is_none());
/// assert_eq!(subs.len(), 1);
/// ```
pub struct DynamicSubscriptions<U> {
  next_id: u64,
  items: SmallVec<[(u64, U); 4]>,
}

impl<U> Default for DynamicSubscriptions<U> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<U> DynamicSubscriptions<U> {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Reserve the next id without adding an item.
  #[inline]
  pub fn reserve_id(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  /// Insert an item under an id obtained from `reserve_id()`.
  #[inline]
  pub fn insert(&mut self, id: u64, item: U) { self.items.push((id, item)); }

  pub fn remove(&mut self, id: u64) -> Option<U> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &U> { self.items.iter().map(|(_, item)| item) }
}
