use std::cell::RefCell;
use std::rc::Rc;

/// Shared slot whose content any holder can remove. The poller keeps one copy
/// in its heap and hands the other out as the cancellation handle.
pub struct DeleteCell<T>(Rc<RefCell<Option<T>>>);
impl<T> DeleteCell<T> {
  pub fn new(t: T) -> Self { Self(Rc::new(RefCell::new(Some(t)))) }
  pub fn take(&self) -> Option<T> { self.0.borrow_mut().take() }
  pub fn is_live(&self) -> bool { self.0.borrow().is_some() }
}
impl<T: Clone> DeleteCell<T> {
  pub fn clone_out(&self) -> Option<T> { self.0.borrow().clone() }
}
impl<T> Clone for DeleteCell<T> {
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

#[cfg(test)]
mod test {
  use super::DeleteCell;

  #[test]
  fn take_empties_every_copy() {
    let cell = DeleteCell::new(3);
    let other = cell.clone();
    assert_eq!(other.clone_out(), Some(3));
    assert_eq!(cell.take(), Some(3));
    assert!(!other.is_live());
    assert_eq!(other.take(), None);
  }
}
