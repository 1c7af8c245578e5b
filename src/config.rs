/// Tunables for a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Upper bound on the total bytes obtained from the grower, terminator
  /// word included. `None` means only the grower itself can refuse.
  pub limit: Option<usize>,
  /// Walk the heap on every `release` and panic on a pointer that is not a
  /// live allocation instead of corrupting the heap.
  pub validate_releases: bool,
}

impl HeapConfig {
  pub const fn new() -> Self {
    Self {
      limit: None,
      validate_releases: cfg!(debug_assertions),
    }
  }

  pub const fn with_limit(
    self,
    limit: usize,
  ) -> Self {
    Self {
      limit: Some(limit),
      ..self
    }
  }

  pub const fn with_validation(
    self,
    validate_releases: bool,
  ) -> Self {
    Self {
      validate_releases,
      ..self
    }
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builder() {
    let config = HeapConfig::new().with_limit(4096).with_validation(false);

    assert_eq!(config.limit, Some(4096));
    assert!(!config.validate_releases);
    assert_eq!(HeapConfig::default().limit, None);
  }
}
