//! Last-value change detection for rendered feed content.

/// Remembers the last value it was shown and reports whether a new candidate
/// differs from it.
///
/// Each poll task owns exactly one detector, so the check-and-update takes
/// `&mut self` and needs no synchronization. State lives for the process
/// lifetime only; after a restart the first observation always counts as a
/// change.
#[derive(Debug, Default, Clone)]
pub struct ChangeDetector {
    last: Option<String>,
}

impl ChangeDetector {
    /// Creates a detector with no previous value. The first call to
    /// [`changed`](Self::changed) always returns `true`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detector seeded with a previous value. An empty string is a
    /// valid previous value, so `with_initial("")` followed by `changed("")`
    /// returns `false`.
    pub fn with_initial(initial: impl Into<String>) -> Self {
        Self {
            last: Some(initial.into()),
        }
    }

    /// Returns `true` iff `candidate` differs from the stored value, then
    /// stores `candidate` unconditionally.
    ///
    /// Call exactly once per candidate value: the call itself consumes the
    /// change.
    pub fn changed(&mut self, candidate: &str) -> bool {
        let changed = self.last.as_deref() != Some(candidate);
        if changed {
            self.last = Some(candidate.to_owned());
        }
        changed
    }

    /// The last value passed to [`changed`](Self::changed), if any.
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
