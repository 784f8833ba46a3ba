/// Aggregated view of session progress, useful for UI indication.
///
/// Computed purely from local state; never a gate on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    /// Answered fraction in `[0, 1]`.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.answered as f32 / self.total as f32
    }
}
