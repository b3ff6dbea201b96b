//! Consecutive-empty-page stop rule

/// What a pagination loop should do after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Continue,
    Exhausted,
}

/// Counts sequential zero-yield pages and reports exhaustion at a threshold.
#[derive(Debug, Clone)]
pub struct EmptyPageStreak {
    threshold: u32,
    streak: u32,
}

impl EmptyPageStreak {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            streak: 0,
        }
    }

    /// Record how many rows a page yielded.
    pub fn record(&mut self, yielded: usize) -> PageOutcome {
        if yielded > 0 {
            self.streak = 0;
            return PageOutcome::Continue;
        }
        self.streak += 1;
        if self.streak >= self.threshold {
            PageOutcome::Exhausted
        } else {
            PageOutcome::Continue
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
