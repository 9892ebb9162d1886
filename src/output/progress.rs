// src/output/progress.rs

use std::fmt;

/// A progress update for the progress side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    /// Records with the same id update the same activity.
    pub activity_id: u64,
    pub activity: String,
    pub status: String,
    /// 0..=100 when known.
    pub percent_complete: Option<u8>,
    pub completed: bool,
}

impl ProgressRecord {
    pub fn new(activity_id: u64, activity: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            activity_id,
            activity: activity.into(),
            status: status.into(),
            percent_complete: None,
            completed: false,
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent_complete = Some(percent.min(100));
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self.percent_complete = Some(100);
        self
    }
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.activity, self.status)?;
        if let Some(pct) = self.percent_complete {
            write!(f, " ({pct}%)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_percent_when_known() {
        let r = ProgressRecord::new(1, "copy", "3 of 4").with_percent(75);
        assert_eq!(r.to_string(), "[copy] 3 of 4 (75%)");

        let r = ProgressRecord::new(1, "copy", "starting");
        assert_eq!(r.to_string(), "[copy] starting");
    }

    #[test]
    fn percent_is_clamped() {
        let r = ProgressRecord::new(0, "a", "b").with_percent(250);
        assert_eq!(r.percent_complete, Some(100));
    }
}
