//! Phase timing utilities

use std::fmt;
use std::time::{Duration, Instant};

/// Records the duration of named phases, each measured since the previous mark
pub struct Timings {
    start: Instant,
    last: Instant,
    phases: Vec<(String, Duration)>,
}

impl Timings {
    /// Start a new timing session
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            phases: Vec::new(),
        }
    }

    /// Close the current phase under `name`
    pub fn add(&mut self, name: impl Into<String>) {
        let now = Instant::now();
        self.phases.push((name.into(), now - self.last));
        self.last = now;
    }

    /// Recorded phases in insertion order
    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    /// Time since the session started
    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, duration) in &self.phases {
            writeln!(f, "{:>16}: {:8.3} ms", name, duration.as_secs_f64() * 1000.0)?;
        }
        write!(f, "{:>16}: {:8.3} ms", "total", self.total().as_secs_f64() * 1000.0)
    }
}

/// Soft wall-clock budget; a zero budget never expires
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// Create a deadline `seconds` from now (`<= 0` means unlimited)
    pub fn after_secs(seconds: f32) -> Self {
        let budget = if seconds > 0.0 && seconds.is_finite() {
            Some(Duration::from_secs_f32(seconds))
        } else {
            None
        };
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Whether the budget is used up
    pub fn expired(&self) -> bool {
        match self.budget {
            Some(budget) => self.start.elapsed() >= budget,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_record_phases_in_order() {
        let mut timings = Timings::new();
        timings.add("grow");
        timings.add("skin");
        let names: Vec<&str> = timings.phases().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["grow", "skin"]);
        assert!(timings.to_string().contains("total"));
    }

    #[test]
    fn test_zero_deadline_never_expires() {
        assert!(!Deadline::after_secs(0.0).expired());
        assert!(!Deadline::after_secs(-1.0).expired());
    }

    #[test]
    fn test_tiny_deadline_expires() {
        let deadline = Deadline::after_secs(1e-6);
        std::thread::sleep(Duration::from_millis(2));
        assert!(deadline.expired());
    }
}
