//! In-memory record of a single roast.

use chrono::{DateTime, Utc};

use crate::types::Reading;

/// One reading, as it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub reading: Reading,
}

/// Start and end of a roast and every reading taken in between.
///
/// Once [`Self::close`] has been called the session no longer changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RoastSession {
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    samples: Vec<Sample>,
}

/// Minutes from `start` to `now`. Negative spans clamp to zero.
pub fn elapsed_minutes(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - start).num_milliseconds().max(0);
    millis as f64 / 60_000.0
}

impl RoastSession {
    pub fn start(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            ended_at: None,
            samples: Vec::new(),
        }
    }

    /// Stamp `reading` with its elapsed time and append it.
    ///
    /// Returns the stamped reading, or `None` when the session is already closed.
    pub fn record(&mut self, mut reading: Reading, at: DateTime<Utc>) -> Option<Reading> {
        if self.is_closed() {
            return None;
        }
        reading.elapsed_minutes = elapsed_minutes(self.started_at, at);
        self.samples.push(Sample { at, reading });
        Some(reading)
    }

    /// Set the end time. The end never precedes the last sample.
    pub fn close(&mut self, at: DateTime<Utc>) {
        if self.is_closed() {
            return;
        }
        let last = self.samples.last().map(|s| s.at).unwrap_or(self.started_at);
        self.ended_at = Some(at.max(last));
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.samples.last().map(|s| &s.reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn elapsed_is_zero_at_start() {
        let start = Utc::now();
        assert_eq!(elapsed_minutes(start, start), 0.0);

        let mut session = RoastSession::start(start);
        let stamped = session.record(Reading::default(), start).unwrap();
        assert_eq!(stamped.elapsed_minutes, 0.0);
    }

    #[test]
    fn elapsed_in_minutes() {
        let start = Utc::now();
        assert_eq!(elapsed_minutes(start, start + TimeDelta::seconds(90)), 1.5);
        assert_eq!(elapsed_minutes(start, start + TimeDelta::minutes(12)), 12.0);
        assert_eq!(elapsed_minutes(start + TimeDelta::seconds(5), start), 0.0);
    }

    #[test]
    fn closed_session_rejects_samples() {
        let start = Utc::now();
        let mut session = RoastSession::start(start);
        session.record(Reading::default(), start + TimeDelta::seconds(1));
        session.close(start + TimeDelta::seconds(2));

        assert!(session.is_closed());
        assert!(session.record(Reading::default(), start + TimeDelta::seconds(3)).is_none());
        assert_eq!(session.samples().len(), 1);
        assert_eq!(session.ended_at(), Some(start + TimeDelta::seconds(2)));

        // Closing twice keeps the first end time.
        session.close(start + TimeDelta::seconds(10));
        assert_eq!(session.ended_at(), Some(start + TimeDelta::seconds(2)));
    }

    #[test]
    fn end_never_precedes_last_sample() {
        let start = Utc::now();
        let mut session = RoastSession::start(start);
        let late = start + TimeDelta::seconds(30);
        session.record(Reading::default(), late);
        session.close(start);
        assert_eq!(session.ended_at(), Some(late));
    }
}
