//! Client sessions and per-session outcomes.

use crate::network::BoxedByteStream;

/// What a session is expected to observe when its response is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// A well-formed response delivering exactly this many body bytes.
    Body(u64),
    /// The stream ends before a complete response arrives.
    AbruptEof,
}

/// What a session actually observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A well-formed response delivering exactly this many body bytes.
    Body(u64),
    /// End-of-stream before a complete response; zero further bytes.
    ///
    /// Distinct from any successful byte count, including zero-length
    /// bodies.
    AbruptEof,
    /// The read failed; the reason is captured, never rethrown.
    Failed(String),
}

/// An open client connection with its expected result.
///
/// The driver owns the session while writing the request; once all
/// writes are done it hands the session to the collector, which reads
/// it to a terminal outcome. Dropping the session closes the stream.
pub struct ClientSession {
    /// Session index within the scenario, used in reports.
    pub id: usize,
    /// The open byte stream to the server.
    pub stream: BoxedByteStream,
    /// The outcome this session must observe for the scenario to pass.
    pub expected: Expectation,
}

/// One session's result, paired with what was expected of it.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session index within the scenario.
    pub id: usize,
    /// The expected outcome.
    pub expected: Expectation,
    /// The observed outcome.
    pub outcome: SessionOutcome,
}

impl SessionReport {
    /// Whether the observed outcome satisfies the expectation.
    pub fn matched(&self) -> bool {
        match (&self.expected, &self.outcome) {
            (Expectation::Body(expected), SessionOutcome::Body(actual)) => expected == actual,
            (Expectation::AbruptEof, SessionOutcome::AbruptEof) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rules() {
        let report = |expected, outcome| SessionReport {
            id: 0,
            expected,
            outcome,
        };

        assert!(report(Expectation::Body(10), SessionOutcome::Body(10)).matched());
        assert!(!report(Expectation::Body(10), SessionOutcome::Body(9)).matched());
        assert!(report(Expectation::AbruptEof, SessionOutcome::AbruptEof).matched());
        // An abrupt end never satisfies a byte-count expectation, and a
        // zero-length body is not an EOF sentinel.
        assert!(!report(Expectation::Body(0), SessionOutcome::AbruptEof).matched());
        assert!(!report(Expectation::AbruptEof, SessionOutcome::Body(0)).matched());
        assert!(
            !report(
                Expectation::AbruptEof,
                SessionOutcome::Failed("boom".into())
            )
            .matched()
        );
    }
}
