//! Concurrent response collection.
//!
//! Every session is read in its own task, fully decoupled from the
//! server's worker budget, so a starved server cannot also starve the
//! harness's ability to observe it. Per-session failures are captured as
//! outcomes; only the overall deadline aborts collection.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::task::JoinSet;

use crate::error::{HarnessError, HarnessResult};
use crate::network::BoxedByteStream;
use crate::session::{ClientSession, SessionOutcome, SessionReport};
use crate::wire::ResponseHead;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Read every session to a terminal outcome.
///
/// All sessions are drained concurrently; each yields a
/// [`SessionReport`] whatever happens to it. Exceeding `overall_deadline`
/// is [`HarnessError::CollectionTimeout`], the hang the harness exists
/// to catch. Reports come back ordered by session id.
pub async fn collect_all(
    sessions: Vec<ClientSession>,
    overall_deadline: Duration,
) -> HarnessResult<Vec<SessionReport>> {
    let mut expected = HashMap::new();
    let mut join = JoinSet::new();
    for session in sessions {
        expected.insert(session.id, session.expected);
        join.spawn(async move {
            let ClientSession {
                id,
                mut stream,
                expected,
            } = session;
            let outcome = read_outcome(&mut stream).await;
            tracing::debug!(session = id, ?outcome, "session drained");
            SessionReport {
                id,
                expected,
                outcome,
            }
        });
    }

    let drain = async {
        let mut reports = Vec::with_capacity(expected.len());
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(error = %e, "collection task died"),
            }
        }
        reports
    };

    let mut reports = match tokio::time::timeout(overall_deadline, drain).await {
        Ok(reports) => reports,
        Err(_) => {
            return Err(HarnessError::CollectionTimeout {
                waited: overall_deadline,
            });
        }
    };

    // A dead task still owes its session a report.
    for (id, expectation) in expected {
        if !reports.iter().any(|report| report.id == id) {
            reports.push(SessionReport {
                id,
                expected: expectation,
                outcome: SessionOutcome::Failed("collection task died".to_string()),
            });
        }
    }

    reports.sort_by_key(|report| report.id);
    Ok(reports)
}

/// Read one session to its terminal outcome. Never fails; errors are
/// captured in the outcome.
async fn read_outcome(stream: &mut BoxedByteStream) -> SessionOutcome {
    match read_response(stream).await {
        Ok(Some(bytes)) => SessionOutcome::Body(bytes),
        Ok(None) => SessionOutcome::AbruptEof,
        Err(e) => SessionOutcome::Failed(e.to_string()),
    }
}

/// Parse a response and count its body bytes.
///
/// `Ok(None)` means the stream ended before a complete response (before
/// the head finished, or mid-body), which is the abrupt-EOF sentinel.
async fn read_response(stream: &mut BoxedByteStream) -> HarnessResult<Option<u64>> {
    let mut buf = Vec::with_capacity(4096);
    let (head, consumed) = loop {
        match ResponseHead::parse(&buf)? {
            Some(parsed) => break parsed,
            None => {
                let n = stream.read_buf(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
            }
        }
    };

    let buffered_body = (buf.len() - consumed) as u64;
    match head.content_length()? {
        Some(declared) => {
            let mut received = buffered_body;
            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            while received < declared {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(None);
                }
                received += n as u64;
            }
            Ok(Some(declared))
        }
        None => {
            // No declared length: the body runs to end-of-stream.
            let mut received = buffered_body;
            let mut chunk = vec![0u8; READ_CHUNK_SIZE];
            loop {
                let n = stream.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(Some(received));
                }
                received += n as u64;
            }
        }
    }
}
