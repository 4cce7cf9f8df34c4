//! Pipeline stages for report generation.
//!
//! Each submodule implements exactly one step. Stages run strictly in
//! sequence and hand their output to the next one by value.
//!
//! ## Data Flow
//!
//! ```text
//! input ─▶ load ─▶ extract ─▶ collect ─▶ synthesize ─▶ render
//! (path)   (text)  (profile)  (evidence)  (report)     (PDF)
//! ```
//!
//! 1. [`input`]: resolve the configured path or URL to a local PDF
//! 2. [`load`]: concatenate the text of every page
//! 3. [`extract`]: ask the model for a JSON company profile
//! 4. [`collect`]: run the bounded set of search queries
//! 5. [`synthesize`]: build the structured prompt and get the report
//! 6. [`render`]: lay out and write the PDF; [`sanitize`] holds the
//!    charset transform it applies

pub mod collect;
pub mod extract;
pub mod input;
pub mod load;
pub mod render;
pub mod sanitize;
pub mod synthesize;

use crate::error::ReportError;
use crate::progress::Stage;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run one external call under a timeout and the run's cancellation token.
///
/// Every suspension point of the pipeline (document load, completion,
/// search, render) goes through here.
pub(crate) async fn guarded<T, F>(
    stage: Stage,
    timeout_secs: u64,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, ReportError>
where
    F: Future<Output = Result<T, ReportError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReportError::Cancelled { stage }),
        res = tokio::time::timeout(Duration::from_secs(timeout_secs), fut) => match res {
            Ok(inner) => inner,
            Err(_) => Err(ReportError::Timeout { stage, secs: timeout_secs }),
        },
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub(crate) fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_prefix_respects_code_points() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("abc", 10), "abc");
        assert_eq!(char_prefix("abc", 0), "");
    }

    #[tokio::test]
    async fn guarded_times_out() {
        let cancel = CancellationToken::new();
        let res: Result<(), _> = guarded(Stage::Collect, 1, &cancel, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            res,
            Err(ReportError::Timeout {
                stage: Stage::Collect,
                secs: 1
            })
        ));
    }

    #[tokio::test]
    async fn guarded_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res: Result<u8, _> = guarded(Stage::Synthesize, 30, &cancel, async { Ok(1) }).await;
        assert!(matches!(
            res,
            Err(ReportError::Cancelled {
                stage: Stage::Synthesize
            })
        ));
    }

    #[tokio::test]
    async fn guarded_passes_through_result() {
        let cancel = CancellationToken::new();
        let res = guarded(Stage::Load, 30, &cancel, async { Ok::<_, ReportError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
