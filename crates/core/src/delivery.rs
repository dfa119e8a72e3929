//! Multi-strategy delivery pipeline.
//!
//! Each job walks an ordered chain of delivery stages until one succeeds or
//! all are exhausted. Stage failures are caught and logged, never propagated.
//! A rate-limit signal from the transport suspends the entire remaining
//! pipeline for the server-mandated wait, reports the wait to the user, then
//! abandons the job; there is no automatic resume after the wait.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    error::Result,
    queue::RelayJob,
    transport::{MessageContent, ReplyContext, Transport, TransportError},
};

/// Hard ceiling for user-visible error summaries, in characters.
const SUMMARY_MAX_CHARS: usize = 200;

/// Delivery stages for messages that may carry an attachment, attempted
/// strictly in this order.
const MEDIA_STAGES: [Stage; 4] = [
    Stage::DirectForward,
    Stage::ForwardFromPeer,
    Stage::CopyContent,
    Stage::CloneUpload,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Optimized direct forward; preserves formatting and attribution.
    DirectForward,
    /// Forward by explicit source peer + message ID.
    ForwardFromPeer,
    /// Re-send the content as a new message.
    CopyContent,
    /// Download the raw payload and re-upload it. Most expensive; last.
    CloneUpload,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Self::DirectForward => "direct forward",
            Self::ForwardFromPeer => "forward from peer",
            Self::CopyContent => "copy content",
            Self::CloneUpload => "clone upload",
        }
    }
}

/// Terminal state of one job's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A stage succeeded.
    Delivered,
    /// The source message could not be fetched; reported to the user.
    FetchFailed,
    /// A rate-limit signal arrived; waited it out and abandoned the job.
    RateLimited,
    /// Every stage failed; reported to the user.
    Exhausted,
}

/// Executes the stage chain for one job at a time.
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
}

impl DeliveryEngine {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Run the full pipeline for `job`.
    ///
    /// Expected failures (fetch errors, stage misses, rate limits) are
    /// handled and reported inside; an `Err` here means something
    /// unclassified escaped and is caught at the worker boundary.
    pub async fn run(&self, job: &RelayJob) -> Result<DeliveryOutcome> {
        let message = match self.transport.fetch_message(&job.channel, job.message_id).await {
            Ok(message) => message,
            Err(TransportError::RateLimited { retry_after }) => {
                self.pause_for_rate_limit(job, retry_after).await;
                return Ok(DeliveryOutcome::RateLimited);
            },
            Err(e) => {
                warn!(
                    channel = %job.channel,
                    message_id = job.message_id,
                    error = %e,
                    "fetch failed"
                );
                self.reply_best_effort(job.reply.as_ref(), &fetch_failure_text(&e)).await;
                return Ok(DeliveryOutcome::FetchFailed);
            },
        };

        if message.may_have_attachment() {
            self.run_media_pipeline(job, &message).await
        } else {
            self.run_text_pipeline(job, &message).await
        }
    }

    async fn run_media_pipeline(
        &self,
        job: &RelayJob,
        message: &MessageContent,
    ) -> Result<DeliveryOutcome> {
        for stage in MEDIA_STAGES {
            match self.attempt(stage, job, message).await {
                Ok(()) => {
                    info!(
                        channel = %job.channel,
                        message_id = job.message_id,
                        stage = stage.name(),
                        "delivered"
                    );
                    return Ok(DeliveryOutcome::Delivered);
                },
                Err(TransportError::RateLimited { retry_after }) => {
                    self.pause_for_rate_limit(job, retry_after).await;
                    return Ok(DeliveryOutcome::RateLimited);
                },
                Err(e) => {
                    warn!(
                        channel = %job.channel,
                        message_id = job.message_id,
                        stage = stage.name(),
                        error = %e,
                        "delivery stage failed"
                    );
                },
            }
        }

        self.reply_best_effort(
            job.reply.as_ref(),
            "⚠️ Failed to forward content after multiple attempts.",
        )
        .await;
        Ok(DeliveryOutcome::Exhausted)
    }

    /// Text-only jobs use a two-stage subset: forward, else re-send as a new
    /// message with a derived header identifying the origin.
    async fn run_text_pipeline(
        &self,
        job: &RelayJob,
        message: &MessageContent,
    ) -> Result<DeliveryOutcome> {
        match self.transport.forward(job.user, message).await {
            Ok(()) => {
                debug!(channel = %job.channel, message_id = job.message_id, "text forwarded");
                return Ok(DeliveryOutcome::Delivered);
            },
            Err(TransportError::RateLimited { retry_after }) => {
                self.pause_for_rate_limit(job, retry_after).await;
                return Ok(DeliveryOutcome::RateLimited);
            },
            Err(e) => {
                warn!(
                    channel = %job.channel,
                    message_id = job.message_id,
                    error = %e,
                    "text forward failed, re-sending as new message"
                );
            },
        }

        let body = message
            .text
            .as_deref()
            .unwrap_or("⚠️ This message has no text content.");
        let text = format!(
            "📝 Message from {}/{}:\n\n{}",
            job.channel, job.message_id, body
        );
        match self.transport.send_text(job.user, &text).await {
            Ok(()) => Ok(DeliveryOutcome::Delivered),
            Err(TransportError::RateLimited { retry_after }) => {
                self.pause_for_rate_limit(job, retry_after).await;
                Ok(DeliveryOutcome::RateLimited)
            },
            Err(e) => {
                self.reply_best_effort(
                    job.reply.as_ref(),
                    &format!(
                        "❌ Error forwarding message: {}",
                        truncate_summary(&e.to_string())
                    ),
                )
                .await;
                Ok(DeliveryOutcome::Exhausted)
            },
        }
    }

    async fn attempt(
        &self,
        stage: Stage,
        job: &RelayJob,
        message: &MessageContent,
    ) -> std::result::Result<(), TransportError> {
        match stage {
            Stage::DirectForward => self.transport.forward(job.user, message).await,
            Stage::ForwardFromPeer => {
                self.transport
                    .forward_from_peer(job.user, &job.channel, job.message_id)
                    .await
            },
            Stage::CopyContent => self.transport.copy_content(job.user, message).await,
            Stage::CloneUpload => {
                let payload = self.transport.fetch_payload(message).await?;
                self.transport.send_file(job.user, payload).await
            },
        }
    }

    /// Report the server-mandated wait, sleep it out, then give up on the
    /// job. No automatic resume after the wait in this version.
    async fn pause_for_rate_limit(&self, job: &RelayJob, wait: std::time::Duration) {
        warn!(
            channel = %job.channel,
            message_id = job.message_id,
            wait_secs = wait.as_secs(),
            "rate limited, suspending pipeline"
        );
        self.reply_best_effort(
            job.reply.as_ref(),
            &format!(
                "⚠️ Rate limited by Telegram. Please wait {} seconds before trying again.",
                wait.as_secs()
            ),
        )
        .await;
        tokio::time::sleep(wait).await;
    }

    /// Reply, honoring a rate-limit raised by the reply context itself with
    /// the same wait-then-give-up discipline.
    pub(crate) async fn reply_best_effort(&self, reply: &dyn ReplyContext, text: &str) {
        match reply.reply(text).await {
            Ok(()) => {},
            Err(TransportError::RateLimited { retry_after }) => {
                warn!(
                    wait_secs = retry_after.as_secs(),
                    "reply rate limited, waiting"
                );
                tokio::time::sleep(retry_after).await;
            },
            Err(e) => warn!(error = %e, "failed to send reply"),
        }
    }
}

fn fetch_failure_text(error: &TransportError) -> String {
    match error {
        TransportError::PrivateChannel => {
            "❌ This channel is private. The bot needs to be a member to access it.".into()
        },
        TransportError::AdminRequired => {
            "❌ Admin permissions required to access this chat.".into()
        },
        TransportError::Timeout => "⏳ Request timed out. Please try again.".into(),
        TransportError::NotFound => {
            "❌ Message not found. It may have been deleted or the bot has no access.".into()
        },
        _ => "❌ Error fetching message.".into(),
    }
}

/// Cap a summary at [`SUMMARY_MAX_CHARS`] characters.
///
/// Truncation is by character, never by byte, so a multi-byte sequence is
/// never split. Cosmetic only.
#[must_use]
pub fn truncate_summary(text: &str) -> String {
    if text.chars().count() <= SUMMARY_MAX_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
    out.push_str("...");
    out
}
