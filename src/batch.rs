//! Batch assembly: packing method calls into server-side batch rounds.

use crate::client::Client;
use crate::command::BatchCommands;
use crate::envelope::BatchEnvelope;
use crate::error::{Error, Result};
use serde_json::json;

/// The server-side method that evaluates a command collection in one
/// round-trip.
pub(crate) const BATCH_METHOD: &str = "batch";

impl Client {
    /// Submits the commands as one batch call.
    ///
    /// With `halt` set the server stops processing remaining commands after
    /// the first per-command error. Per-command failures never raise here;
    /// they come back in the envelope's `result_error` section for the caller
    /// to inspect.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::BatchTooLong`] before any network call when the
    /// command count exceeds the configured maximum and `ignore_size_limit`
    /// is unset, and with [`Error::DuplicateBatchLabel`] when two commands
    /// share a label.
    pub async fn call_batch(
        &self,
        commands: &BatchCommands,
        halt: bool,
        ignore_size_limit: bool,
    ) -> Result<BatchEnvelope> {
        if let Some(label) = commands.duplicate_label() {
            return Err(Error::DuplicateBatchLabel(label));
        }
        let max = self.config().max_batch_size;
        if !ignore_size_limit && commands.len() > max {
            return Err(Error::BatchTooLong {
                size: commands.len(),
                max,
            });
        }
        if commands.is_empty() {
            return Ok(BatchEnvelope::empty(commands.is_labeled()));
        }

        let params = json!({
            "halt": if halt { 1 } else { 0 },
            "cmd": commands.cmd_value(),
        });
        let envelope = self.guarded_call(BATCH_METHOD, &params).await?;
        BatchEnvelope::from_envelope(&envelope, commands)
    }

    /// The chunked variant: no hard size ceiling.
    ///
    /// Splits the collection into consecutive chunks of the maximum batch
    /// size, executes each as an independent batch call in order, and merges
    /// the results (label union for labeled input, concatenation for ordered
    /// input; durations summed, start from the first chunk, finish and
    /// throttling metadata from the last). With `halt` set, a chunk that
    /// comes back with any per-command error stops further chunks from being
    /// issued; the merged envelope still carries everything received so far.
    pub async fn call_batches(
        &self,
        commands: &BatchCommands,
        halt: bool,
    ) -> Result<BatchEnvelope> {
        if let Some(label) = commands.duplicate_label() {
            return Err(Error::DuplicateBatchLabel(label));
        }

        let max = self.config().max_batch_size;
        let mut merged = BatchEnvelope::empty(commands.is_labeled());
        let mut offset = 0;
        for chunk in commands.chunks(max) {
            let envelope = self.call_batch(&chunk, halt, true).await?;
            let chunk_failed = envelope.has_errors();
            merged.absorb(envelope, offset);
            offset += chunk.len();
            if halt && chunk_failed {
                tracing::debug!(
                    issued = offset,
                    total = commands.len(),
                    "halting chunked batch after per-command error"
                );
                break;
            }
        }
        Ok(merged)
    }
}
