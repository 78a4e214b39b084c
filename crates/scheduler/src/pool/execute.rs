use crate::job::{Failure, FailureKind, Identity, JobState, Outcome};
use crate::policy::WritePolicy;
use crate::pool::Shared;
use pinch_compress::Preserve;
use std::sync::Arc;
use tracing::instrument;

/// Run one job to completion: read, compress, write.
///
/// Never fails; whatever goes wrong ends up in the returned
/// [`JobState::Failed`].
#[instrument(name = "job", skip_all, fields(identity = %identity, policy = %policy))]
pub(super) async fn execute(shared: Arc<Shared>, identity: Identity, policy: WritePolicy, preserve: Preserve) -> JobState {
    match run(&shared, &identity, &policy, preserve).await {
        Ok(outcome) => {
            tracing::info!(
                original_size = outcome.original_size,
                compressed_size = outcome.compressed_size,
                output = %outcome.output.display(),
                "Image compressed"
            );
            JobState::Succeeded(outcome)
        },
        Err(failure) => {
            tracing::warn!(kind = ?failure.kind, reason = %failure, "Job failed");
            JobState::Failed(failure)
        },
    }
}

async fn run(shared: &Shared, identity: &Identity, policy: &WritePolicy, preserve: Preserve) -> Result<Outcome, Failure> {
    // Don't spend compression quota on output that can't be written.
    policy.prepare(&shared.backend).await?;

    let original = shared
        .backend
        .read(identity.path())
        .await
        .map_err(|err| Failure::new(FailureKind::ReadFailed, &*err))?;
    // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
    let original_size = u64::try_from(original.len()).unwrap_or(u64::MAX);

    let payload = shared.compressor.compress(&original, preserve).await.map_err(|err| {
        tracing::debug!(compressor = shared.compressor.name(), error = ?err, "Compression failed");
        Failure::from(FailureKind::Compression((*err).clone()))
    })?;

    let output = policy.write(&shared.backend, &shared.vault, identity, original, &payload.data).await?;
    Ok(Outcome { original_size, compressed_size: payload.output_size, output })
}
