//! The end-to-end leaderboard run for one group.

use tracing::{info, warn};

use podium_core::config::ReportTemplate;
use podium_core::types::{GroupConfig, ParticipantId, RotationDelta, TallyResult, TallyWindow};

use crate::error::{BoardError, Result};
use crate::report::render_report;
use crate::rotate::rotate;
use crate::tally::tally;
use crate::traits::{EventSource, MembershipStore, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    Grant,
    Revoke,
}

/// A single participant whose marker change failed. Non-fatal — the run
/// continues past it.
#[derive(Debug, Clone)]
pub struct MarkerFailure {
    pub participant: ParticipantId,
    pub action: MarkerAction,
    pub reason: String,
}

/// What a completed run produced, for logging and interactive callers.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub ranking: TallyResult,
    pub delta: RotationDelta,
    pub marker_failures: Vec<MarkerFailure>,
    pub report: String,
}

/// Run tally → rotate → report → notify for one group.
///
/// Order of failure domains:
/// - privilege precondition fails → nothing is attempted, rotation *and*
///   report are skipped for this run;
/// - source read fails → partial counts discarded, nothing downstream runs;
/// - individual grant/revoke failures are collected and the run continues;
/// - the report is rendered from the ranking regardless of marker failures.
pub async fn run_group_job(
    cfg: &GroupConfig,
    window: TallyWindow,
    source: &dyn EventSource,
    members: &dyn MembershipStore,
    notifier: &dyn Notifier,
    template: &ReportTemplate,
) -> Result<JobOutcome> {
    cfg.validate()
        .map_err(|e| BoardError::ConfigIncomplete(e.to_string()))?;

    let can_manage = members
        .can_manage(cfg.group, cfg.marker)
        .await
        .map_err(BoardError::Store)?;
    if !can_manage {
        return Err(BoardError::PrivilegeInsufficient {
            group: cfg.group,
            marker: cfg.marker,
        });
    }

    let events = source.events(cfg.source_channel, window);
    let ranking = tally(events, window, cfg.top_n as usize).await?;
    info!(
        group = %cfg.group,
        qualified = ranking.len(),
        "tally complete"
    );

    let holders = members
        .current_holders(cfg.group, cfg.marker)
        .await
        .map_err(BoardError::Store)?;
    let delta = rotate(&holders, &ranking);

    let mut marker_failures = Vec::new();
    for &participant in &delta.to_remove {
        if let Err(e) = members.revoke(cfg.group, participant, cfg.marker).await {
            warn!(group = %cfg.group, %participant, error = %e, "marker revoke failed");
            marker_failures.push(MarkerFailure {
                participant,
                action: MarkerAction::Revoke,
                reason: e.to_string(),
            });
        }
    }
    for &participant in &delta.to_add {
        if let Err(e) = members.grant(cfg.group, participant, cfg.marker).await {
            warn!(group = %cfg.group, %participant, error = %e, "marker grant failed");
            marker_failures.push(MarkerFailure {
                participant,
                action: MarkerAction::Grant,
                reason: e.to_string(),
            });
        }
    }

    let report = render_report(&ranking, cfg.top_n, template, cfg.marker);
    notifier.send(cfg.report_channel, &report).await?;

    info!(
        group = %cfg.group,
        removed = delta.to_remove.len(),
        added = delta.to_add.len(),
        failures = marker_failures.len(),
        "leaderboard run complete"
    );

    Ok(JobOutcome {
        ranking,
        delta,
        marker_failures,
        report,
    })
}
