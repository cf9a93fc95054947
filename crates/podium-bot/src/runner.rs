//! Glue between the scheduler and the Discord-backed leaderboard job.

use async_trait::async_trait;

use podium_board::{run_group_job, BoardError, JobOutcome};
use podium_core::config::ReportTemplate;
use podium_core::types::{GroupConfig, TallyWindow};
use podium_discord::DiscordClient;
use podium_scheduler::JobRunner;

/// Runs the end-to-end job with the Discord client playing all three
/// collaborator roles (event source, membership store, notifier).
pub struct BoardRunner {
    client: DiscordClient,
    template: ReportTemplate,
}

impl BoardRunner {
    pub fn new(client: DiscordClient, template: ReportTemplate) -> Self {
        Self { client, template }
    }
}

#[async_trait]
impl JobRunner for BoardRunner {
    async fn run(
        &self,
        cfg: &GroupConfig,
        window: TallyWindow,
    ) -> Result<JobOutcome, BoardError> {
        run_group_job(
            cfg,
            window,
            &self.client,
            &self.client,
            &self.client,
            &self.template,
        )
        .await
    }
}
