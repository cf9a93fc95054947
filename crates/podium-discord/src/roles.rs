//! Role membership: the award marker is a guild role.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use podium_board::traits::StoreError;
use podium_board::MembershipStore;
use podium_core::types::{GroupId, MarkerRef, ParticipantId};

use crate::client::DiscordClient;
use crate::error::DiscordError;

const MEMBER_PAGE: usize = 1000;

#[derive(Debug, Deserialize)]
struct MemberRow {
    user: UserRow,
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    id: String,
    position: i64,
}

fn mutation_error(participant: ParticipantId, e: DiscordError) -> StoreError {
    if e.is_permission() {
        StoreError::Denied {
            participant,
            reason: e.to_string(),
        }
    } else {
        StoreError::Transport {
            reason: e.to_string(),
        }
    }
}

fn lookup_error(e: DiscordError) -> StoreError {
    StoreError::Transport {
        reason: e.to_string(),
    }
}

#[async_trait]
impl MembershipStore for DiscordClient {
    /// Every member currently carrying the marker role. Pages through the
    /// guild member list with an `after` user-id cursor.
    async fn current_holders(
        &self,
        group: GroupId,
        marker: MarkerRef,
    ) -> std::result::Result<BTreeSet<ParticipantId>, StoreError> {
        let marker_id = marker.to_string();
        let mut holders = BTreeSet::new();
        let mut after = 0u64;

        loop {
            let path = format!("/guilds/{group}/members?limit={MEMBER_PAGE}&after={after}");
            let page: Vec<MemberRow> = self.get_json(&path).await.map_err(lookup_error)?;
            let fetched = page.len();

            for member in page {
                let Ok(uid) = member.user.id.parse::<u64>() else {
                    continue;
                };
                after = after.max(uid);
                if member.roles.iter().any(|r| *r == marker_id) {
                    holders.insert(ParticipantId(uid));
                }
            }

            if fetched < MEMBER_PAGE {
                return Ok(holders);
            }
        }
    }

    async fn grant(
        &self,
        group: GroupId,
        participant: ParticipantId,
        marker: MarkerRef,
    ) -> std::result::Result<(), StoreError> {
        self.put_empty(&format!("/guilds/{group}/members/{participant}/roles/{marker}"))
            .await
            .map_err(|e| mutation_error(participant, e))
    }

    async fn revoke(
        &self,
        group: GroupId,
        participant: ParticipantId,
        marker: MarkerRef,
    ) -> std::result::Result<(), StoreError> {
        self.delete(&format!("/guilds/{group}/members/{participant}/roles/{marker}"))
            .await
            .map_err(|e| mutation_error(participant, e))
    }

    /// The bot's highest role must sit strictly above the marker role —
    /// Discord refuses role mutations at or below the bot's own position.
    async fn can_manage(
        &self,
        group: GroupId,
        marker: MarkerRef,
    ) -> std::result::Result<bool, StoreError> {
        let roles: Vec<RoleRow> = self
            .get_json(&format!("/guilds/{group}/roles"))
            .await
            .map_err(lookup_error)?;
        let me: MemberRow = self
            .get_json(&format!("/users/@me/guilds/{group}/member"))
            .await
            .map_err(lookup_error)?;

        let marker_id = marker.to_string();
        let Some(marker_position) = roles
            .iter()
            .find(|r| r.id == marker_id)
            .map(|r| r.position)
        else {
            warn!(%group, %marker, "marker role no longer exists in guild");
            return Ok(false);
        };

        let my_top = roles
            .iter()
            .filter(|r| me.roles.contains(&r.id))
            .map(|r| r.position)
            .max()
            .unwrap_or(0);

        Ok(my_top > marker_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_rows_deserialize() {
        let raw = r#"[{"user": {"id": "7"}, "roles": ["1", "2"]}]"#;
        let rows: Vec<MemberRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].user.id, "7");
        assert_eq!(rows[0].roles, vec!["1", "2"]);
    }

    #[test]
    fn role_rows_deserialize_with_extra_fields() {
        // The API sends many more fields; unknown keys must be ignored.
        let raw = r#"[{"id": "9", "name": "winners", "position": 4, "color": 0}]"#;
        let rows: Vec<RoleRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows[0].position, 4);
    }
}
