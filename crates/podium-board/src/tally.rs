//! Tally engine: one pass over the event stream, then rank.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::{pin_mut, Stream, StreamExt};

use podium_core::types::{ParticipantId, RankedEntry, TallyResult, TallyWindow};

use crate::error::{BoardError, Result};
use crate::traits::{ChannelEvent, SourceError};

struct Slot {
    count: u64,
    /// Earliest event timestamp for this participant — primary tie-breaker.
    first_seen: DateTime<Utc>,
    /// Position of the participant's first event in the stream — secondary
    /// tie-breaker so equal timestamps still order deterministically.
    arrival: usize,
}

/// Consume `events` once and produce the ranking.
///
/// Bot events are skipped, as is anything outside `window` — the source is
/// asked for a bounded range but is not trusted to honour it. Ordering is
/// (count desc, first-seen asc, arrival asc), truncated to `top_n`.
///
/// A stream error aborts the whole tally: partial counts are discarded and
/// the caller must not proceed to rotation or report.
pub async fn tally<S>(events: S, window: TallyWindow, top_n: usize) -> Result<TallyResult>
where
    S: Stream<Item = std::result::Result<ChannelEvent, SourceError>>,
{
    pin_mut!(events);

    let mut slots: HashMap<ParticipantId, Slot> = HashMap::new();
    let mut arrivals = 0usize;

    while let Some(event) = events.next().await {
        let event = event.map_err(BoardError::SourceRead)?;
        if event.from_bot || !window.contains(event.timestamp) {
            continue;
        }

        let slot = slots.entry(event.author).or_insert_with(|| {
            let slot = Slot {
                count: 0,
                first_seen: event.timestamp,
                arrival: arrivals,
            };
            arrivals += 1;
            slot
        });
        slot.count += 1;
        if event.timestamp < slot.first_seen {
            slot.first_seen = event.timestamp;
        }
    }

    let mut ranked: Vec<(ParticipantId, Slot)> = slots.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        b.count
            .cmp(&a.count)
            .then(a.first_seen.cmp(&b.first_seen))
            .then(a.arrival.cmp(&b.arrival))
    });
    ranked.truncate(top_n);

    Ok(ranked
        .into_iter()
        .map(|(participant, slot)| RankedEntry {
            participant,
            count: slot.count,
        })
        .collect())
}
