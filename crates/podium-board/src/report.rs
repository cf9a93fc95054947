//! Report rendering — a pure function of the ranking and the template.

use podium_core::config::ReportTemplate;
use podium_core::types::{MarkerRef, RankedEntry};

/// Render the weekly report.
///
/// Header, then one line per rank 1..=top_n (with the template placeholder
/// and count 0 for ranks nobody earned), an optional prize line per rank,
/// then the footer naming the award marker. Same inputs, same bytes.
///
/// Mentions use chat mention syntax (`<@id>` for participants, `<@&id>` for
/// the marker role) so the notifier can post the text verbatim.
pub fn render_report(
    top: &[RankedEntry],
    top_n: u32,
    template: &ReportTemplate,
    marker: MarkerRef,
) -> String {
    let mut out = String::new();
    out.push_str(&template.header.replace("{top_n}", &top_n.to_string()));
    out.push('\n');

    for rank in 1..=top_n as usize {
        let (mention, count) = match top.get(rank - 1) {
            Some(entry) => (format!("<@{}>", entry.participant), entry.count),
            None => (template.placeholder.clone(), 0),
        };

        match template.rank_labels.get(rank - 1) {
            Some(label) => out.push_str(&format!(
                "{label} Top {rank}: {mention} with more than {count} messages.\n"
            )),
            None => out.push_str(&format!(
                "Top {rank}: {mention} with more than {count} messages.\n"
            )),
        }

        if let Some(prize) = template.prizes.get(rank - 1) {
            out.push_str(&format!("-# Gets {prize}\n"));
        }
    }

    out.push('\n');
    out.push_str(
        &template
            .footer
            .replace("{top_n}", &top_n.to_string())
            .replace("{marker}", &format!("<@&{marker}>")),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_core::types::ParticipantId;

    fn entries(counts: &[(u64, u64)]) -> Vec<RankedEntry> {
        counts
            .iter()
            .map(|&(id, count)| RankedEntry {
                participant: ParticipantId(id),
                count,
            })
            .collect()
    }

    #[test]
    fn renders_mentions_and_counts() {
        let text = render_report(
            &entries(&[(11, 42), (22, 7)]),
            3,
            &ReportTemplate::default(),
            MarkerRef(99),
        );
        assert!(text.contains("Top 1: <@11> with more than 42 messages."));
        assert!(text.contains("Top 2: <@22> with more than 7 messages."));
        assert!(text.contains("<@&99>"));
        assert!(text.contains("top 3 active members"));
    }

    #[test]
    fn short_ranking_fills_placeholders() {
        let text = render_report(&[], 3, &ReportTemplate::default(), MarkerRef(1));
        assert_eq!(text.matches("N/A with more than 0 messages.").count(), 3);
    }

    #[test]
    fn identical_inputs_render_identical_bytes() {
        let top = entries(&[(1, 5), (2, 5)]);
        let template = ReportTemplate::default();
        let a = render_report(&top, 2, &template, MarkerRef(3));
        let b = render_report(&top, 2, &template, MarkerRef(3));
        assert_eq!(a, b);
    }

    #[test]
    fn ranks_past_prize_table_get_no_prize_line() {
        let text = render_report(
            &entries(&[(1, 9), (2, 8), (3, 7), (4, 6)]),
            4,
            &ReportTemplate::default(),
            MarkerRef(5),
        );
        // Default table has three prizes; rank 4 gets a plain line.
        assert_eq!(text.matches("-# Gets").count(), 3);
        assert!(text.contains("Top 4: <@4> with more than 6 messages."));
    }
}
