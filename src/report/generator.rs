//! Console run summary.
//!
//! Builds the human-facing overview printed after each team run: one line
//! per source with its status, item count and failing scopes, followed by
//! the most active people across all sources.

use crate::models::{ActivityItem, SourceKind, SourceRecord, SourceStatus, UnifiedDocument};
use std::collections::HashMap;
use std::path::Path;

/// Generate the summary printed after a team's document has been saved.
pub fn generate_run_summary(doc: &UnifiedDocument, path: &Path) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(doc));

    for kind in SourceKind::ALL {
        output.push_str(&generate_source_line(doc.sources.get(kind)));
    }

    let actors = most_active_actors(doc, 5);
    if !actors.is_empty() {
        output.push_str("\n   Most active:\n");
        for (actor, count) in actors {
            output.push_str(&format!("     {:<24} {}\n", actor, count));
        }
    }

    output.push_str(&format!("\n   Total items: {}\n", doc.total_items()));
    output.push_str(&format!("   Saved to: {}\n", path.display()));

    output
}

fn generate_header(doc: &UnifiedDocument) -> String {
    format!(
        "\n📊 {} ({} to {}):\n",
        doc.metadata.team_display_name, doc.metadata.period_start, doc.metadata.period_end
    )
}

/// One status line per source, plus an indented line per failing scope.
fn generate_source_line(source: &SourceRecord) -> String {
    let kind = source.source_kind;
    let marker = match source.status {
        SourceStatus::Ok | SourceStatus::Empty => "✅",
        SourceStatus::Partial => "⚠️ ",
        SourceStatus::Failed | SourceStatus::Degraded => "❌",
    };

    let mut line = format!(
        "   {} {} {:<7} {:>4} items from {} scopes ({})\n",
        marker,
        kind.emoji(),
        kind.label(),
        source.total_count,
        source.scopes_queried,
        source.status
    );

    if source.status == SourceStatus::Degraded {
        line.push_str("        credentials not configured\n");
    }
    for failure in &source.partial_failures {
        line.push_str(&format!(
            "        {} failed: {} ({})\n",
            failure.scope_id, failure.error, failure.message
        ));
    }

    line
}

/// Group every item of the document by actor.
pub fn group_by_actor(doc: &UnifiedDocument) -> HashMap<&str, Vec<&ActivityItem>> {
    let mut grouped: HashMap<&str, Vec<&ActivityItem>> = HashMap::new();

    for item in doc
        .sources
        .iter()
        .flat_map(|s| s.scopes.iter())
        .flat_map(|b| b.items.iter())
    {
        grouped.entry(item.actor.as_str()).or_default().push(item);
    }

    grouped
}

/// The `n` actors with the most items, highest first. Ties sort by name.
pub fn most_active_actors(doc: &UnifiedDocument, n: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = group_by_actor(doc)
        .into_iter()
        .filter(|(actor, _)| *actor != "Unassigned")
        .map(|(actor, items)| (actor.to_string(), items.len()))
        .collect();

    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(n);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{degraded_source, merge_source};
    use crate::models::{ActivityRecord, DateRange, DocumentMetadata, ItemKind, ScopeError, Sources};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 10, 11).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        )
        .unwrap()
    }

    fn item(kind: ItemKind, id: &str, actor: &str) -> ActivityItem {
        ActivityItem::new(
            kind,
            id,
            "Title",
            actor,
            "open",
            Utc.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap(),
        )
    }

    fn create_test_document() -> UnifiedDocument {
        let jira = merge_source(
            SourceKind::IssueTracker,
            range(),
            vec![
                ActivityRecord::success(
                    SourceKind::IssueTracker,
                    "project:OPS",
                    vec![
                        item(ItemKind::Issue, "OPS-1", "alice"),
                        item(ItemKind::Issue, "OPS-2", "Unassigned"),
                    ],
                ),
                ActivityRecord::failure(
                    SourceKind::IssueTracker,
                    "project:NET",
                    ScopeError::transport("HTTP 503"),
                ),
            ],
        );
        let github = merge_source(
            SourceKind::CodeHost,
            range(),
            vec![ActivityRecord::success(
                SourceKind::CodeHost,
                "author:alice",
                vec![
                    item(ItemKind::PullRequest, "acme/site#1", "alice"),
                    item(ItemKind::Commit, "abc1234", "bob"),
                ],
            )],
        );

        UnifiedDocument {
            metadata: DocumentMetadata {
                team_id: "infra".to_string(),
                team_display_name: "Infrastructure".to_string(),
                period_start: range().start(),
                period_end: range().end(),
                generated_at: Utc::now(),
            },
            sources: Sources {
                issue_tracker: jira,
                code_host: github,
                chat: degraded_source(SourceKind::Chat, range()),
            },
        }
    }

    #[test]
    fn test_generate_run_summary() {
        let doc = create_test_document();
        let summary = generate_run_summary(&doc, Path::new("data/infra/infra-x.json"));

        assert!(summary.contains("Infrastructure (2026-10-11 to 2026-10-18)"));
        assert!(summary.contains("Jira"));
        assert!(summary.contains("project:NET failed: transport failure (HTTP 503)"));
        assert!(summary.contains("credentials not configured"));
        assert!(summary.contains("Total items: 4"));
        assert!(summary.contains("Saved to: data/infra/infra-x.json"));

        // Sources appear in the fixed order
        let jira = summary.find("Jira").unwrap();
        let github = summary.find("GitHub").unwrap();
        let slack = summary.find("Slack").unwrap();
        assert!(jira < github && github < slack);
    }

    #[test]
    fn test_most_active_actors() {
        let doc = create_test_document();
        let actors = most_active_actors(&doc, 5);
        assert_eq!(
            actors,
            vec![("alice".to_string(), 2), ("bob".to_string(), 1)]
        );
    }

    #[test]
    fn test_group_by_actor_spans_sources() {
        let doc = create_test_document();
        let grouped = group_by_actor(&doc);
        let alice: Vec<ItemKind> = grouped["alice"].iter().map(|i| i.kind).collect();
        assert_eq!(alice, vec![ItemKind::Issue, ItemKind::PullRequest]);
        assert_eq!(grouped["Unassigned"].len(), 1);
    }
}
