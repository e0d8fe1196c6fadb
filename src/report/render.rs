//! Plain-text rendering of scope blocks.
//!
//! Connectors produce typed [`ActivityItem`]s; this is the only place they
//! become text. The output is the `combined_text` field of a source record,
//! which the report compiler feeds to its prompt.

use crate::models::{ActivityItem, ItemKind, ScopeBlock, SourceKind};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Render every block of a source, in order, each with its own delimiter.
pub fn render_blocks(kind: SourceKind, blocks: &[ScopeBlock]) -> String {
    blocks
        .iter()
        .map(|block| render_block(kind, block))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render one scope block with a header line.
pub fn render_block(kind: SourceKind, block: &ScopeBlock) -> String {
    let mut text = String::new();

    text.push_str(&format!(
        "=== {} {} ({} items) ===\n",
        kind.label(),
        block.scope_id,
        block.item_count
    ));

    if block.items.is_empty() {
        text.push_str("No activity in this period.\n");
        return text;
    }

    let items: Vec<String> = block.items.iter().map(render_item).collect();
    text.push_str(&items.join("\n"));
    text
}

/// Render a single item as a few indented lines.
pub fn render_item(item: &ActivityItem) -> String {
    if item.kind == ItemKind::Message {
        return render_message(item);
    }

    let mut text = String::new();

    match item.url {
        Some(ref url) => text.push_str(&format!("[{}]({}) - {}\n", item.id, url, item.title)),
        None => text.push_str(&format!("{} - {}\n", item.id, item.title)),
    }

    text.push_str(&format!("  Type: {}\n", item.kind));
    text.push_str(&format!("  Status: {}\n", item.state));
    text.push_str(&format!("  {}: {}\n", actor_label(item.kind), item.actor));
    text.push_str(&format!(
        "  Created: {}\n",
        item.created_at.format(TIMESTAMP_FORMAT)
    ));
    if item.updated_at != item.created_at {
        text.push_str(&format!(
            "  Updated: {}\n",
            item.updated_at.format(TIMESTAMP_FORMAT)
        ));
    }
    if let Some(resolved) = item.resolved_at {
        let label = if item.kind == ItemKind::PullRequest && item.state == "merged" {
            "Merged"
        } else {
            "Resolved"
        };
        text.push_str(&format!("  {}: {}\n", label, resolved.format(TIMESTAMP_FORMAT)));
    }
    if !item.labels.is_empty() {
        text.push_str(&format!("  Labels: {}\n", item.labels.join(", ")));
    }
    if let Some(ref detail) = item.detail {
        text.push_str(&format!("  Description: {}\n", detail));
    }

    text
}

/// Chat messages read better as `#channel - sender (time): text`.
fn render_message(item: &ActivityItem) -> String {
    let channel = item
        .labels
        .iter()
        .find(|l| l.starts_with('#'))
        .map(String::as_str)
        .unwrap_or("#unknown");
    let replies = item
        .labels
        .iter()
        .find_map(|l| l.strip_prefix("replies:"))
        .map(|n| format!(" [{} replies]", n))
        .unwrap_or_default();
    let body = item.detail.as_deref().unwrap_or(&item.title);

    format!(
        "{} - {} ({}){}:\n{}\n",
        channel,
        item.actor,
        item.created_at.format("%Y-%m-%d %H:%M"),
        replies,
        body
    )
}

fn actor_label(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Issue => "Assignee",
        ItemKind::PullRequest | ItemKind::Commit => "Author",
        ItemKind::Message => "From",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn issue() -> ActivityItem {
        let mut item = ActivityItem::new(
            ItemKind::Issue,
            "OPS-1",
            "Rotate certs",
            "Alice",
            "Closed",
            Utc.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap(),
        );
        item.url = Some("https://jira.example.com/browse/OPS-1".to_string());
        item.resolved_at = Some(Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap());
        item.labels = vec!["priority:Major".to_string()];
        item
    }

    #[test]
    fn test_render_issue() {
        let text = render_item(&issue());
        assert!(text.starts_with("[OPS-1](https://jira.example.com/browse/OPS-1) - Rotate certs\n"));
        assert!(text.contains("  Status: Closed\n"));
        assert!(text.contains("  Assignee: Alice\n"));
        assert!(text.contains("  Resolved: 2026-10-14 09:00 UTC\n"));
        assert!(text.contains("  Labels: priority:Major\n"));
        assert!(!text.contains("Updated:"));
    }

    #[test]
    fn test_render_message() {
        let mut msg = ActivityItem::new(
            ItemKind::Message,
            "C1:1.0",
            "Deploy done",
            "bob",
            "posted",
            Utc.with_ymd_and_hms(2026, 10, 13, 14, 5, 0).unwrap(),
        );
        msg.labels = vec!["#ops".to_string(), "replies:2".to_string()];

        assert_eq!(
            render_item(&msg),
            "#ops - bob (2026-10-13 14:05) [2 replies]:\nDeploy done\n"
        );
    }

    #[test]
    fn test_blocks_are_delimited_in_order() {
        let blocks = vec![
            ScopeBlock {
                scope_id: "project:A".to_string(),
                item_count: 1,
                items: vec![issue()],
            },
            ScopeBlock {
                scope_id: "project:B".to_string(),
                item_count: 0,
                items: vec![],
            },
        ];

        let text = render_blocks(SourceKind::IssueTracker, &blocks);
        let a = text.find("=== Jira project:A (1 items) ===").unwrap();
        let b = text.find("=== Jira project:B (0 items) ===").unwrap();
        assert!(a < b);
        assert!(text.contains("No activity in this period."));
    }

    #[test]
    fn test_no_blocks_renders_empty() {
        assert_eq!(render_blocks(SourceKind::Chat, &[]), "");
    }
}
