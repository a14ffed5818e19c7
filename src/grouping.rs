use crate::ledger::PendingLedger;
use crate::models::{DisplayRow, GroupMode, InventoryItem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Where a `Sum` row's per-item contribution comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// Parse a `+N` delta out of the description ("Shells pickup +25");
    /// falls back to the item quantity, then 1.
    Delta,
    /// Use the remote stack quantity directly.
    Quantity,
}

impl Default for ValueSource {
    fn default() -> Self {
        ValueSource::Quantity
    }
}

/// One per-title aggregation rule, keyed by base label. Labels without a
/// rule render as `Count` rows (one per unique unlock).
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRule {
    pub label: String,
    pub mode: GroupMode,
    #[serde(default)]
    pub value: ValueSource,
}

/// Category tab for the overlay. An item matches when its type tag contains
/// any of `types` (case-insensitive) or its name contains any of `names`.
/// A `fallback` tab collects items no other tab claims.
#[derive(Debug, Clone, Deserialize)]
pub struct TabRule {
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
}

impl TabRule {
    fn matches(&self, item: &InventoryItem) -> bool {
        let type_tag = item.item_type.to_lowercase();
        if self.types.iter().any(|t| type_tag.contains(&t.to_lowercase())) {
            return true;
        }
        self.names.iter().any(|n| item.name.contains(n.as_str()))
    }
}

/// External per-title configuration: which labels stack, how their values
/// accumulate, and how items map onto tabs. The core never hardcodes item
/// names; an empty table means every item is an unlock.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupRules {
    #[serde(default)]
    pub groups: Vec<GroupRule>,
    #[serde(default)]
    pub tabs: Vec<TabRule>,
}

impl GroupRules {
    pub fn rule_for(&self, label: &str) -> Option<&GroupRule> {
        self.groups.iter().find(|r| r.label == label)
    }

    /// Stack entries push with `add_item(stack=true)`; unlock entries go
    /// through has_item/add_item.
    pub fn stacks(&self, label: &str) -> bool {
        self.rule_for(label)
            .is_some_and(|r| r.mode == GroupMode::Sum)
    }

    pub fn tab(&self, name: &str) -> Option<&TabRule> {
        self.tabs.iter().find(|t| t.name == name)
    }

    fn item_matches_tab(&self, item: &InventoryItem, tab: &TabRule) -> bool {
        if tab.fallback {
            return !self
                .tabs
                .iter()
                .filter(|t| !t.fallback)
                .any(|t| t.matches(item));
        }
        tab.matches(item)
    }
}

static DELTA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+(\d+)").expect("valid regex"));

/// Parses the last `+N` out of a pickup description, e.g. 25 from
/// "Shells pickup +25". `None` when no parsable delta exists.
pub fn parse_delta(description: &str) -> Option<i32> {
    DELTA_RE
        .captures_iter(description)
        .last()
        .and_then(|c| c[1].parse().ok())
}

/// Strips a trailing `_NNNNNN` event suffix so per-pickup entries group
/// under their base item name.
pub fn base_label(name: &str) -> &str {
    if let Some(idx) = name.rfind('_') {
        let suffix = &name[idx + 1..];
        if suffix.len() == 6 && suffix.chars().all(|c| c.is_ascii_digit()) {
            return &name[..idx];
        }
    }
    name
}

fn row_label(item: &InventoryItem) -> String {
    let mut label = base_label(&item.name).to_string();
    if !item.source.is_empty() {
        label.push_str(&format!(" ({})", item.source));
    }
    label
}

fn contribution(item: &InventoryItem, source: ValueSource) -> i32 {
    let value = match source {
        ValueSource::Delta => parse_delta(&item.description).unwrap_or(item.quantity),
        ValueSource::Quantity => item.quantity,
    };
    value.max(1)
}

/// Turns the flat display list into aggregated UI rows for one tab
/// (`None` = no filtering). Safe to call every tick: a pure function of the
/// display list and ledger.
///
/// The display list holds at most one entry per item name after
/// reconciliation, so a remote item and its unsynced local twin can never
/// both contribute to a row.
pub fn group_rows(
    items: &[InventoryItem],
    ledger: &PendingLedger,
    rules: &GroupRules,
    tab: Option<&str>,
) -> Vec<DisplayRow> {
    let tab_rule = tab.and_then(|name| rules.tab(name));
    let mut rows: Vec<DisplayRow> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        if let Some(t) = tab_rule {
            if !rules.item_matches_tab(item, t) {
                continue;
            }
        }

        let label = row_label(item);
        let (mode, value) = match rules.rule_for(base_label(&item.name)) {
            Some(rule) if rule.mode == GroupMode::Sum => {
                (GroupMode::Sum, contribution(item, rule.value))
            }
            _ => (GroupMode::Count, 1),
        };

        let row = match rows.iter_mut().find(|r| r.mode == mode && r.label == label) {
            Some(existing) => existing,
            None => {
                rows.push(DisplayRow {
                    label,
                    mode,
                    rep_index: index,
                    value: 0,
                    has_pending: false,
                });
                rows.last_mut().expect("just pushed")
            }
        };

        match mode {
            GroupMode::Sum => row.value += value,
            GroupMode::Count => row.value = 1,
        }
        if !row.has_pending && ledger.is_pending(&item.name) {
            row.has_pending = true;
        }
    }

    rows
}

/// Cursor over grouped rows. Row counts shrink when remote items are
/// consumed, so both fields are re-clamped after every rebuild rather than
/// assumed stable.
#[derive(Debug, Clone, Copy)]
pub struct SelectionState {
    pub selected: usize,
    pub scroll: usize,
    pub visible_rows: usize,
}

impl SelectionState {
    pub fn new(visible_rows: usize) -> Self {
        Self {
            selected: 0,
            scroll: 0,
            visible_rows,
        }
    }

    pub fn clamp(&mut self, row_count: usize) {
        if row_count == 0 {
            self.selected = 0;
            self.scroll = 0;
            return;
        }
        if self.selected >= row_count {
            self.selected = row_count - 1;
        }
        if self.scroll > self.selected {
            self.scroll = self.selected;
        }
        if self.selected >= self.scroll + self.visible_rows {
            self.scroll = self.selected + 1 - self.visible_rows;
        }
        let max_scroll = row_count.saturating_sub(self.visible_rows);
        if self.scroll > max_scroll {
            self.scroll = max_scroll;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, item_type: &str, quantity: i32, description: &str) -> InventoryItem {
        InventoryItem {
            id: Some(format!("R-{name}")),
            name: name.to_string(),
            description: description.to_string(),
            source: String::new(),
            item_type: item_type.to_string(),
            quantity,
            nft_id: None,
        }
    }

    fn local(name: &str, item_type: &str, description: &str) -> InventoryItem {
        InventoryItem {
            id: None,
            name: name.to_string(),
            description: description.to_string(),
            source: String::new(),
            item_type: item_type.to_string(),
            quantity: 1,
            nft_id: None,
        }
    }

    fn ammo_rules() -> GroupRules {
        GroupRules {
            groups: vec![
                GroupRule {
                    label: "Shells".to_string(),
                    mode: GroupMode::Sum,
                    value: ValueSource::Delta,
                },
                GroupRule {
                    label: "Green Armor".to_string(),
                    mode: GroupMode::Sum,
                    value: ValueSource::Quantity,
                },
            ],
            tabs: vec![
                TabRule {
                    name: "Ammo".to_string(),
                    types: vec!["ammo".to_string()],
                    names: vec!["Shells".to_string()],
                    fallback: false,
                },
                TabRule {
                    name: "Items".to_string(),
                    types: vec![],
                    names: vec![],
                    fallback: true,
                },
            ],
        }
    }

    #[test]
    fn t_parse_delta() {
        assert_eq!(parse_delta("Shells pickup +25"), Some(25));
        assert_eq!(parse_delta("+5 then +12"), Some(12));
        assert_eq!(parse_delta("no delta here"), None);
        assert_eq!(parse_delta(""), None);
    }

    #[test]
    fn t_base_label_strips_event_suffix() {
        assert_eq!(base_label("Shells_000123"), "Shells");
        assert_eq!(base_label("Shells_12"), "Shells_12");
        assert_eq!(base_label("Shells_abcdef"), "Shells_abcdef");
        assert_eq!(base_label("Silver Key"), "Silver Key");
    }

    #[test]
    fn t_sum_rows_accumulate_deltas() {
        let ledger = PendingLedger::new();
        let items = vec![
            local("Shells_000001", "Ammo", "Shells pickup +25"),
            local("Shells_000002", "Ammo", "Shells pickup +10"),
            local("Shells_000003", "Ammo", "Shells pickup +5"),
        ];
        let rows = group_rows(&items, &ledger, &ammo_rules(), None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "Shells");
        assert_eq!(rows[0].mode, GroupMode::Sum);
        assert_eq!(rows[0].value, 40);
        assert_eq!(rows[0].rep_index, 0);
    }

    #[test]
    fn t_count_rows_stay_at_one() {
        let ledger = PendingLedger::new();
        let items = vec![
            remote("Silver Key", "KeyItem", 1, ""),
            remote("Silver Key", "KeyItem", 1, ""),
            remote("Silver Key", "KeyItem", 1, ""),
        ];
        let rows = group_rows(&items, &ledger, &GroupRules::default(), None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mode, GroupMode::Count);
        assert_eq!(rows[0].value, 1);
    }

    #[test]
    fn t_unparsable_delta_contributes_quantity_floor_one() {
        let ledger = PendingLedger::new();
        let items = vec![remote("Shells", "Ammo", 0, "no delta")];
        let rows = group_rows(&items, &ledger, &ammo_rules(), None);
        assert_eq!(rows[0].value, 1);
    }

    #[test]
    fn t_quantity_source_uses_remote_stack() {
        let ledger = PendingLedger::new();
        let items = vec![remote("Green Armor", "Armor", 3, "")];
        let rows = group_rows(&items, &ledger, &ammo_rules(), None);
        assert_eq!(rows[0].value, 3);
    }

    #[test]
    fn t_source_tag_in_label() {
        let ledger = PendingLedger::new();
        let mut item = remote("Red Keycard", "KeyItem", 1, "");
        item.source = "ODOOM".to_string();
        let rows = group_rows(&[item], &ledger, &GroupRules::default(), None);
        assert_eq!(rows[0].label, "Red Keycard (ODOOM)");
    }

    #[test]
    fn t_tab_filter_and_fallback() {
        let ledger = PendingLedger::new();
        let items = vec![
            remote("Shells", "Ammo", 25, ""),
            remote("Rune of Earth Magic", "Sigil", 1, ""),
        ];
        let rules = ammo_rules();

        let ammo = group_rows(&items, &ledger, &rules, Some("Ammo"));
        assert_eq!(ammo.len(), 1);
        assert_eq!(ammo[0].label, "Shells");

        let misc = group_rows(&items, &ledger, &rules, Some("Items"));
        assert_eq!(misc.len(), 1);
        assert_eq!(misc[0].label, "Rune of Earth Magic");
    }

    #[test]
    fn t_pending_flag_from_ledger() {
        let mut ledger = PendingLedger::new();
        let name = ledger
            .record_event("Shells", "Shells pickup +25", "Ammo", "Quake")
            .unwrap();
        let items = vec![local(&name, "Ammo", "Shells pickup +25")];
        let rows = group_rows(&items, &ledger, &ammo_rules(), None);
        assert!(rows[0].has_pending);

        ledger.mark_pushed(&[name]);
        let rows = group_rows(&items, &ledger, &ammo_rules(), None);
        assert!(!rows[0].has_pending);
    }

    #[test]
    fn t_selection_clamps_after_shrink() {
        let mut sel = SelectionState::new(8);
        sel.selected = 12;
        sel.scroll = 9;
        sel.clamp(5);
        assert_eq!(sel.selected, 4);
        assert_eq!(sel.scroll, 0);

        sel.clamp(0);
        assert_eq!(sel.selected, 0);
        assert_eq!(sel.scroll, 0);
    }

    #[test]
    fn t_selection_scrolls_to_keep_cursor_visible() {
        let mut sel = SelectionState::new(3);
        sel.selected = 7;
        sel.clamp(10);
        assert_eq!(sel.selected, 7);
        assert_eq!(sel.scroll, 5);
    }
}
