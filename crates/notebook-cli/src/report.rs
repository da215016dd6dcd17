//! Terminal tables for replay results and learned preferences.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use notebook_autosave::{LearnedPreferences, TypingPattern};

use crate::replay::ReplayReport;

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn pattern_cell(pattern: TypingPattern) -> Cell {
    let color = match pattern {
        TypingPattern::Idle => Color::Green,
        TypingPattern::Pasting => Color::Blue,
        TypingPattern::FastTyping | TypingPattern::RapidChanges => Color::Yellow,
        TypingPattern::SteadyTyping | TypingPattern::Editing => Color::White,
        TypingPattern::Unknown => Color::DarkGrey,
    };
    Cell::new(pattern).fg(color)
}

/// One row per replayed edit.
pub fn replay_table(report: &ReplayReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("At (ms)"),
        header_cell("Edit"),
        header_cell("Pattern"),
        header_cell("Conf."),
        header_cell("Chars/min"),
        header_cell("Delay (ms)"),
        header_cell("Save now"),
        header_cell("Reason"),
    ]);
    apply_table_style(&mut table);
    for step in &report.steps {
        table.add_row(vec![
            Cell::new(step.at_ms),
            Cell::new(step.kind),
            pattern_cell(step.pattern),
            Cell::new(format!("{:.1}", step.confidence)),
            Cell::new(step.typing_speed),
            Cell::new(step.scheduled_delay),
            Cell::new(if step.should_save_now { "yes" } else { "" }),
            Cell::new(&step.reason),
        ]);
    }
    for index in [0, 3, 4, 5] {
        align_column(&mut table, index, CellAlignment::Right);
    }
    align_column(&mut table, 6, CellAlignment::Center);
    table
}

/// One-line description of where the replay ended up.
pub fn replay_summary(report: &ReplayReport) -> String {
    let Some(last) = report.final_step() else {
        return "No edits replayed".to_string();
    };
    let patterns = report
        .pattern_counts()
        .into_iter()
        .map(|(pattern, count)| format!("{pattern}={count}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Replayed {} edits over {} ms (base delay {} ms): final pattern {}, next save in {} ms [{}]",
        report.steps.len(),
        last.at_ms.saturating_sub(report.steps[0].at_ms),
        report.base_delay,
        last.pattern,
        last.scheduled_delay,
        patterns
    )
}

/// One row per pattern with learned delays.
pub fn preferences_table(preferences: &LearnedPreferences) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Pattern"),
        header_cell("Samples"),
        header_cell("Average (ms)"),
        header_cell("Latest (ms)"),
    ]);
    apply_table_style(&mut table);
    for (pattern, samples) in preferences.iter() {
        let average = preferences
            .average(pattern)
            .map(|avg| avg.to_string())
            .unwrap_or_default();
        let latest = samples.last().map(ToString::to_string).unwrap_or_default();
        table.add_row(vec![
            pattern_cell(pattern),
            Cell::new(samples.len()),
            Cell::new(average),
            Cell::new(latest),
        ]);
    }
    for index in 1..4 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{ReplayStep, replay};
    use notebook_autosave::{AutoSaveSettings, EditKind};

    fn step(at_ms: u64, pattern: TypingPattern, delay: u64) -> ReplayStep {
        ReplayStep {
            at_ms,
            kind: EditKind::Insert,
            pattern,
            confidence: 0.8,
            typing_speed: 120,
            edit_frequency: 18.0,
            recommended_delay: delay,
            scheduled_delay: delay,
            should_save_now: false,
            reason: "Steady typing, moderate delay".to_string(),
        }
    }

    #[test]
    fn test_replay_summary() {
        let report = ReplayReport {
            base_delay: 2_000,
            steps: vec![
                step(100, TypingPattern::Unknown, 2_000),
                step(400, TypingPattern::SteadyTyping, 3_000),
                step(700, TypingPattern::SteadyTyping, 3_000),
            ],
        };
        insta::assert_snapshot!(
            replay_summary(&report),
            @"Replayed 3 edits over 600 ms (base delay 2000 ms): final pattern steady_typing, next save in 3000 ms [steady_typing=2, unknown=1]"
        );
    }

    #[test]
    fn test_empty_summary() {
        let report = replay(&[], &AutoSaveSettings::default());
        assert_eq!(replay_summary(&report), "No edits replayed");
    }

    #[test]
    fn test_replay_table_lists_patterns() {
        let report = ReplayReport {
            base_delay: 2_000,
            steps: vec![
                step(0, TypingPattern::Unknown, 2_000),
                step(300, TypingPattern::SteadyTyping, 3_000),
            ],
        };
        let rendered = replay_table(&report).to_string();
        assert!(rendered.contains("unknown"));
        assert!(rendered.contains("steady_typing"));
        assert!(rendered.contains("3000"));
    }

    #[test]
    fn test_preferences_table_rows() {
        let mut preferences = LearnedPreferences::default();
        preferences.record(TypingPattern::Idle, 1_000);
        preferences.record(TypingPattern::Idle, 800);
        preferences.record(TypingPattern::FastTyping, 4_000);

        let rendered = preferences_table(&preferences).to_string();
        assert!(rendered.contains("idle"));
        assert!(rendered.contains("900"));
        assert!(rendered.contains("fast_typing"));
    }
}
