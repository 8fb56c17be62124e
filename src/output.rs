use crate::classify::{Evaluated, SweepPlan};
use crate::mover::{MoveReport, PlannedMove};
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Selected,
    Skipped,
    Warning,
    Error,
    Heading,
}

#[must_use]
pub fn paint(text: &str, style: Style) -> String {
    let styled = match style {
        Style::Selected => text.blue(),
        Style::Skipped => text.white(),
        Style::Warning => text.yellow(),
        Style::Error => text.red(),
        Style::Heading => text.cyan(),
    };
    styled.to_string()
}

/// `<age>\t\t<path>`, blue when the file will be swept.
#[must_use]
pub fn age_line(evaluated: &Evaluated) -> String {
    let style = if evaluated.selected {
        Style::Selected
    } else {
        Style::Skipped
    };
    paint(
        &format!("{}\t\t{}", evaluated.age, evaluated.entry.path.display()),
        style,
    )
}

#[must_use]
pub fn move_line(planned: &PlannedMove) -> String {
    format!("mv {} -> {}", planned.src.display(), planned.dst.display())
}

#[must_use]
pub fn summary_table(plan: &SweepPlan, moves: &[PlannedMove], report: Option<&MoveReport>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(vec!["Evaluated", "Never used", "Selected", "Moved", "Failed", "Size"]);

    let (moved, failed, bytes) = match report {
        Some(r) => (
            r.moved.len().to_string(),
            r.failed.len(),
            r.bytes_moved(),
        ),
        None => (
            "-".to_string(),
            0,
            moves.iter().map(|m| m.size).sum(),
        ),
    };

    table.add_row(vec![
        Cell::new(plan.evaluated.len()),
        Cell::new(plan.unknown_count()),
        Cell::new(plan.selected_count()).add_attribute(Attribute::Bold),
        Cell::new(moved),
        Cell::new(failed).fg(if failed > 0 { Color::Red } else { Color::White }),
        Cell::new(human_bytes::human_bytes(bytes as f64)),
    ]);

    table
}
