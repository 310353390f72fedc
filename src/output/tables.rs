use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use ciseed::ci::When;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn when_cell(when: When) -> Cell {
    let color = match when {
        When::OnSuccess => TableColor::Green,
        When::Manual => TableColor::Yellow,
        When::OnFailure => TableColor::Red,
        When::Always => TableColor::Blue,
    };
    Cell::new(when.to_string()).fg(color)
}

pub fn flag_cell(flag: bool) -> Cell {
    if flag {
        Cell::new("yes").fg(TableColor::Yellow)
    } else {
        Cell::new("no").fg(TableColor::DarkGrey)
    }
}
