//! Module metadata and pattern cell text.

use crate::frequency::period_to_note_name;
use crate::mod_format::{Cell, Module};

/// Keys answered by [`metadata`], semicolon-joined.
pub const METADATA_KEYS: &str = "type;type_long;tracker;title;message";

/// Look up one metadata value. Unknown keys yield an empty string.
pub fn metadata(module: &Module, key: &str) -> String {
    match key {
        "type" => "mod".to_string(),
        "type_long" => "ProTracker MOD".to_string(),
        "tracker" => module.tracker.to_string(),
        "title" => module.title.clone(),
        // MOD has no song message; sample names are used for one
        "message" => module
            .samples
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Render a cell as tracker text, e.g. `C-2 01 C40`.
pub fn format_cell(cell: &Cell) -> String {
    let note = if cell.period == 0 {
        "...".to_string()
    } else {
        period_to_note_name(cell.period)
    };
    let sample = if cell.sample == 0 {
        "..".to_string()
    } else {
        format!("{:02}", cell.sample)
    };
    let effect = if cell.effect == 0 && cell.param == 0 {
        "...".to_string()
    } else {
        format!("{:X}{:02X}", cell.effect, cell.param)
    };
    format!("{note} {sample} {effect}")
}
