//! Clipboard text for pasting an update's units and codes into chat.

use crate::models::{Update, UnitStatus};

pub fn units_text(update: &Update) -> String {
    if update.units.is_empty() {
        return "**New Units**\n*No units found.*".to_string();
    }

    let body = update
        .units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            let evolved = if unit.status == UnitStatus::Evo {
                " (Evolved)"
            } else {
                ""
            };
            format!("**{}** - {}{}:", i + 1, unit.name, evolved)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("**New Units**\n{}", body)
}

/// Blank codes are skipped and do not take a number.
pub fn codes_text(update: &Update) -> String {
    let body = update
        .codes
        .iter()
        .filter(|c| !c.code.trim().is_empty())
        .enumerate()
        .map(|(i, c)| format!("**{}** - {} : {}", i + 1, c.code, c.reward))
        .collect::<Vec<_>>();

    if body.is_empty() {
        return "**New Codes**\n*No active codes found.*".to_string();
    }

    format!("**New Codes**\n{}", body.join("\n"))
}
