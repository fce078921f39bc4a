//! Output contract and instructions sent with every extraction request.

use serde_json::{json, Value};

/// Disambiguation rules shared by both input kinds.
const RULES: &str = "DISTINGUISH between BRAND NEW units (added to the game) and REBALANCED \
units (existing units being adjusted). ONLY BRAND NEW UNITS go in the 'units' array. All \
rebalances, buffs and nerfs must go into 'qol' and never into 'units'. Extract all new codes \
with their rewards and all new content (stages, raids, events). Return strictly valid JSON.";

pub fn image_instruction() -> String {
    format!(
        "CRITICAL INSTRUCTION: Analyze these game update screenshots. {}",
        RULES
    )
}

pub fn text_instruction(log: &str) -> String {
    format!(
        "CRITICAL INSTRUCTION: Analyze the following game update log text and split it into \
structured data. {} Text:\n\n{}",
        RULES, log
    )
}

/// Response schema in the service's OpenAPI subset.
pub fn response_schema() -> Value {
    let item = |type_enum: Option<&[&str]>| {
        let mut kind = json!({ "type": "STRING" });
        if let Some(values) = type_enum {
            kind["enum"] = json!(values);
        }
        json!({
            "type": "OBJECT",
            "properties": {
                "type": kind,
                "title": { "type": "STRING" },
                "description": { "type": "STRING" }
            }
        })
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "units": {
                "type": "ARRAY",
                "description": "Brand NEW units being added to the game. NOT units being balanced or adjusted.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "status": { "type": "STRING", "enum": ["Evo", "Unevo"] }
                    }
                }
            },
            "codes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "code": { "type": "STRING" },
                        "reward": { "type": "STRING" }
                    }
                }
            },
            "contentItems": {
                "type": "ARRAY",
                "items": item(None)
            },
            "qol": {
                "type": "ARRAY",
                "description": "Unit adjustments, rebalances, buffs and nerfs. If an existing unit is changed, put it here.",
                "items": item(Some(&["Buff", "Nerf", "Optimization"][..]))
            }
        },
        "required": ["units", "codes", "contentItems", "qol"]
    })
}
