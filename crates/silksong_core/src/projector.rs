//! Projection of the flea-rescue flags into an editable text report, and the
//! merge of an edited report back into the full save document.
//!
//! The report is a sparse view: it only ever carries the names in an
//! allow-list, so edits are always reconciled against a complete document
//! and every other field passes through untouched.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document;
use crate::error::ProjectError;

pub const PLAYER_DATA_KEY: &str = "playerData";

pub const FLAG_COUNT: usize = 30;

/// Report order is the order of this list.
pub const FLEA_FLAGS: [&str; FLAG_COUNT] = [
    "SavedFlea_Ant_03",
    "SavedFlea_Belltown_04",
    "SavedFlea_Bone_06",
    "SavedFlea_Bone_East_05",
    "SavedFlea_Bone_East_10_Church",
    "SavedFlea_Bone_East_17b",
    "SavedFlea_Coral_24",
    "SavedFlea_Coral_35",
    "SavedFlea_Crawl_06",
    "SavedFlea_Dock_03d",
    "SavedFlea_Dock_16",
    "SavedFlea_Dust_09",
    "SavedFlea_Dust_12",
    "SavedFlea_Greymoor_06",
    "SavedFlea_Greymoor_15b",
    "SavedFlea_Library_01",
    "SavedFlea_Library_09",
    "SavedFlea_Peak_05c",
    "SavedFlea_Shadow_10",
    "SavedFlea_Shadow_28",
    "SavedFlea_Shellwood_03",
    "SavedFlea_Slab_06",
    "SavedFlea_Slab_Cell",
    "SavedFlea_Song_11",
    "SavedFlea_Song_14",
    "SavedFlea_Under_21",
    "SavedFlea_Under_23",
    "CaravanLechSaved",
    "tamedGiantFlea",
    "MetTroupeHunterWild",
];

pub const REPORT_HEADER: &str = "# ---- Silksong flea flags ----\n\
# Set each value to true, false or n/a (n/a removes the flag).";
pub const REPORT_FOOTER: &str = "# ---- end of flea flags ----";
pub const MALFORMED_REPORT: &str =
    "# ---- Silksong flea flags ----\n# The save document is malformed; no flags could be read.\n";

static REPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+):\s*(?i:(true|false|n/a))$").expect("report line pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagValue {
    True,
    False,
    #[serde(rename = "n/a")]
    Absent,
}

impl FlagValue {
    pub fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Anything other than a JSON boolean reads as absent.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(b)) => Self::from_bool(*b),
            _ => Self::Absent,
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            "n/a" => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Absent => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Absent => "n/a",
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagReport {
    entries: Vec<(&'static str, FlagValue)>,
}

impl FlagReport {
    pub fn entries(&self) -> &[(&'static str, FlagValue)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<FlagValue> {
        self.entries
            .iter()
            .find(|(flag, _)| *flag == name)
            .map(|&(_, value)| value)
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(64 + self.entries.len() * 32);
        out.push_str(REPORT_HEADER);
        out.push('\n');
        for (name, value) in &self.entries {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value.as_str());
            out.push('\n');
        }
        out.push_str(REPORT_FOOTER);
        out.push('\n');
        out
    }
}

/// Resolves `name` against `allow_list`, returning the list's own string.
pub fn lookup_flag(name: &str, allow_list: &[&'static str]) -> Option<&'static str> {
    allow_list.iter().copied().find(|flag| *flag == name)
}

pub fn project(document_text: &str, allow_list: &[&'static str]) -> String {
    let Ok(value) = document::parse(document_text) else {
        return MALFORMED_REPORT.to_string();
    };
    match project_value(&value, allow_list) {
        Ok(report) => report.render(),
        Err(_) => MALFORMED_REPORT.to_string(),
    }
}

pub fn project_value(
    document: &Value,
    allow_list: &[&'static str],
) -> Result<FlagReport, ProjectError> {
    let section = flag_section(document)?;
    let entries = allow_list
        .iter()
        .map(|&name| (name, FlagValue::from_json(section.and_then(|s| s.get(name)))))
        .collect();
    Ok(FlagReport { entries })
}

/// Extracts the allow-listed edits a report carries, in line order. Lines
/// that do not match `Name: true|false|n/a`, or name a flag outside the
/// allow-list, are skipped.
pub fn parse_report(report: &str, allow_list: &[&'static str]) -> Vec<(&'static str, FlagValue)> {
    report
        .lines()
        .filter_map(|line| {
            let captures = REPORT_LINE.captures(line.trim_end())?;
            let name = lookup_flag(captures.get(1)?.as_str(), allow_list)?;
            let value = FlagValue::parse(captures.get(2)?.as_str())?;
            Some((name, value))
        })
        .collect()
}

/// Merges `report` into `base_document`. A base that cannot be parsed or is
/// structurally malformed comes back unchanged.
pub fn merge(report: &str, base_document: &str, allow_list: &[&'static str]) -> String {
    let Ok(mut value) = document::parse(base_document) else {
        return base_document.to_string();
    };
    match merge_value(report, &mut value, allow_list) {
        Ok(_) => document::to_canonical(&value),
        Err(_) => base_document.to_string(),
    }
}

/// Applies a report to a parsed document and returns how many edits it held.
/// On error the document is left as it was.
pub fn merge_value(
    report: &str,
    document: &mut Value,
    allow_list: &[&'static str],
) -> Result<usize, ProjectError> {
    let edits = parse_report(report, allow_list);
    apply_edits(document, &edits)?;
    Ok(edits.len())
}

/// Sets or removes each flag in order; later edits of the same flag win.
pub fn apply_edits(
    document: &mut Value,
    edits: &[(&'static str, FlagValue)],
) -> Result<(), ProjectError> {
    flag_section(document)?;
    let Value::Object(root) = document else {
        return Err(ProjectError::RootNotAnObject);
    };

    for &(name, value) in edits {
        match value.as_bool() {
            Some(flag) => {
                let section = root
                    .entry(PLAYER_DATA_KEY)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(section) = section {
                    section.insert(name.to_string(), Value::Bool(flag));
                }
            }
            // A non-boolean value already reads as n/a and is kept as it is.
            None => {
                if let Some(Value::Object(section)) = root.get_mut(PLAYER_DATA_KEY)
                    && section.get(name).is_some_and(Value::is_boolean)
                {
                    section.shift_remove(name);
                }
            }
        }
    }
    Ok(())
}

fn flag_section(document: &Value) -> Result<Option<&Map<String, Value>>, ProjectError> {
    let Value::Object(root) = document else {
        return Err(ProjectError::RootNotAnObject);
    };
    match root.get(PLAYER_DATA_KEY) {
        None => Ok(None),
        Some(Value::Object(section)) => Ok(Some(section)),
        Some(_) => Err(ProjectError::SectionNotAnObject(PLAYER_DATA_KEY)),
    }
}
