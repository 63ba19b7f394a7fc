//! The `QGC WPL 110` mission text format.
//!
//! First line is the version header, then one tab-separated item per line:
//! `seq current frame command param1 param2 param3 param4 x y z autocontinue`.
//! Pure string functions; file I/O stays with the caller.

use super::item::{MissionFrame, MissionItem};

const WPL_VERSION: u32 = 110;

/// Result of parsing a mission file body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMission {
    pub items: Vec<MissionItem>,
    /// True when parsing stopped at a malformed line; `items` holds
    /// everything up to that point.
    pub truncated: bool,
}

/// Render the mission in sequence order. Sequences are re-stamped to list
/// position on the way out.
pub fn format_mission(items: &[MissionItem]) -> String {
    let mut out = format!("QGC WPL {WPL_VERSION}\r\n");
    for (index, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\r\n",
            index,
            u8::from(item.current),
            item.frame.code(),
            item.command,
            item.param1,
            item.param2,
            item.param3,
            item.param4,
            item.x,
            item.y,
            item.z,
            u8::from(item.autocontinue),
        ));
    }
    out
}

/// Parse a mission file. Fails outright on a bad header; stops at the first
/// malformed item line and reports partial success through `truncated`.
pub fn parse_mission(contents: &str) -> Result<ParsedMission, String> {
    let mut lines = contents.lines();
    let header = lines.next().unwrap_or("");
    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() < 3 || tokens[0] != "QGC" || tokens[1] != "WPL" {
        return Err(String::from("version header not detectable"));
    }
    let version: u32 = tokens[2]
        .parse()
        .map_err(|_| String::from("version header not detectable"))?;
    if version < WPL_VERSION {
        return Err(format!("file is version {version} and is not compatible"));
    }

    let mut items = Vec::new();
    let mut truncated = false;
    let mut have_current = false;
    for line in lines {
        match parse_line(line) {
            Some(mut item) => {
                item.seq = items.len() as u16;
                if item.current {
                    if have_current {
                        item.current = false;
                    } else {
                        have_current = true;
                    }
                }
                items.push(item);
            }
            None => {
                truncated = true;
                break;
            }
        }
    }
    Ok(ParsedMission { items, truncated })
}

fn parse_line(line: &str) -> Option<MissionItem> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 12 {
        return None;
    }
    Some(MissionItem {
        seq: fields[0].parse().ok()?,
        current: parse_flag(fields[1])?,
        frame: MissionFrame::from_code(fields[2].parse().ok()?)?,
        command: fields[3].parse().ok()?,
        param1: fields[4].parse().ok()?,
        param2: fields[5].parse().ok()?,
        param3: fields[6].parse().ok()?,
        param4: fields[7].parse().ok()?,
        x: fields[8].parse().ok()?,
        y: fields[9].parse().ok()?,
        z: fields[10].parse().ok()?,
        autocontinue: parse_flag(fields[11])?,
    })
}

fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}
