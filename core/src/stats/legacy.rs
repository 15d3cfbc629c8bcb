//! Parser for the oldest on-disk stats format: one delimited line per room,
//! `room;<debugName>;<goldenDeaths>;<goldenDeathsSession>;<0/1,...>`, plus a
//! `current;<debugName>` line. Migrated files are rewritten as the current
//! segmented JSON on the next save.

use thiserror::Error;

use super::{ChapterStats, RoomStats};

#[derive(Debug, Error)]
pub enum LegacyStatsError {
    #[error("empty stats file")]
    Empty,
    #[error("malformed stats line {line}")]
    MalformedLine { line: usize },
    #[error("unknown record type '{kind}' on line {line}")]
    UnknownRecord { kind: String, line: usize },
}

pub fn parse(content: &str) -> Result<ChapterStats, LegacyStatsError> {
    let mut stats = ChapterStats::default();
    let mut saw_record = false;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || LegacyStatsError::MalformedLine { line: idx + 1 };

        let (kind, rest) = line.split_once(';').ok_or_else(malformed)?;
        match kind {
            "current" => {
                stats.current_room = rest.to_string();
                saw_record = true;
            }
            "room" => {
                let parts: Vec<&str> = rest.split(';').collect();
                let [name, deaths, deaths_session, outcomes] = parts[..] else {
                    return Err(malformed());
                };
                let mut room = RoomStats::new(name);
                room.golden_deaths = deaths.parse().map_err(|_| malformed())?;
                room.golden_deaths_session =
                    deaths_session.parse().map_err(|_| malformed())?;
                for outcome in outcomes.split(',').filter(|o| !o.is_empty()) {
                    match outcome {
                        "0" => room.attempts.push(false),
                        "1" => room.attempts.push(true),
                        _ => return Err(malformed()),
                    }
                }
                stats.rooms.insert(name.to_string(), room);
                saw_record = true;
            }
            other => {
                return Err(LegacyStatsError::UnknownRecord {
                    kind: other.to_string(),
                    line: idx + 1,
                });
            }
        }
    }

    if !saw_record {
        return Err(LegacyStatsError::Empty);
    }
    if !stats.current_room.is_empty() {
        let name = stats.current_room.clone();
        stats.room_mut(&name);
    }
    Ok(stats)
}
