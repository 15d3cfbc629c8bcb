//! Parser for the oldest on-disk path format: one delimited line per
//! checkpoint, `Name;ABB;roomCount;room1,room2,...`. Migration is one-way;
//! files are rewritten in the current segmented JSON format after a
//! successful parse.

use thiserror::Error;

use super::{CheckpointInfo, PathInfo, RoomInfo};

#[derive(Debug, Error)]
pub enum LegacyPathError {
    #[error("empty path file")]
    Empty,
    #[error("malformed checkpoint line {line}: expected 'Name;ABB;count;rooms'")]
    MalformedLine { line: usize },
    #[error("checkpoint line {line} declares {declared} rooms but lists {actual}")]
    RoomCountMismatch {
        line: usize,
        declared: usize,
        actual: usize,
    },
}

pub fn parse(content: &str) -> Result<PathInfo, LegacyPathError> {
    let mut checkpoints = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split(';').collect();
        let [name, abbreviation, count, rooms] = parts[..] else {
            return Err(LegacyPathError::MalformedLine { line: idx + 1 });
        };
        let declared: usize = count
            .parse()
            .map_err(|_| LegacyPathError::MalformedLine { line: idx + 1 })?;

        let rooms: Vec<RoomInfo> = rooms
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(RoomInfo::new)
            .collect();

        if rooms.len() != declared {
            return Err(LegacyPathError::RoomCountMismatch {
                line: idx + 1,
                declared,
                actual: rooms.len(),
            });
        }

        checkpoints.push(CheckpointInfo {
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            rooms,
        });
    }

    if checkpoints.is_empty() {
        return Err(LegacyPathError::Empty);
    }

    Ok(PathInfo {
        checkpoints,
        ignored_rooms: Vec::new(),
        meta: None,
    })
}
