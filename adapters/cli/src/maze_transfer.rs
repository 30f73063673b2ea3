use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use learninator_maze::{Maze, MazeConfig, MazeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "maze";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "maze:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Carved passages of a rectangular maze plus the options it was built with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct MazeSnapshot {
    /// Number of cell columns.
    pub(crate) columns: u32,
    /// Number of cell rows.
    pub(crate) rows: u32,
    /// Width of the maze in world units.
    pub(crate) width: f32,
    /// Height of the maze in world units.
    pub(crate) height: f32,
    /// Whether the outer boundary is sealed.
    pub(crate) closed: bool,
    /// Whether the solver path is kept for display.
    pub(crate) cheats: bool,
    /// Carved passages as cell index pairs.
    pub(crate) passages: Vec<(usize, usize)>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Payload {
    width: f32,
    height: f32,
    closed: bool,
    cheats: bool,
    passages: Vec<(usize, usize)>,
}

impl MazeSnapshot {
    /// Records the passages of `maze`, which was generated from `config`.
    #[must_use]
    pub(crate) fn capture(config: &MazeConfig, maze: &Maze) -> Self {
        Self {
            columns: config.x_count,
            rows: config.y_count,
            width: config.width,
            height: config.height,
            closed: maze.closed(),
            cheats: maze.grid().cheats(),
            passages: maze.passages(),
        }
    }

    /// Options that rebuild the same grid.
    #[must_use]
    pub(crate) fn config(&self) -> MazeConfig {
        MazeConfig {
            x_count: self.columns,
            y_count: self.rows,
            width: self.width,
            height: self.height,
            closed: self.closed,
            cheats: self.cheats,
        }
    }

    /// Rebuilds the recorded maze.
    pub(crate) fn restore(&self) -> Result<Maze, MazeTransferError> {
        Maze::from_passages(&self.config(), &self.passages).map_err(MazeTransferError::InvalidMaze)
    }

    /// Encodes the snapshot into a single-line string suitable for clipboard transfer.
    pub(crate) fn encode(&self) -> Result<String, MazeTransferError> {
        let payload = Payload {
            width: self.width,
            height: self.height,
            closed: self.closed,
            cheats: self.cheats,
            passages: self.passages.clone(),
        };
        let json = serde_json::to_vec(&payload).map_err(MazeTransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}:{}x{}:{encoded}",
            self.columns, self.rows
        ))
    }

    /// Decodes a snapshot from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, MazeTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MazeTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(MazeTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(MazeTransferError::MissingVersion)?;
        let dimensions = parts.next().ok_or(MazeTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(MazeTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(MazeTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(MazeTransferError::UnsupportedVersion(version.to_owned()));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(MazeTransferError::InvalidEncoding)?;
        let decoded: Payload =
            serde_json::from_slice(&bytes).map_err(MazeTransferError::InvalidPayload)?;

        Ok(Self {
            columns,
            rows,
            width: decoded.width,
            height: decoded.height,
            closed: decoded.closed,
            cheats: decoded.cheats,
            passages: decoded.passages,
        })
    }
}

/// Errors that can occur while transferring maze snapshots.
#[derive(Debug, Error)]
pub(crate) enum MazeTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("maze payload was empty")]
    EmptyPayload,
    /// The prefix segment was missing from the encoded snapshot.
    #[error("maze string is missing the prefix")]
    MissingPrefix,
    /// The encoded snapshot did not contain a version segment.
    #[error("maze string is missing the version")]
    MissingVersion,
    /// The encoded snapshot did not include grid dimensions.
    #[error("maze string is missing the grid dimensions")]
    MissingDimensions,
    /// The encoded snapshot did not include the payload segment.
    #[error("maze string is missing the payload")]
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    #[error("maze prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    #[error("maze version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed from the encoded snapshot.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode maze payload")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    #[error("could not process maze payload")]
    InvalidPayload(#[source] serde_json::Error),
    /// The recorded passages do not fit the recorded grid.
    #[error("recorded passages do not describe a maze")]
    InvalidMaze(#[source] MazeError),
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), MazeTransferError> {
    let invalid = || MazeTransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;
    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;
    if columns == 0 || rows == 0 {
        return Err(invalid());
    }
    Ok((columns, rows))
}
