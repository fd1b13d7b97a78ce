use crate::mass_point::MassPoint;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Every fatal condition of a barycenter run. Malformed lines are only
/// errors when the loader runs with [`SkipPolicy::Strict`].
///
/// [`SkipPolicy::Strict`]: crate::config::SkipPolicy::Strict
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("couldn't open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("insufficient values: no valid points were loaded")]
    InsufficientData,

    #[error("degenerate mass: combining {a} and {b} gives a zero or non-finite total mass")]
    DegenerateMass { a: MassPoint, b: MassPoint },

    #[error("overflow: combining {a} and {b} gives a non-finite position")]
    NonFinitePosition { a: MassPoint, b: MassPoint },

    #[error("worker failure: {0}")]
    Runtime(String),
}
