use thiserror::Error;

/// Why a connection was refused. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Source and target are the same node.
    #[error("Cannot connect a node to itself.")]
    SelfLoop,
    /// A node or port name is unknown.
    #[error("One of the ports does not exist.")]
    MissingPort,
    /// The source port is an input.
    #[error("Source port must be an output.")]
    SourceNotOutput,
    /// The target port is an output.
    #[error("Target port must be an input.")]
    TargetNotInput,
    /// Data types differ and neither is `any`.
    #[error("Incompatible port data types.")]
    IncompatibleTypes,
    /// The exact edge is already present.
    #[error("Connection already exists.")]
    Duplicate,
    /// The target port already has its one incoming edge.
    #[error("Target port already has an incoming connection.")]
    TargetOccupied,
}
