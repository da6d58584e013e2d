use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The pool's node selector matched no node.
    #[error("{pool}: 0 nodes probable targets")]
    EmptyTargetSet { pool: String },

    #[error("no target to assign floating ips to")]
    NoTargets,

    #[error("ip {0} does not match any floating ip resource")]
    UnresolvedIp(String),

    #[error("error parsing ip from spec: {0}")]
    InvalidIp(String),

    /// A planned destination node has no Hetzner server with the same name.
    #[error("node {0} has no matching hcloud server")]
    UnknownServer(String),

    #[error("hcloud api error: {0}")]
    Provider(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("{0} ip assigner is already running")]
    AlreadyRunning(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("resource watch failed: {0}")]
    Watch(String),
}
