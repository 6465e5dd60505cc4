pub mod config;
pub mod logging;
pub mod node;
pub mod round;
pub mod state;
pub mod transport;

pub use config::ArgusConfig;
pub use node::ArgusNode;
pub use round::{RoundEngine, RoundOutcome, RoundSummary};
pub use transport::{LogWeightSink, MinerInfo, MinerTransport, SimulatedTransport, WeightSink};
