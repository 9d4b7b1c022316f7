//! On-chain collaborators: the EVM [`EvmChainGateway`] and the Chainlink
//! [`ChainlinkOracle`], both behind one shared [`RateGate`].

pub mod abi;
pub mod gateway;
pub mod oracle;
pub mod rate_gate;
pub mod rpc;
pub mod tx;

pub use gateway::EvmChainGateway;
pub use oracle::ChainlinkOracle;
pub use rate_gate::RateGate;
pub use rpc::RpcClient;

use binopt_core::{AppConfig, ChainError};
use std::time::Duration;

/// Builds the gateway and oracle over a single rate budget.
///
/// # Errors
/// [`ChainError::Configuration`] for an unusable RPC endpoint, contract
/// address or signing key.
pub fn connect(config: &AppConfig) -> Result<(EvmChainGateway, ChainlinkOracle), ChainError> {
    let gate = RateGate::new(&config.rate_limit);
    let rpc = RpcClient::new(
        config.chain.rpc_url.clone(),
        Duration::from_secs(config.chain.request_timeout_secs),
        gate,
    )?;
    let gateway = EvmChainGateway::new(&config.chain, rpc.clone())?;
    let oracle = ChainlinkOracle::new(rpc, &config.oracle);
    Ok((gateway, oracle))
}
