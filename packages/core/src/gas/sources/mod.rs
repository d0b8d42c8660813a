mod etherscan;
mod rpc;

pub use etherscan::{gwei_to_wei, EtherscanGasPriceSource};
pub use rpc::RpcGasPriceSource;
