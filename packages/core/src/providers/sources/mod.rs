mod alchemy;
mod http;
mod web_socket;

pub use alchemy::{alchemy_supported_chains, build_alchemy_url, AlchemyProviderSource};
pub use http::HttpProviderSource;
pub use web_socket::WebSocketProviderSource;
