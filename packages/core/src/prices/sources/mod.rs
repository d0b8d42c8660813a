mod defi_llama;

pub use defi_llama::DefiLlamaPriceSource;
