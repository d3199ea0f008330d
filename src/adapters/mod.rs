// Adapters layer: concrete implementations of the domain ports for external
// systems (news APIs, Dune, the LLM endpoint).

pub mod coindesk;
pub mod deepseek;
pub mod dune;

pub use coindesk::CoinDeskSource;
pub use deepseek::DeepSeekClient;
pub use dune::DuneSocialSource;
