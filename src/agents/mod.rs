pub mod news_agent;

pub use news_agent::NewsDataAgent;
