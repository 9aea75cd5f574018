pub mod schema;

pub use schema::{
    ApiKeys, CommandsConfig, Config, LlmConfig, MediaConfig, MemoryConfig, PromptConfig,
};
