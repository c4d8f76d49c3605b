/// Offline backend that echoes a user-supplied response
pub mod debugging;

/// OpenAI chat completions client
pub mod openai;
