pub mod client;
#[cfg(test)]
pub mod mock_client;
pub mod stream;

pub use client::ChatClient;
