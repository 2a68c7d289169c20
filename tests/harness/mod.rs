//! Integration Test Harness
//!
//! - `RelayTest` - Runs a real chatrelay server on a random port
//! - `Upstream` - Stub completion and image-inference APIs it talks to
//! - `RecordingUploader` - Captures uploaded images instead of using FTP
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::RelayTest;
//!
//! #[tokio::test]
//! async fn test_chat() {
//!     let relay = RelayTest::start().await.unwrap();
//!     let body = relay.chat("alice", "hello").await.unwrap();
//!     assert_eq!(body["botResponse"], "echo: hello");
//! }
//! ```

mod upstream;

pub use server::{RecordingUploader, RelayTest, PUBLIC_BASE_URL};
pub use upstream::{Upstream, IMAGE_API_KEY, PNG_BYTES};
