//! Device-facing protocol.
//!
//! Every authenticated device exchange goes through one check-in endpoint.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Check-in pipeline                       │
//! │                                                            │
//! │  ┌──────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │ Envelope │──▶│ Authenticator│──▶│  Engine            │  │
//! │  │ (decode) │   │ nonce + HMAC │   │  acks → queues →   │  │
//! │  └──────────┘   └──────────────┘   │  FOTA session      │  │
//! │                                    └─────────┬──────────┘  │
//! │                                              ▼             │
//! │                                    ┌────────────────────┐  │
//! │                                    │ Chunked (signed    │  │
//! │                                    │ firmware frames)   │  │
//! │                                    └────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod chunked;
pub mod engine;
pub mod envelope;
pub mod messages;
pub mod ota;
