#![warn(missing_docs)]
//! Solana balance origin for the coalesce gateway.
//!
//! [`SolanaRpcOrigin`] resolves an account address to its SOL balance with a
//! single `getBalance` JSON-RPC call at `finalized` commitment. Addresses
//! that do not decode to a 32-byte public key are rejected before any
//! request is made.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use coalesce_core::{OriginClient, Subject};
//! use coalesce_solana::SolanaRpcOrigin;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let origin = SolanaRpcOrigin::builder()
//!     .url("https://api.mainnet-beta.solana.com")
//!     .build()?;
//! let subject = Subject::new("Vote111111111111111111111111111111111111111");
//! let sol = origin.fetch(&subject, Duration::from_secs(10)).await?;
//! println!("{subject}: {sol} SOL");
//! # Ok(())
//! # }
//! ```

mod address;
mod origin;
mod rpc;

pub use address::{PUBKEY_LEN, is_valid_address};
pub use origin::{DEFAULT_RPC_URL, LAMPORTS_PER_SOL, SolanaRpcOrigin, SolanaRpcOriginBuilder};
pub use rpc::RpcError;
