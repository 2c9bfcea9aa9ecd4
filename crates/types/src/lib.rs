//! Core data model for the blockfetch service.
//!
//! This crate defines the types shared between the object-store client and
//! the fetch pipeline:
//!
//! - [`Oid`]: the fixed-width object identifier used by the content-addressed
//!   store
//! - [`Block`]: the binary block format and its stream decoder
//! - [`Wallet`] / [`Account`]: the credential model used to authenticate
//!   store requests

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod oid;
pub use oid::{Oid, OidError, OID_SIZE};

mod block;
pub use block::{Block, BlockDecodeError, BLOCK_VERSION};

mod wallet;
pub use wallet::{Account, EncryptedAccount, Wallet, WalletError};
