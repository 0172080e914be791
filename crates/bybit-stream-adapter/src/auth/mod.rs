/*
[INPUT]:  API key pair and signing window
[OUTPUT]: HMAC signatures and websocket auth arguments
[POS]:    Auth layer - handles Bybit stream authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod signer;

pub use signer::{sign, AuthArgs, Credentials, StreamSigner, REALTIME_AUTH_PREFIX};
