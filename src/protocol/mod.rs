//! Messages of the persistent worker protocol.
//!
//! The orchestrator writes [`WorkRequest`]s on our stdin and expects exactly one [`WorkResponse`]
//! per request on our stdout, in the same order. Every message is prefixed by its length, encoded
//! as a protocol buffer varint (see [`framing`]).

pub mod framing;

/// A file the orchestrator declares as relevant for a request, with the digest of its content.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Input {
    #[prost(string, tag = "1")]
    pub path: String,
    /// Opaque content identity.
    #[prost(bytes = "vec", tag = "2")]
    pub digest: Vec<u8>,
}

/// A single unit of work: the effective command line of one build.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkRequest {
    #[prost(string, repeated, tag = "1")]
    pub arguments: Vec<String>,
    #[prost(message, repeated, tag = "2")]
    pub inputs: Vec<Input>,
}

/// The answer to a [`WorkRequest`], carrying the diagnostics captured during that build only.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorkResponse {
    #[prost(int32, tag = "1")]
    pub exit_code: i32,
    #[prost(string, tag = "2")]
    pub output: String,
}

impl WorkResponse {
    pub fn new(exit_code: i32, output: String) -> Self {
        Self { exit_code, output }
    }
}
