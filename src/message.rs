//! Base wire messages shared by every emulated service.

/// A single optional string, used for namespace answers.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringProto {
    #[prost(string, optional, tag = "1")]
    pub value: Option<String>,
}

impl StringProto {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

/// An empty message, for calls without a payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VoidProto {}
