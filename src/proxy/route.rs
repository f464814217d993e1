//! Calls answered in-process instead of by the sidecar.

use crate::message::StringProto;
use crate::session::SessionState;

/// Pseudo-service for runtime meta-queries.
pub const META_SERVICE: &str = "__go__";

/// A (service, method) pair the proxy answers from session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCall {
    GetNamespace,
    GetDefaultNamespace,
}

const LOCAL_CALLS: &[(&str, &str, LocalCall)] = &[
    (META_SERVICE, "GetNamespace", LocalCall::GetNamespace),
    (
        META_SERVICE,
        "GetDefaultNamespace",
        LocalCall::GetDefaultNamespace,
    ),
];

impl LocalCall {
    /// Look up an interceptable pair.
    pub fn lookup(service: &str, method: &str) -> Option<Self> {
        LOCAL_CALLS
            .iter()
            .find(|(s, m, _)| *s == service && *m == method)
            .map(|(_, _, call)| *call)
    }

    pub fn answer(&self, session: &SessionState) -> StringProto {
        match self {
            LocalCall::GetNamespace => StringProto::new(session.namespace()),
            LocalCall::GetDefaultNamespace => StringProto::new(session.default_namespace()),
        }
    }
}

/// How a call was (or will be) served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Answered in-process.
    Local(LocalCall),
    /// Sent to the sidecar.
    Remote,
}

impl Route {
    pub fn resolve(service: &str, method: &str) -> Self {
        match LocalCall::lookup(service, method) {
            Some(call) => Route::Local(call),
            None => Route::Remote,
        }
    }
}
