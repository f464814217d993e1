//! Call proxy: typed service calls in, emulator round trips out.
//!
//! ```text
//! call(service, method, req, resp)
//!        │
//!        ▼
//!   Route::resolve ──── Local ───▶ answer from SessionState ──▶ decode into resp
//!        │
//!      Remote
//!        ▼
//!   NamespaceMods (if a namespace is set)
//!        ▼
//!   prost encode ──▶ Transport::round_trip ──▶ prost decode into resp
//! ```

pub mod error;
pub mod namespace;
pub mod route;
pub mod transport;

use std::any::Any;
use std::sync::Arc;

use prost::Message;

pub use error::CallError;
pub use namespace::{NamespaceMod, NamespaceMods};
pub use route::{LocalCall, META_SERVICE, Route};
pub use transport::{HttpTransport, Transport};

use crate::session::SessionState;
use error::Result;

/// Routes calls for one context. Holds no per-call state.
pub struct CallProxy {
    transport: Arc<dyn Transport>,
    namespace_mods: NamespaceMods,
    trace_calls: bool,
}

impl CallProxy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            namespace_mods: NamespaceMods::new(),
            trace_calls: false,
        }
    }

    /// Log every request and response at debug level.
    pub fn with_trace_calls(mut self, enabled: bool) -> Self {
        self.trace_calls = enabled;
        self
    }

    pub fn namespace_mods_mut(&mut self) -> &mut NamespaceMods {
        &mut self.namespace_mods
    }

    /// Perform one call and report how it was served.
    ///
    /// On success `response` is replaced by the decoded answer.
    pub async fn call<Req, Resp>(
        &self,
        session: &SessionState,
        service: &str,
        method: &str,
        request: &mut Req,
        response: &mut Resp,
    ) -> Result<Route>
    where
        Req: Message + Any,
        Resp: Message + Default,
    {
        let route = Route::resolve(service, method);
        if let Route::Local(local) = route {
            let answer = local.answer(session).encode_to_vec();
            *response = decode(service, method, &answer)?;
            return Ok(route);
        }

        let namespace = session.namespace();
        if !namespace.is_empty()
            && self
                .namespace_mods
                .apply(service, &mut *request, namespace)
        {
            tracing::trace!("Applied namespace '{}' to {} request", namespace, service);
        }

        if self.trace_calls {
            tracing::debug!("{}.{} request: {:?}", service, method, request);
        }

        let mut body = Vec::with_capacity(request.encoded_len());
        request
            .encode(&mut body)
            .map_err(|source| CallError::Encode {
                service: service.to_string(),
                method: method.to_string(),
                source,
            })?;

        let reply = self
            .transport
            .round_trip(service, method, session.headers(), body)
            .await?;

        *response = decode(service, method, &reply)?;

        if self.trace_calls {
            tracing::debug!("{}.{} response: {:?}", service, method, response);
        }

        Ok(route)
    }
}

fn decode<M: Message + Default>(service: &str, method: &str, bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|source| CallError::Decode {
        service: service.to_string(),
        method: method.to_string(),
        source,
    })
}
