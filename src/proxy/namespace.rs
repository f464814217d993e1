//! Per-service hooks that stamp the current namespace onto a request.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Rewrites a request in place so it targets `namespace`.
pub trait NamespaceMod: Send + Sync {
    /// Returns whether the request was rewritten.
    fn mutate(&self, request: &mut dyn Any, namespace: &str) -> bool;
}

/// Hook registry keyed by service name. One per context.
#[derive(Default)]
pub struct NamespaceMods {
    mods: HashMap<String, Box<dyn NamespaceMod>>,
}

impl NamespaceMods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for every request sent to `service`.
    pub fn register(&mut self, service: impl Into<String>, hook: impl NamespaceMod + 'static) {
        self.mods.insert(service.into(), Box::new(hook));
    }

    /// Register a hook for requests of type `M` sent to `service`.
    ///
    /// Requests of any other type pass through untouched.
    pub fn register_typed<M, F>(&mut self, service: impl Into<String>, hook: F)
    where
        M: 'static,
        F: Fn(&mut M, &str) + Send + Sync + 'static,
    {
        self.register(
            service,
            TypedMod {
                hook,
                _request: PhantomData,
            },
        );
    }

    pub fn contains(&self, service: &str) -> bool {
        self.mods.contains_key(service)
    }

    /// Run the hook for `service`, if any. Returns whether it rewrote the
    /// request.
    pub fn apply(&self, service: &str, request: &mut dyn Any, namespace: &str) -> bool {
        self.mods
            .get(service)
            .is_some_and(|hook| hook.mutate(request, namespace))
    }
}

struct TypedMod<M, F> {
    hook: F,
    _request: PhantomData<fn(&mut M)>,
}

impl<M, F> NamespaceMod for TypedMod<M, F>
where
    M: 'static,
    F: Fn(&mut M, &str) + Send + Sync,
{
    fn mutate(&self, request: &mut dyn Any, namespace: &str) -> bool {
        match request.downcast_mut::<M>() {
            Some(request) => {
                (self.hook)(request, namespace);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for NamespaceMods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.mods.keys()).finish()
    }
}
