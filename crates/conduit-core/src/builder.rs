//! Proxy creation: synthesize (or reuse) the proxy type for a contract, then
//! instantiate and wire it.

use crate::activation::{Activator, Injection};
use crate::cache::TypeCache;
use crate::config::ProxyConfig;
use crate::contract::{enumerate_operations, Contract};
use crate::error::{ActivationError, Result, SynthesisError};
use crate::forwarder::{emit_forwarder, StateFields};
use crate::observer::SharedObserver;
use crate::proxy::Proxy;
use crate::synth::{ProxyType, TypeBuilder};
use crate::wiring;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};

/// Creates proxies. Holds the configuration and the cache of synthesized types.
///
/// # Example
///
/// ```rust,ignore
/// use conduit_core::{ProxyBuilder, ProxyConfig, TracingObserver};
///
/// let builder = ProxyBuilder::with_config(ProxyConfig::from_env());
/// let calc = builder.create_proxy::<dyn Calculator>(
///     Box::new(RealCalculator),
///     Some(Arc::new(TracingObserver::default())),
/// )?;
/// ```
#[derive(Debug, Default)]
pub struct ProxyBuilder {
    config: ProxyConfig,
    cache: TypeCache,
}

impl ProxyBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with a custom configuration.
    pub fn with_config(config: ProxyConfig) -> Self {
        Self {
            config,
            cache: TypeCache::new(),
        }
    }

    /// Create a builder configured from environment variables.
    pub fn from_env() -> Self {
        Self::with_config(ProxyConfig::from_env())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Synthesize a fresh proxy type for `C`, bypassing the cache.
    pub fn synthesize<C: Contract + ?Sized>(
        &self,
        observed: bool,
    ) -> std::result::Result<ProxyType<C>, SynthesisError> {
        let operations = enumerate_operations::<C>();
        let name = self.config.type_name(&C::descriptor().name, observed);
        debug!(type_name = %name, operations = operations.len(), observed, "Synthesizing proxy type");

        let mut ty = TypeBuilder::<C>::new(name)
            .max_parameters(self.config.max_parameters)
            .verify(self.config.verify_routines);

        let state = StateFields {
            target: wiring::wire_target(&mut ty),
            observer: observed.then(|| wiring::wire_observer(&mut ty)),
        };
        for (op, sig) in &operations {
            emit_forwarder(&mut ty, *op, sig, state);
        }

        ty.materialize()
    }

    /// The proxy type for `C`, from the cache when enabled.
    pub fn proxy_type<C: Contract + ?Sized>(
        &self,
        observed: bool,
    ) -> std::result::Result<Arc<ProxyType<C>>, SynthesisError> {
        if self.config.cache_types {
            self.cache
                .get_or_try_insert_with(observed, || self.synthesize::<C>(observed))
        } else {
            self.synthesize::<C>(observed).map(Arc::new)
        }
    }

    /// Instantiate `ty` and wire the wrapped implementation and observer into it.
    pub fn activate<C: Contract + ?Sized>(
        &self,
        ty: &Arc<ProxyType<C>>,
        concrete: Box<C>,
        observer: Option<SharedObserver>,
    ) -> std::result::Result<Proxy<C>, ActivationError> {
        let proxy = Activator::instantiate(ty);
        Activator::invoke_named(&proxy, wiring::TARGET_SETTER, Injection::Target(concrete))?;
        if let Some(observer) = observer {
            Activator::invoke_named(&proxy, wiring::OBSERVER_SETTER, Injection::Observer(observer))?;
        }
        Activator::ensure_wired(&proxy)?;
        Ok(proxy)
    }

    /// Wrap `concrete` in a proxy satisfying `C`.
    ///
    /// With an observer every call is reported to it; without one the proxy
    /// only forwards.
    #[instrument(skip(self, concrete, observer), fields(observed = observer.is_some()))]
    pub fn create_proxy<C: Contract + ?Sized>(
        &self,
        concrete: Box<C>,
        observer: Option<SharedObserver>,
    ) -> Result<Proxy<C>> {
        let ty = self.proxy_type::<C>(observer.is_some())?;
        let proxy = self.activate(&ty, concrete, observer)?;
        info!(type_name = %ty.name(), contract = %ty.contract().name, "Proxy created");
        Ok(proxy)
    }
}

static DEFAULT_BUILDER: OnceLock<ProxyBuilder> = OnceLock::new();

/// Wrap `concrete` in a proxy satisfying `C`, using a process-wide builder
/// configured from the environment on first use.
///
/// ```rust,ignore
/// let calc = conduit_core::create_proxy::<dyn Calculator>(Box::new(RealCalculator), None)?;
/// assert_eq!(calc.add(2, 3), 5);
/// ```
pub fn create_proxy<C: Contract + ?Sized>(
    concrete: Box<C>,
    observer: Option<SharedObserver>,
) -> Result<Proxy<C>> {
    DEFAULT_BUILDER
        .get_or_init(ProxyBuilder::from_env)
        .create_proxy(concrete, observer)
}
