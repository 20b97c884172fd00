//! Declarative cache bindings.
//!
//! A [`CacheBinding`] wraps an async operation with cache behavior the way
//! an interceptor would: an optional read-through [`Cacheable`] rule plus
//! any number of [`Invalidate`] rules, with keys resolved from the call's
//! arguments through positional `{N}` templates. The wrapped operation
//! stays oblivious to caching.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::KvBackend;
use crate::cache::{CacheLevel, CacheOptions, TieredCache};


static TEMPLATE_RE: LazyLock<Regex> =
    // Only digits inside the braces, so `{name}` passes through untouched.
    LazyLock::new(|| Regex::new(r"\{(\d+)\}").expect("template placeholder regex is valid"));

/// A call argument usable inside a key template.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyArg {
    Str(String),
    Int(i64),
    /// An entity argument contributes its id.
    Entity { id: String },
    Null,
}

impl KeyArg {
    fn render(&self) -> String {
        match self {
            KeyArg::Str(s) => s.clone(),
            KeyArg::Int(i) => i.to_string(),
            KeyArg::Entity { id } => id.clone(),
            KeyArg::Null => "null".to_string(),
        }
    }
}

impl From<&str> for KeyArg {
    fn from(s: &str) -> Self {
        KeyArg::Str(s.to_string())
    }
}

impl From<String> for KeyArg {
    fn from(s: String) -> Self {
        KeyArg::Str(s)
    }
}

impl From<i64> for KeyArg {
    fn from(i: i64) -> Self {
        KeyArg::Int(i)
    }
}

impl From<u32> for KeyArg {
    fn from(i: u32) -> Self {
        KeyArg::Int(i64::from(i))
    }
}

/// Substitutes `{N}` placeholders with the `N`th argument's rendering.
/// Out-of-range placeholders render as `null`.
pub fn resolve_template(template: &str, args: &[KeyArg]) -> String {
    TEMPLATE_RE
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .map_or_else(|| "null".to_string(), KeyArg::render)
        })
        .into_owned()
}

/// Read-through rule: serve from cache under the resolved key, or run the
/// operation and store its result.
pub struct Cacheable<T> {
    key_template: String,
    ttl: Option<Duration>,
    level: CacheLevel,
    condition: Option<Box<dyn Fn(&T) -> bool + Send + Sync>>,
}

impl<T> std::fmt::Debug for Cacheable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cacheable")
            .field("key_template", &self.key_template)
            .field("ttl", &self.ttl)
            .field("level", &self.level)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

impl<T> Cacheable<T> {
    pub fn new(key_template: impl Into<String>) -> Self {
        Self {
            key_template: key_template.into(),
            ttl: None,
            level: CacheLevel::default(),
            condition: None,
        }
    }

    /// TTL for stored results (the cache default applies when unset).
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Tier selection for both the probe and the store.
    pub fn level(mut self, level: CacheLevel) -> Self {
        self.level = level;
        self
    }

    /// Only results the predicate accepts are stored; rejected results are
    /// still returned to the caller.
    pub fn condition(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Box::new(predicate));
        self
    }

    fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.ttl,
            level: self.level,
            prefix: None,
        }
    }

    fn should_store(&self, value: &T) -> bool {
        self.condition.as_ref().is_none_or(|cond| cond(value))
    }
}

/// Invalidation rule: delete the resolved keys around the operation.
///
/// Keys containing `*` are pattern deletes. After-invocation rules (the
/// default) run only when the operation actually executed and succeeded;
/// before-invocation rules always run first.
#[derive(Debug, Clone)]
pub struct Invalidate {
    key_templates: Vec<String>,
    before_invocation: bool,
}

impl Invalidate {
    pub fn new(key_templates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            key_templates: key_templates.into_iter().map(Into::into).collect(),
            before_invocation: false,
        }
    }

    /// Run this invalidation before the operation instead of after.
    pub fn before_invocation(mut self) -> Self {
        self.before_invocation = true;
        self
    }
}

/// Composition of cache rules around one operation.
///
/// With no rules attached, [`CacheBinding::call`] is a transparent
/// pass-through that never touches the cache.
pub struct CacheBinding<T> {
    cacheable: Option<Cacheable<T>>,
    invalidates: Vec<Invalidate>,
}

impl<T> std::fmt::Debug for CacheBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBinding")
            .field("cacheable", &self.cacheable)
            .field("invalidates", &self.invalidates)
            .finish()
    }
}

impl<T> Default for CacheBinding<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheBinding<T> {
    pub fn new() -> Self {
        Self {
            cacheable: None,
            invalidates: Vec::new(),
        }
    }

    /// Attaches the read-through rule.
    pub fn cache(mut self, cacheable: Cacheable<T>) -> Self {
        self.cacheable = Some(cacheable);
        self
    }

    /// Attaches an invalidation rule (may be called repeatedly).
    pub fn invalidate(mut self, invalidate: Invalidate) -> Self {
        self.invalidates.push(invalidate);
        self
    }
}

impl<T: Serialize + DeserializeOwned> CacheBinding<T> {
    /// Runs `op` under this binding's rules.
    ///
    /// Order: before-invalidations, cache probe (a hit returns immediately
    /// and skips `op` and the after-invalidations), the operation itself,
    /// conditional store, then after-invalidations. Operation errors
    /// propagate unchanged and suppress the after-invalidations.
    pub async fn call<B, E, F, Fut>(
        &self,
        cache: &TieredCache<B>,
        args: &[KeyArg],
        op: F,
    ) -> Result<T, E>
    where
        B: KvBackend,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_invalidations(cache, args, true).await;

        let cacheable = self.cacheable.as_ref();
        let key = cacheable.map(|c| resolve_template(&c.key_template, args));

        if let (Some(cacheable), Some(key)) = (cacheable, key.as_deref()) {
            if let Some(value) = cache.get::<T>(key, &cacheable.options()).await {
                debug!(key, "binding served from cache");
                return Ok(value);
            }
        }

        let value = op().await?;

        if let (Some(cacheable), Some(key)) = (cacheable, key.as_deref()) {
            if cacheable.should_store(&value) {
                // Store failures are logged inside the cache; the result
                // still belongs to the caller.
                let _ = cache.set(key, &value, &cacheable.options()).await;
            }
        }

        self.run_invalidations(cache, args, false).await;
        Ok(value)
    }

    async fn run_invalidations<B: KvBackend>(
        &self,
        cache: &TieredCache<B>,
        args: &[KeyArg],
        before: bool,
    ) {
        let options = CacheOptions::default();
        for rule in self.invalidates.iter().filter(|r| r.before_invocation == before) {
            for template in &rule.key_templates {
                let key = resolve_template(template, args);
                if key.contains('*') {
                    cache.delete_by_pattern(&key, &options).await;
                } else {
                    cache.delete(&key, &options).await;
                }
            }
        }
    }
}
