//! Owned engine handles.
//!
//! An [`EngineHandle`] releases its engine object when dropped, but only
//! while the engine is still initialized. Handles are shared through `Arc`
//! so one encoder can back both streaming and recording; the engine object
//! is released when the last holder goes away.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::MediaEngine;
use crate::types::{EncoderId, OutputId, ServiceId};

/// Kind of engine object a handle owns.
pub trait HandleKind {
    type Id: Copy + fmt::Debug + PartialEq;

    /// Human-readable kind, for logs.
    const LABEL: &'static str;

    fn release(engine: &dyn MediaEngine, id: Self::Id);
}

#[derive(Debug)]
pub struct EncoderKind;

impl HandleKind for EncoderKind {
    type Id = EncoderId;
    const LABEL: &'static str = "encoder";

    fn release(engine: &dyn MediaEngine, id: EncoderId) {
        engine.release_encoder(id);
    }
}

#[derive(Debug)]
pub struct OutputKind;

impl HandleKind for OutputKind {
    type Id = OutputId;
    const LABEL: &'static str = "output";

    fn release(engine: &dyn MediaEngine, id: OutputId) {
        engine.release_output(id);
    }
}

#[derive(Debug)]
pub struct ServiceKind;

impl HandleKind for ServiceKind {
    type Id = ServiceId;
    const LABEL: &'static str = "service";

    fn release(engine: &dyn MediaEngine, id: ServiceId) {
        engine.release_service(id);
    }
}

/// Owned engine object.
pub struct EngineHandle<K: HandleKind> {
    id: K::Id,
    type_id: String,
    name: String,
    engine: Option<Arc<dyn MediaEngine>>,
    _kind: PhantomData<K>,
}

pub type EncoderHandle = EngineHandle<EncoderKind>;
pub type OutputHandle = EngineHandle<OutputKind>;
pub type ServiceHandle = EngineHandle<ServiceKind>;

impl<K: HandleKind> EngineHandle<K> {
    /// Take ownership of an object the engine just created.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        id: K::Id,
        type_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            type_id: type_id.into(),
            name: name.into(),
            engine: Some(engine),
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> K::Id {
        self.id
    }

    /// Engine type identifier the object was created from (e.g. `obs_x264`).
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Give up ownership without releasing the engine object.
    pub fn detach(mut self) -> K::Id {
        self.engine = None;
        self.id
    }
}

impl<K: HandleKind> fmt::Debug for EngineHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::LABEL)
            .field("id", &self.id)
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .finish()
    }
}

impl<K: HandleKind> Drop for EngineHandle<K> {
    fn drop(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };

        if engine.is_initialized() {
            debug!(kind = K::LABEL, id = ?self.id, name = %self.name, "Releasing engine object");
            K::release(engine.as_ref(), self.id);
        } else {
            warn!(
                kind = K::LABEL,
                id = ?self.id,
                "Engine is not active, skipping release"
            );
        }
    }
}

/// A replaceable slot holding at most one shared handle.
#[derive(Debug)]
pub struct HandleSlot<T> {
    inner: Option<Arc<T>>,
}

impl<T> Default for HandleSlot<T> {
    fn default() -> Self {
        Self { inner: None }
    }
}

impl<T> HandleSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        self.inner.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_some()
    }

    /// Store `value`, returning the previous occupant. Dropping the returned
    /// handle releases it unless it is shared elsewhere.
    pub fn replace(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        self.inner.replace(value)
    }

    /// Store `value` or empty the slot.
    pub fn set(&mut self, value: Option<Arc<T>>) -> Option<Arc<T>> {
        std::mem::replace(&mut self.inner, value)
    }

    /// Empty the slot and hand back its occupant.
    pub fn detach(&mut self) -> Option<Arc<T>> {
        self.inner.take()
    }

    /// Whether both slots hold the same handle.
    pub fn shares_with(&self, other: &HandleSlot<T>) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
