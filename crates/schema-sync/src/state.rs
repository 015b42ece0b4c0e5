//! Root facade: one decoded state graph and its ingress operations.

use std::sync::Arc;

use schema_sync_buffers::Reader;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::callbacks::{ChangeListener, Listeners};
use crate::change::DataChange;
use crate::collections::Key;
use crate::config::DecoderConfig;
use crate::decoder::decode_patch;
use crate::error::DecodeError;
use crate::reflection::decode_handshake;
use crate::refs::{Refs, Tracked};
use crate::schema::SchemaInstance;
use crate::types::TypeRegistry;
use crate::value::{RefId, Value, ROOT_REF_ID};
use crate::view;

/// Mirror of one server-authoritative state graph.
///
/// Patches must be applied one at a time; the registry is shared and may be
/// handed to other decoders through [`StateDecoder::registry`].
#[derive(Debug)]
pub struct StateDecoder {
    registry: Option<Arc<TypeRegistry>>,
    refs: Refs,
    listeners: Listeners,
    config: DecoderConfig,
}

impl StateDecoder {
    /// A decoder over a statically declared registry, with a fresh root.
    pub fn new(registry: impl Into<Arc<TypeRegistry>>, config: DecoderConfig) -> Self {
        let registry = registry.into();
        let refs = Refs::with_root(SchemaInstance::new(registry.root_type()));
        Self {
            registry: Some(registry),
            refs,
            listeners: Listeners::new(),
            config,
        }
    }

    /// A decoder that learns its registry from the first handshake.
    pub fn awaiting_handshake(config: DecoderConfig) -> Self {
        Self {
            registry: None,
            refs: Refs::new(),
            listeners: Listeners::new(),
            config,
        }
    }

    pub fn from_handshake(bytes: &[u8], offset: usize, config: DecoderConfig) -> Result<Self, DecodeError> {
        let registry = decode_handshake(bytes, offset, &config)?;
        Ok(Self::new(registry, config))
    }

    /// Replaces the registry and resets the graph to a fresh root.
    ///
    /// A failed handshake leaves the decoder untouched.
    pub fn apply_handshake(&mut self, bytes: &[u8], offset: usize) -> Result<(), DecodeError> {
        let registry = decode_handshake(bytes, offset, &self.config)?;
        self.teardown();
        self.refs = Refs::with_root(SchemaInstance::new(registry.root_type()));
        self.registry = Some(Arc::new(registry));
        Ok(())
    }

    /// Applies one patch and notifies the registered listeners.
    ///
    /// Either the whole patch applies, garbage collection included, or the
    /// graph is left exactly as it was and no listener fires.
    pub fn apply_patch(&mut self, bytes: &[u8], offset: usize) -> Result<Vec<DataChange>, DecodeError> {
        let (changes, collected) = self.decode(bytes, offset)?;
        self.listeners.on_changes(&changes);
        self.listeners.on_collected(&collected);
        Ok(changes)
    }

    /// Like [`StateDecoder::apply_patch`], delivering to `listener` instead of
    /// the registered listeners.
    pub fn apply_patch_with(
        &mut self,
        bytes: &[u8],
        offset: usize,
        listener: &mut dyn ChangeListener,
    ) -> Result<Vec<DataChange>, DecodeError> {
        let (changes, collected) = self.decode(bytes, offset)?;
        listener.on_changes(&changes);
        listener.on_collected(&collected);
        self.listeners.release(&collected);
        Ok(changes)
    }

    fn decode(&mut self, bytes: &[u8], offset: usize) -> Result<(Vec<DataChange>, Vec<RefId>), DecodeError> {
        let registry = self.registry.as_ref().ok_or(DecodeError::MissingSchema)?;
        if !self.refs.contains(ROOT_REF_ID) {
            return Err(DecodeError::MissingSchema);
        }
        let mut reader = Reader::at(bytes, offset);
        self.refs.begin();
        match decode_patch(&mut reader, registry, &mut self.refs, &self.config) {
            Ok(changes) => {
                self.refs.commit();
                let collected = self.refs.garbage_collect();
                debug!(
                    changes = changes.len(),
                    collected = collected.len(),
                    bytes = reader.position() - offset,
                    "patch applied"
                );
                Ok((changes, collected))
            }
            Err(err) => {
                self.refs.rollback();
                warn!(error = %err, offset = reader.position(), "patch aborted");
                Err(err)
            }
        }
    }

    // ── Views ─────────────────────────────────────────────────────────────

    pub fn registry(&self) -> Option<&Arc<TypeRegistry>> {
        self.registry.as_ref()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The root schema instance.
    pub fn state(&self) -> Option<&SchemaInstance> {
        self.refs.schema(ROOT_REF_ID)
    }

    pub fn get(&self, ref_id: RefId) -> Option<&Tracked> {
        self.refs.get(ref_id)
    }

    /// A schema field by name, or a map entry by key.
    pub fn field(&self, ref_id: RefId, name: &str) -> Option<&Value> {
        match self.refs.get(ref_id)? {
            Tracked::Schema(instance) => {
                let ty = self.registry.as_ref()?.describe(instance.type_id())?;
                instance.get_by_name(ty, name)
            }
            Tracked::Collection(collection) => collection
                .get(&Key::Name(name.to_owned()))
                .or_else(|| collection.get(&Key::Index(name.parse().ok()?))),
        }
    }

    pub fn ref_count(&self, ref_id: RefId) -> u32 {
        self.refs.ref_count(ref_id)
    }

    /// Live tracked objects, root included.
    pub fn tracked_len(&self) -> usize {
        self.refs.len()
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    /// JSON rendering of the whole graph; `null` before the first handshake.
    pub fn to_json(&self) -> Json {
        match &self.registry {
            Some(registry) => view::to_json(&self.refs, registry, ROOT_REF_ID),
            None => Json::Null,
        }
    }

    /// Releases every tracked object and listener.
    pub fn teardown(&mut self) {
        debug!(tracked = self.refs.len(), "teardown");
        self.refs.clear();
        self.listeners = Listeners::new();
    }
}
