use std::collections::BTreeMap;

use crate::types::{Dict, Instance, Payload, TypeObject};

/// Unique identifier for values stored inside the heap arena.
///
/// Ids are never reused: the arena only grows, so an id held by a suspended
/// computation stays valid for the lifetime of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Everything that can live in the heap.
#[derive(Debug)]
pub(crate) enum HeapData {
    Type(Box<TypeObject>),
    Instance(Instance),
}

impl HeapData {
    fn variant_name(&self) -> &'static str {
        match self {
            Self::Type(_) => "Type",
            Self::Instance(inst) => inst.payload.variant_name(),
        }
    }
}

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_kind` map uses `BTreeMap` for deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of objects on the heap.
    pub live_objects: usize,
    /// Number of type objects, native and dynamically declared.
    pub types: usize,
    /// Breakdown of objects by payload kind (e.g., "Type", "Dict", "Function").
    pub objects_by_kind: BTreeMap<&'static str, usize>,
}

/// Append-only arena of runtime objects.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    entries: Vec<HeapData>,
}

impl Heap {
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(self.entries.len());
        self.entries.push(data);
        id
    }

    /// Id the next allocation will receive.
    pub fn next_id(&self) -> HeapId {
        HeapId(self.entries.len())
    }

    #[inline]
    pub fn get(&self, id: HeapId) -> Option<&HeapData> {
        self.entries.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: HeapId) -> Option<&mut HeapData> {
        self.entries.get_mut(id.index())
    }

    #[inline]
    pub fn type_obj(&self, id: HeapId) -> Option<&TypeObject> {
        match self.get(id)? {
            HeapData::Type(t) => Some(t),
            HeapData::Instance(_) => None,
        }
    }

    #[inline]
    pub fn type_obj_mut(&mut self, id: HeapId) -> Option<&mut TypeObject> {
        match self.get_mut(id)? {
            HeapData::Type(t) => Some(t),
            HeapData::Instance(_) => None,
        }
    }

    #[inline]
    pub fn instance(&self, id: HeapId) -> Option<&Instance> {
        match self.get(id)? {
            HeapData::Instance(inst) => Some(inst),
            HeapData::Type(_) => None,
        }
    }

    #[inline]
    pub fn instance_mut(&mut self, id: HeapId) -> Option<&mut Instance> {
        match self.get_mut(id)? {
            HeapData::Instance(inst) => Some(inst),
            HeapData::Type(_) => None,
        }
    }

    #[inline]
    pub fn payload(&self, id: HeapId) -> Option<&Payload> {
        self.instance(id).map(|inst| &inst.payload)
    }

    #[inline]
    pub fn payload_mut(&mut self, id: HeapId) -> Option<&mut Payload> {
        self.instance_mut(id).map(|inst| &mut inst.payload)
    }

    pub fn dict(&self, id: HeapId) -> Option<&Dict> {
        match self.payload(id)? {
            Payload::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn dict_mut(&mut self, id: HeapId) -> Option<&mut Dict> {
        match self.payload_mut(id)? {
            Payload::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn stats(&self) -> HeapStats {
        let mut objects_by_kind = BTreeMap::new();
        let mut types = 0;
        for entry in &self.entries {
            if matches!(entry, HeapData::Type(_)) {
                types += 1;
            }
            *objects_by_kind.entry(entry.variant_name()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.entries.len(),
            types,
            objects_by_kind,
        }
    }
}
