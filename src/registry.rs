use crate::boxes::{BoxKey, FourCC};
use crate::error::SchemaError;
use crate::known_boxes::SCHEMAS;
use crate::schema::{Count, Element, FieldDescriptor, FieldKind, IntType, ListBound, Presence, SchemaEntry};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Schema table keyed by `BoxKey` (4CC or UUID).
///
/// The registry is immutable once constructed; use [`Registry::with_schema`]
/// to build it fluently. Every entry is validated on insertion, so a registry
/// value always holds well-formed descriptor lists.
#[derive(Debug, Clone)]
pub struct Registry {
    map: HashMap<BoxKey, SchemaEntry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Build a registry from a static table, rejecting duplicate keys.
    pub fn from_entries(entries: &[SchemaEntry]) -> Result<Self, SchemaError> {
        entries
            .iter()
            .try_fold(Registry::new(), |reg, e| reg.with_schema(*e))
    }

    /// The built-in table as an owned registry, ready to be extended.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_entries(SCHEMAS)
    }

    /// Return a new registry with the given schema added.
    pub fn with_schema(mut self, entry: SchemaEntry) -> Result<Self, SchemaError> {
        if self.map.contains_key(&entry.key) {
            return Err(SchemaError::DuplicateKey { key: entry.key });
        }
        if let crate::schema::Layout::Fields(fields) = entry.layout {
            validate_fields(entry.key, fields)?;
        }
        tracing::trace!(key = %entry.key, name = entry.name, "schema registered");
        self.map.insert(entry.key, entry);
        Ok(self)
    }

    /// Schema for a box key; `None` means the box is decoded as opaque bytes.
    pub fn lookup(&self, key: &BoxKey) -> Option<&SchemaEntry> {
        self.map.get(key)
    }

    pub fn get(&self, typ: &[u8; 4]) -> Option<&SchemaEntry> {
        self.lookup(&BoxKey::FourCC(FourCC(*typ)))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.map.values()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Process-wide registry over the built-in schema table.
pub fn default_registry() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(|| {
        let reg = Registry::builtin().expect("built-in schema table must validate");
        tracing::debug!(entries = reg.len(), "default schema registry built");
        reg
    })
}

// ---------- Validation ----------

struct Seen {
    name: &'static str,
    integer: bool,
}

struct OpenGroup {
    host: IntType,
    next_offset: u32,
    presence: Presence,
}

fn validate_fields(key: BoxKey, fields: &'static [FieldDescriptor]) -> Result<(), SchemaError> {
    let mut seen: Vec<Seen> = Vec::with_capacity(fields.len());
    let mut group: Option<OpenGroup> = None;
    let mut to_end = false;

    for d in fields {
        if to_end {
            return Err(SchemaError::FieldAfterToEnd { key, field: d.name });
        }
        if seen.iter().any(|s| s.name == d.name) {
            return Err(SchemaError::DuplicateField { key, field: d.name });
        }

        let bit_error = SchemaError::BitGroup { key, field: d.name };
        match d.kind {
            FieldKind::Bits { host, offset, width } => {
                let (offset, width) = (offset as u32, width as u32);
                if host.signed || width == 0 || offset + width > host.bits() {
                    return Err(bit_error);
                }
                match &group {
                    None if offset != 0 => return Err(bit_error),
                    Some(g) if g.host != host || g.next_offset != offset || g.presence != d.presence => {
                        return Err(bit_error);
                    }
                    _ => {}
                }
                let next_offset = offset + width;
                group = (next_offset < host.bits()).then_some(OpenGroup {
                    host,
                    next_offset,
                    presence: d.presence,
                });
            }
            _ if group.is_some() => return Err(bit_error),
            _ => {}
        }

        for target in references(d) {
            if !seen.iter().any(|s| s.name == target && s.integer) {
                return Err(SchemaError::UnresolvedReference { key, field: d.name, target });
            }
        }

        if let FieldKind::Array { element: Element::Record(inner), .. } = d.kind {
            validate_fields(key, inner)?;
        }

        seen.push(Seen {
            name: d.name,
            integer: matches!(d.kind, FieldKind::Int(_) | FieldKind::Bits { .. }),
        });
        to_end = d.kind.is_to_end();
    }

    match (group, fields.last()) {
        (Some(_), Some(last)) => Err(SchemaError::BitGroup { key, field: last.name }),
        _ => Ok(()),
    }
}

fn references(d: &FieldDescriptor) -> impl Iterator<Item = &'static str> {
    let count = match d.kind {
        FieldKind::Bytes(Count::Field(t))
        | FieldKind::Array { count: Count::Field(t), .. }
        | FieldKind::Boxes(ListBound::Count(t)) => Some(t),
        _ => None,
    };
    let presence = match d.presence {
        Presence::FieldIs(t, _) => Some(t),
        _ => None,
    };
    count.into_iter().chain(presence)
}
