//! Block states: a block name plus an ordered set of properties.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use cinder_utils::{Facing, Identifier};
use simdnbt::owned::{NbtCompound, NbtTag};

/// Name of the property chests, furnaces and other horizontal blocks store their facing in.
pub const CARDINAL_DIRECTION: &str = "minecraft:cardinal_direction";

static AIR: LazyLock<BlockState> =
    LazyLock::new(|| BlockState::new(Identifier::vanilla_static("air")));
static UNKNOWN: LazyLock<BlockState> =
    LazyLock::new(|| BlockState::new(Identifier::vanilla_static("unknown")));

/// A single block state property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyValue {
    /// A boolean, persisted as a byte.
    Bool(bool),
    /// An integer.
    Int(i32),
    /// A string.
    String(String),
}

impl PropertyValue {
    fn to_nbt(&self) -> NbtTag {
        match self {
            PropertyValue::Bool(value) => NbtTag::Byte(i8::from(*value)),
            PropertyValue::Int(value) => NbtTag::Int(*value),
            PropertyValue::String(value) => NbtTag::String(value.clone().into()),
        }
    }

    fn from_nbt(tag: &NbtTag) -> Option<Self> {
        match tag {
            NbtTag::Byte(value) => Some(PropertyValue::Bool(*value != 0)),
            NbtTag::Short(value) => Some(PropertyValue::Int(i32::from(*value))),
            NbtTag::Int(value) => Some(PropertyValue::Int(*value)),
            NbtTag::String(value) => Some(PropertyValue::String(value.to_str().into_owned())),
            _ => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Int(value) => write!(f, "{value}"),
            PropertyValue::String(value) => f.write_str(value),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

#[derive(PartialEq, Eq, Hash)]
struct BlockStateData {
    name: Identifier,
    properties: BTreeMap<String, PropertyValue>,
}

/// An immutable block state.
///
/// Cloning is cheap; the name and properties are shared. Two states are equal when their
/// names and properties are equal, regardless of where they were created.
#[derive(Clone)]
pub struct BlockState(Arc<BlockStateData>);

impl BlockState {
    /// Creates a state without properties.
    #[must_use]
    pub fn new(name: Identifier) -> Self {
        Self::from_parts(name, BTreeMap::new())
    }

    /// Creates a state from a name and its properties.
    #[must_use]
    pub fn from_parts(name: Identifier, properties: BTreeMap<String, PropertyValue>) -> Self {
        Self(Arc::new(BlockStateData { name, properties }))
    }

    /// The air state.
    #[must_use]
    pub fn air() -> Self {
        AIR.clone()
    }

    /// The placeholder used for blocks that could not be resolved while loading.
    #[must_use]
    pub fn unknown() -> Self {
        UNKNOWN.clone()
    }

    /// Returns a copy of this state with one property replaced.
    #[must_use]
    pub fn with_property(&self, key: &str, value: impl Into<PropertyValue>) -> Self {
        let mut properties = self.0.properties.clone();
        properties.insert(key.to_string(), value.into());
        Self::from_parts(self.0.name.clone(), properties)
    }

    /// The block name.
    #[must_use]
    pub fn name(&self) -> &Identifier {
        &self.0.name
    }

    /// All properties, ordered by key.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.0.properties
    }

    /// Looks up a single property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.0.properties.get(key)
    }

    /// Looks up a string property.
    #[must_use]
    pub fn string_property(&self, key: &str) -> Option<&str> {
        match self.property(key)? {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Looks up an integer property.
    #[must_use]
    pub fn int_property(&self, key: &str) -> Option<i32> {
        match self.property(key)? {
            PropertyValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Reads the horizontal facing stored in [`CARDINAL_DIRECTION`].
    #[must_use]
    pub fn facing(&self) -> Option<Facing> {
        self.string_property(CARDINAL_DIRECTION)
            .and_then(Facing::from_name)
    }

    /// Returns true if the block names match, ignoring properties.
    #[must_use]
    pub fn is_same_block(&self, other: &BlockState) -> bool {
        self.0.name == other.0.name
    }

    /// Returns true for air.
    #[must_use]
    pub fn is_air(&self) -> bool {
        self.0.name == AIR.0.name
    }

    /// Returns true for the unresolved-block placeholder.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0.name == UNKNOWN.0.name
    }

    /// Writes the state as `{name, states}`.
    #[must_use]
    pub fn to_nbt(&self) -> NbtCompound {
        let mut states = NbtCompound::new();
        for (key, value) in &self.0.properties {
            states.insert(key.as_str(), value.to_nbt());
        }

        let mut nbt = NbtCompound::new();
        nbt.insert("name", NbtTag::String(self.0.name.to_string().into()));
        nbt.insert("states", NbtTag::Compound(states));
        nbt
    }

    /// Reads a state written by [`BlockState::to_nbt`].
    ///
    /// Returns `None` if the name is missing or not a valid identifier. Properties of an
    /// unsupported tag type are skipped.
    #[must_use]
    pub fn from_nbt(nbt: &NbtCompound) -> Option<Self> {
        let name = match nbt.get("name")? {
            NbtTag::String(name) => name.to_str().parse::<Identifier>().ok()?,
            _ => return None,
        };

        let mut properties = BTreeMap::new();
        if let Some(NbtTag::Compound(states)) = nbt.get("states") {
            for (key, tag) in states.iter() {
                if let Some(value) = PropertyValue::from_nbt(tag) {
                    properties.insert(key.to_str().into_owned(), value);
                }
            }
        }

        Some(Self::from_parts(name, properties))
    }
}

impl PartialEq for BlockState {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for BlockState {}

impl Hash for BlockState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

impl Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)?;
        if !self.0.properties.is_empty() {
            f.write_str("[")?;
            for (i, (key, value)) in self.0.properties.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl Debug for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockState({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chest(facing: &str) -> BlockState {
        BlockState::new(Identifier::vanilla_static("chest")).with_property(CARDINAL_DIRECTION, facing)
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(chest("north"), chest("north"));
        assert_ne!(chest("north"), chest("south"));
        assert!(chest("north").is_same_block(&chest("south")));
    }

    #[test]
    fn facing_is_read_from_cardinal_direction() {
        assert_eq!(chest("east").facing(), Some(Facing::East));
        assert_eq!(BlockState::air().facing(), None);
    }

    #[test]
    fn nbt_keeps_property_types() {
        let state = BlockState::new(Identifier::vanilla_static("hopper"))
            .with_property("facing_direction", 3)
            .with_property("toggle_bit", true);
        let read = BlockState::from_nbt(&state.to_nbt()).expect("state should decode");
        assert_eq!(read, state);
        assert_eq!(read.int_property("facing_direction"), Some(3));
    }

    #[test]
    fn nbt_without_name_is_rejected() {
        assert!(BlockState::from_nbt(&NbtCompound::new()).is_none());
    }
}
