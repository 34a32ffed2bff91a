//! Item stacks as stored in container inventories.

use std::fmt::{self, Display};

use cinder_utils::Identifier;
use simdnbt::owned::{NbtCompound, NbtTag};

/// The largest stack size any item may have.
pub const MAX_STACK_SIZE: i32 = 64;

/// A stack of items.
///
/// An empty stack is any stack with a count of zero or less.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    item: Identifier,
    count: i32,
    damage: i16,
}

impl ItemStack {
    /// Creates a stack of `count` items.
    #[must_use]
    pub fn new(item: Identifier, count: i32) -> Self {
        Self {
            item,
            count,
            damage: 0,
        }
    }

    /// Creates an empty stack.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Identifier::vanilla_static("air"), 0)
    }

    /// Returns a copy of this stack with the given damage value.
    #[must_use]
    pub fn with_damage(mut self, damage: i16) -> Self {
        self.damage = damage;
        self
    }

    /// The item identifier.
    #[must_use]
    pub fn item(&self) -> &Identifier {
        &self.item
    }

    /// The damage (or legacy variant) of the item.
    #[must_use]
    pub fn damage(&self) -> i16 {
        self.damage
    }

    /// Returns true if the stack holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count <= 0
    }

    /// Returns the number of items in the stack.
    #[must_use]
    pub fn count(&self) -> i32 {
        self.count
    }

    /// Sets the number of items in the stack.
    pub fn set_count(&mut self, count: i32) {
        self.count = count;
    }

    /// Increases the count.
    pub fn grow(&mut self, amount: i32) {
        self.count += amount;
    }

    /// Decreases the count.
    pub fn shrink(&mut self, amount: i32) {
        self.count -= amount;
    }

    /// Returns the maximum size of a stack of this item.
    #[must_use]
    pub fn max_stack_size(&self) -> i32 {
        MAX_STACK_SIZE
    }

    /// Returns true if both stacks hold the same item and could be merged.
    #[must_use]
    pub fn is_same_item(&self, other: &ItemStack) -> bool {
        self.item == other.item && self.damage == other.damage
    }

    /// Splits off up to `amount` items into a new stack.
    pub fn split(&mut self, amount: i32) -> ItemStack {
        let taken = amount.min(self.count).max(0);
        let mut result = self.clone();
        result.count = taken;
        self.count -= taken;
        result
    }

    /// Returns this stack and leaves an empty stack in its place.
    pub fn copy_and_clear(&mut self) -> ItemStack {
        std::mem::replace(self, ItemStack::empty())
    }

    /// Writes the stack as an item record (`Name`, `Count`, `Damage`).
    #[must_use]
    pub fn to_nbt(&self) -> NbtCompound {
        let mut nbt = NbtCompound::new();
        nbt.insert("Name", NbtTag::String(self.item.to_string().into()));
        nbt.insert(
            "Count",
            NbtTag::Byte(i8::try_from(self.count).unwrap_or(i8::MAX)),
        );
        nbt.insert("Damage", NbtTag::Short(self.damage));
        nbt
    }

    /// Reads an item record.
    ///
    /// A missing `Count` means one item. Returns `None` when the name is missing or invalid
    /// or the record describes an empty stack.
    #[must_use]
    pub fn from_nbt(nbt: &NbtCompound) -> Option<Self> {
        let item = match nbt.get("Name")? {
            NbtTag::String(name) => name.to_str().parse::<Identifier>().ok()?,
            _ => return None,
        };
        let count = match nbt.get("Count") {
            Some(NbtTag::Byte(count)) => i32::from(*count),
            Some(NbtTag::Short(count)) => i32::from(*count),
            Some(NbtTag::Int(count)) => *count,
            _ => 1,
        };
        let damage = match nbt.get("Damage") {
            Some(NbtTag::Short(damage)) => *damage,
            Some(NbtTag::Byte(damage)) => i16::from(*damage),
            Some(NbtTag::Int(damage)) => i16::try_from(*damage).unwrap_or(0),
            _ => 0,
        };

        let stack = Self::new(item, count.min(MAX_STACK_SIZE)).with_damage(damage);
        (!stack.is_empty()).then_some(stack)
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self::empty()
    }
}

impl Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x {}", self.count, self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_takes_at_most_count() {
        let mut stack = ItemStack::new(Identifier::vanilla_static("stick"), 5);
        let taken = stack.split(8);
        assert_eq!(taken.count(), 5);
        assert!(stack.is_empty());
    }

    #[test]
    fn missing_count_defaults_to_one() {
        let mut nbt = NbtCompound::new();
        nbt.insert("Name", NbtTag::String("minecraft:apple".to_string().into()));
        let stack = ItemStack::from_nbt(&nbt).expect("record has a name");
        assert_eq!(stack.count(), 1);
        assert_eq!(stack.damage(), 0);
    }

    #[test]
    fn zero_count_record_is_empty() {
        let stack = ItemStack::new(Identifier::vanilla_static("apple"), 0);
        assert!(ItemStack::from_nbt(&stack.to_nbt()).is_none());
    }
}
