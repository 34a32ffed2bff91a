//! Tolerant readers for block entity records.
//!
//! Stored records may come from older versions or other tools, so numeric fields are
//! accepted in any integer width and a missing or mistyped field reads as `None`.

use cinder_registry::ItemStack;
use simdnbt::owned::{NbtCompound, NbtList, NbtTag};

/// Reads an integer field of any width.
#[must_use]
pub fn read_int(nbt: &NbtCompound, key: &str) -> Option<i64> {
    match nbt.get(key)? {
        NbtTag::Byte(value) => Some(i64::from(*value)),
        NbtTag::Short(value) => Some(i64::from(*value)),
        NbtTag::Int(value) => Some(i64::from(*value)),
        NbtTag::Long(value) => Some(*value),
        _ => None,
    }
}

/// Reads an integer field that must fit in an `i32`.
#[must_use]
pub fn read_i32(nbt: &NbtCompound, key: &str) -> Option<i32> {
    read_int(nbt, key).and_then(|value| i32::try_from(value).ok())
}

/// Reads an integer field that must fit in an `i16`.
#[must_use]
pub fn read_i16(nbt: &NbtCompound, key: &str) -> Option<i16> {
    read_int(nbt, key).and_then(|value| i16::try_from(value).ok())
}

/// Reads a string field.
#[must_use]
pub fn read_string(nbt: &NbtCompound, key: &str) -> Option<String> {
    match nbt.get(key)? {
        NbtTag::String(value) => Some(value.to_str().into_owned()),
        _ => None,
    }
}

/// Writes stacks as an `Items` list entry, skipping empty slots.
///
/// Slots are renumbered from zero in iteration order.
pub fn write_items<'a>(nbt: &mut NbtCompound, items: impl IntoIterator<Item = &'a ItemStack>) {
    let mut list = Vec::new();
    for (slot, stack) in items.into_iter().enumerate() {
        if stack.is_empty() {
            continue;
        }
        let mut item = stack.to_nbt();
        item.insert("Slot", NbtTag::Byte(slot as i8));
        list.push(item);
    }
    nbt.insert("Items", NbtTag::List(NbtList::Compound(list)));
}

/// Reads the `Items` list, returning `(slot, stack)` pairs.
///
/// Entries without a usable slot or item are skipped.
#[must_use]
pub fn read_items(nbt: &NbtCompound) -> Vec<(usize, ItemStack)> {
    let Some(NbtTag::List(NbtList::Compound(list))) = nbt.get("Items") else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|item| {
            let slot = read_int(item, "Slot")?;
            let slot = usize::try_from(slot & 0xFF).ok()?;
            Some((slot, ItemStack::from_nbt(item)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use cinder_utils::Identifier;

    use super::*;

    #[test]
    fn integers_are_read_in_any_width() {
        let mut nbt = NbtCompound::new();
        nbt.insert("a", NbtTag::Byte(3));
        nbt.insert("b", NbtTag::Int(70_000));
        nbt.insert("c", NbtTag::String("x".to_string().into()));
        assert_eq!(read_i16(&nbt, "a"), Some(3));
        assert_eq!(read_i16(&nbt, "b"), None);
        assert_eq!(read_i32(&nbt, "b"), Some(70_000));
        assert_eq!(read_i32(&nbt, "c"), None);
        assert_eq!(read_i32(&nbt, "missing"), None);
    }

    #[test]
    fn items_skip_empty_slots_and_bad_entries() {
        let stone = ItemStack::new(Identifier::vanilla_static("stone"), 4);
        let mut nbt = NbtCompound::new();
        write_items(&mut nbt, &[ItemStack::empty(), stone.clone()]);

        if let Some(NbtTag::List(NbtList::Compound(list))) = nbt.get("Items") {
            assert_eq!(list.len(), 1);
        } else {
            panic!("Items list missing");
        }

        assert_eq!(read_items(&nbt), vec![(1, stone)]);
        assert!(read_items(&NbtCompound::new()).is_empty());
    }
}
