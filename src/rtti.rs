//! A table-driven implementation of [`TypeInfo`].
//!
//! Real deployments get their type descriptors from the compiler that lowered the C++ program.
//! [`Hierarchy`] is a small stand-in that describes classes, their (possibly multiple) bases with
//! byte offsets, and pointer types, which is enough to drive catch matching for tooling and tests.

use super::{
    handle::{Handle, TypeTag},
    matching::TypeInfo,
};
use core::any::TypeId;
use std::collections::BTreeMap;

#[derive(Debug)]
enum Kind {
    Class { bases: Vec<(TypeTag, isize)> },
    Pointer { pointee: TypeTag },
}

#[derive(Debug)]
struct Entry {
    name: &'static str,
    kind: Kind,
}

/// A class hierarchy with pointer types.
#[derive(Debug, Default)]
pub struct Hierarchy {
    entries: Vec<Entry>,
    rust_types: BTreeMap<TypeId, TypeTag>,
}

impl Hierarchy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            rust_types: BTreeMap::new(),
        }
    }

    fn push(&mut self, name: &'static str, kind: Kind) -> TypeTag {
        self.entries.push(Entry { name, kind });
        match TypeTag::new(self.entries.len()) {
            Some(tag) => tag,
            None => unreachable!("entries is non-empty after push"),
        }
    }

    fn entry(&self, tag: TypeTag) -> Option<&Entry> {
        self.entries.get(tag.get().wrapping_sub(1))
    }

    /// Declare a class type without bases.
    pub fn declare(&mut self, name: &'static str) -> TypeTag {
        self.push(name, Kind::Class { bases: Vec::new() })
    }

    /// Declare the class type standing for the Rust type `T`, or return its existing tag.
    ///
    /// `T` need not be `'static`.
    pub fn declare_type<T: ?Sized>(&mut self) -> TypeTag {
        let id = typeid::of::<T>();
        if let Some(&tag) = self.rust_types.get(&id) {
            return tag;
        }
        let tag = self.declare(core::any::type_name::<T>());
        self.rust_types.insert(id, tag);
        tag
    }

    /// The tag previously declared for the Rust type `T`.
    #[must_use]
    pub fn tag_of<T: ?Sized>(&self) -> Option<TypeTag> {
        self.rust_types.get(&typeid::of::<T>()).copied()
    }

    /// Make `base` a base class of `derived`, with the base subobject located `offset` bytes into
    /// the derived object.
    ///
    /// Bases are searched in the order they were added.
    ///
    /// # Panics
    ///
    /// Panics if `derived` is not a class declared in this hierarchy, or if `derived` is already
    /// `base` or one of its bases, which would make the hierarchy cyclic.
    pub fn add_base(&mut self, derived: TypeTag, base: TypeTag, offset: isize) {
        assert!(
            self.upcast_offset(base, derived).is_none(),
            "{base:?} can't be a base of {derived:?}: it would derive from itself"
        );
        match self.entries.get_mut(derived.get().wrapping_sub(1)) {
            Some(Entry {
                kind: Kind::Class { bases },
                ..
            }) => bases.push((base, offset)),
            _ => panic!("{derived:?} is not a class of this hierarchy"),
        }
    }

    /// The pointer type to `pointee`, declaring it on first use.
    pub fn pointer_to(&mut self, pointee: TypeTag) -> TypeTag {
        let existing = self.entries.iter().position(
            |entry| matches!(entry.kind, Kind::Pointer { pointee: p } if p == pointee),
        );
        match existing.and_then(|index| TypeTag::new(index.wrapping_add(1))) {
            Some(tag) => tag,
            None => self.push("*", Kind::Pointer { pointee }),
        }
    }

    #[must_use]
    pub fn name(&self, tag: TypeTag) -> Option<&'static str> {
        self.entry(tag).map(|entry| entry.name)
    }

    /// Offset of the `target` subobject within an object of type `from`, if `target` is `from`
    /// or one of its (transitive) bases. The first path in declaration order wins.
    ///
    /// Terminates because `add_base` keeps the base graph acyclic.
    fn upcast_offset(&self, from: TypeTag, target: TypeTag) -> Option<isize> {
        if from == target {
            return Some(0);
        }
        let Some(Entry {
            kind: Kind::Class { bases },
            ..
        }) = self.entry(from)
        else {
            return None;
        };
        bases.iter().find_map(|&(base, offset)| {
            self.upcast_offset(base, target)
                .map(|rest| offset.wrapping_add(rest))
        })
    }
}

impl TypeInfo for Hierarchy {
    fn is_pointer_type(&self, ty: TypeTag) -> bool {
        matches!(
            self.entry(ty),
            Some(Entry {
                kind: Kind::Pointer { .. },
                ..
            })
        )
    }

    fn can_catch(&self, catch_type: TypeTag, thrown_type: TypeTag, adjusted: &mut Handle) -> bool {
        match (self.entry(catch_type), self.entry(thrown_type)) {
            (
                Some(Entry {
                    kind: Kind::Pointer { pointee: catch },
                    ..
                }),
                Some(Entry {
                    kind: Kind::Pointer { pointee: thrown },
                    ..
                }),
            ) => {
                // The pointee lives behind the thrown object, which is never read here, so the
                // handle stays as it is.
                self.upcast_offset(*thrown, *catch).is_some()
            }
            (Some(_), Some(_)) => match self.upcast_offset(thrown_type, catch_type) {
                Some(offset) => {
                    *adjusted = adjusted.offset(offset);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Base;
    struct Derived;

    #[test]
    fn exact_match() {
        let mut types = Hierarchy::new();
        let a = types.declare("A");
        let mut h = Handle::from_addr(0x100);
        assert!(types.can_catch(a, a, &mut h));
        assert_eq!(h, Handle::from_addr(0x100));
    }

    #[test]
    fn multiple_inheritance_adjusts() {
        let mut types = Hierarchy::new();
        let base = types.declare("Base");
        let exception = types.declare("std::exception");
        let derived = types.declare("Exception");
        types.add_base(derived, base, 0);
        types.add_base(derived, exception, 8);

        let mut h = Handle::from_addr(0x100);
        assert!(types.can_catch(exception, derived, &mut h));
        assert_eq!(h, Handle::from_addr(0x108));

        let mut h = Handle::from_addr(0x100);
        assert!(types.can_catch(base, derived, &mut h));
        assert_eq!(h, Handle::from_addr(0x100));

        let mut h = Handle::from_addr(0x100);
        assert!(!types.can_catch(derived, exception, &mut h));
        assert_eq!(h, Handle::from_addr(0x100));
    }

    #[test]
    fn transitive_offsets_add_up() {
        let mut types = Hierarchy::new();
        let a = types.declare("A");
        let b = types.declare("B");
        let c = types.declare("C");
        types.add_base(b, a, 4);
        types.add_base(c, b, 12);
        let mut h = Handle::from_addr(0x100);
        assert!(types.can_catch(a, c, &mut h));
        assert_eq!(h, Handle::from_addr(0x110));
    }

    #[test]
    fn pointers() {
        let mut types = Hierarchy::new();
        let base = types.declare("Base");
        let derived = types.declare("Derived");
        types.add_base(derived, base, 16);
        let base_ptr = types.pointer_to(base);
        let derived_ptr = types.pointer_to(derived);
        assert_eq!(types.pointer_to(base), base_ptr);
        assert!(types.is_pointer_type(base_ptr));
        assert!(!types.is_pointer_type(base));

        let mut h = Handle::from_addr(0x100);
        assert!(types.can_catch(base_ptr, derived_ptr, &mut h));
        assert_eq!(h, Handle::from_addr(0x100));
        assert!(!types.can_catch(derived_ptr, base_ptr, &mut h));
        assert!(!types.can_catch(base, base_ptr, &mut h));
    }

    #[test]
    fn rust_types() {
        let mut types = Hierarchy::new();
        assert_eq!(types.tag_of::<Base>(), None);
        let base = types.declare_type::<Base>();
        let derived = types.declare_type::<Derived>();
        assert_eq!(types.declare_type::<Base>(), base);
        assert_eq!(types.tag_of::<Derived>(), Some(derived));
        assert!(types.name(base).unwrap().ends_with("Base"));
    }

    #[test]
    #[should_panic(expected = "would derive from itself")]
    fn cyclic_bases_are_rejected() {
        let mut types = Hierarchy::new();
        let a = types.declare("A");
        let b = types.declare("B");
        let c = types.declare("C");
        types.add_base(a, b, 0);
        types.add_base(b, c, 0);
        types.add_base(c, a, 0);
    }

    #[test]
    #[should_panic(expected = "would derive from itself")]
    fn self_base_is_rejected() {
        let mut types = Hierarchy::new();
        let a = types.declare("A");
        types.add_base(a, a, 0);
    }

    #[test]
    fn diamonds_are_not_cycles() {
        let mut types = Hierarchy::new();
        let top = types.declare("Top");
        let left = types.declare("Left");
        let right = types.declare("Right");
        let bottom = types.declare("Bottom");
        let unrelated = types.declare("Unrelated");
        types.add_base(left, top, 0);
        types.add_base(right, top, 0);
        types.add_base(bottom, left, 0);
        types.add_base(bottom, right, 8);

        let mut h = Handle::from_addr(0x100);
        assert!(types.can_catch(top, bottom, &mut h));
        assert_eq!(h, Handle::from_addr(0x100));
        assert!(!types.can_catch(unrelated, bottom, &mut h));
    }

    #[test]
    fn unknown_tags_never_match() {
        let types = Hierarchy::new();
        let mut h = Handle::from_addr(0x100);
        let bogus = TypeTag::new(99).unwrap();
        assert!(!types.can_catch(bogus, bogus, &mut h));
    }
}
