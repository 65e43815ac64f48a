//! Surface materials reported with every query hit.
//!
//! A material carries the collision response of the hit collider plus a small
//! bitmask of gameplay tags. The default character callbacks read both: the
//! response decides whether a hit can block the character at all, and the tags
//! let level data opt surfaces out of character collision or grounding.

use num_traits::{One, PrimInt};

/// Trait implemented by tag enums stored in a [`BitmaskFlags`].
///
/// The enum's discriminant (via `#[repr(u8)]`) determines the bit index.
/// The backing integer type is chosen via the associated `Storage`.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A plain bitmask container for tag enums.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    pub fn from_tags<U: FlagBitmask<Storage = T> + Copy>(tags: &[U]) -> Self {
        let mut flags = Self::new(T::zero());
        for &tag in tags {
            flags.add(tag);
        }
        flags
    }

    pub fn add<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits | tag.mask();
    }

    pub fn remove<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits & !tag.mask();
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    pub fn has_any<U: FlagBitmask<Storage = T> + Copy>(&self, tags: &[U]) -> bool {
        let combined = tags.iter().fold(T::zero(), |acc, t| acc | t.mask());
        (self.bits & combined) != T::zero()
    }
}

/// Declare a bitmask-backed tag enum and implement `FlagBitmask` for it.
#[macro_export]
macro_rules! define_bitmask_flags {
    ($name:ident, $storage:ty, { $($(#[$meta:meta])* $variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$meta])* $variant),*
        }

        impl $crate::collision::material::FlagBitmask for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}

define_bitmask_flags!(MaterialTag, u8, {
    /// Characters pass through this surface (e.g. foliage, soft blockers).
    IgnoreCharacters,
    /// The surface never counts as ground, whatever its slope.
    NotGroundable,
});

/// Tag set stored on a material.
pub type MaterialTags = BitmaskFlags<u8>;

/// How a collider responds to contact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum CollisionResponse {
    /// Solid surface.
    #[default]
    Collide,
    /// Solid surface that also reports contact events.
    CollideRaiseCollisionEvents,
    /// Trigger volume; never blocks movement.
    RaiseTriggerEvents,
    /// Queryable but inert.
    None,
}

impl CollisionResponse {
    #[inline]
    pub fn is_collidable(self) -> bool {
        matches!(
            self,
            CollisionResponse::Collide | CollisionResponse::CollideRaiseCollisionEvents
        )
    }
}

/// Material of the surface that produced a hit.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-serialize",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct HitMaterial {
    pub response: CollisionResponse,
    pub friction: f32,
    pub restitution: f32,
    pub tags: MaterialTags,
}

impl Default for HitMaterial {
    fn default() -> Self {
        Self {
            response: CollisionResponse::Collide,
            friction: 0.5,
            restitution: 0.0,
            tags: MaterialTags::default(),
        }
    }
}

impl HitMaterial {
    #[inline]
    pub fn trigger() -> Self {
        Self {
            response: CollisionResponse::RaiseTriggerEvents,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_tags(mut self, tags: &[MaterialTag]) -> Self {
        self.tags = MaterialTags::from_tags(tags);
        self
    }
}
