//! Value protocol: hashing and equality for keys and values.
//!
//! Every key stored in a hashed container implements [`Value`]. The protocol
//! mirrors `std::hash::Hash` + `Eq` but produces a 31-bit signed hash directly
//! so the trie can consume it five bits at a time, and it lets a type define
//! equality that differs from `PartialEq` (floats treat every NaN as equal to
//! every other NaN, for instance).
//!
//! # Built-in behavior
//!
//! - Integers hash to themselves, reduced to 31 bits. Integers that do not fit
//!   in 32 bits fold their high half into the low half first.
//! - Floats hash like the integer they equal when they are integral. NaN and
//!   both infinities hash to `0`. `NaN` equals `NaN`, and `0.0` equals `-0.0`.
//! - Strings use a polynomial rolling hash (`31 * h + c`). Hashes of strings
//!   longer than 16 bytes are memoized in a small per-thread cache.
//! - Containers in this crate hash their contents (order-sensitive for lists
//!   and ordered maps/sets) and compare deeply.
//! - [`Identity`] compares by reference and hashes by a lazily assigned,
//!   process-wide counter value.
//! - [`Structural`] adapts any `std::hash::Hash + Eq` type.
//!
//! # Contract
//!
//! `a.equals(b)` implies `a.hash_code() == b.hash_code()`. Violating it is a
//! programming error: lookups may miss, but no operation panics.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]

use std::cell::RefCell;
use std::fmt;
use std::hash::Hasher;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::{FxHashMap, FxHasher};

use crate::persistent::{HashCache, ReferenceCounter};

/// A 31-bit signed hash, stored in an `i32`.
pub type Hash = i32;

/// Hash of `false`.
const FALSE_HASH: Hash = 0x4210_8420;
/// Hash of `true`.
const TRUE_HASH: Hash = 0x4210_8421;
/// Hash of `()` and `None`.
const NULL_HASH: Hash = 0x4210_8422;

/// Strings longer than this many bytes have their hash memoized.
const STRING_HASH_CACHE_MIN_LENGTH: usize = 16;
/// The memo is discarded wholesale once it holds this many strings.
const STRING_HASH_CACHE_MAX_SIZE: usize = 255;

// =============================================================================
// Value trait
// =============================================================================

/// Hashing and equality used by the hashed containers.
///
/// Implement this for a composite type to give it a custom hash and equality.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::value::{Hash, Value};
/// use persistent_collections::persistent::PersistentMap;
///
/// #[derive(Clone)]
/// struct CaseInsensitive(String);
///
/// impl Value for CaseInsensitive {
///     fn hash_code(&self) -> Hash {
///         self.0.to_lowercase().hash_code()
///     }
///
///     fn equals(&self, other: &Self) -> bool {
///         self.0.eq_ignore_ascii_case(&other.0)
///     }
/// }
///
/// let map = PersistentMap::new().set(CaseInsensitive("Key".into()), 1);
/// assert_eq!(map.get(&CaseInsensitive("KEY".into())), Some(&1));
/// ```
pub trait Value {
    /// Returns the 31-bit hash of this value.
    fn hash_code(&self) -> Hash;

    /// Returns `true` if `self` and `other` are the same value.
    fn equals(&self, other: &Self) -> bool;
}

/// Hashes `value` through the value protocol.
#[inline]
pub fn hash<T: Value + ?Sized>(value: &T) -> Hash {
    value.hash_code()
}

/// Compares two values through the value protocol.
///
/// ```rust
/// use persistent_collections::value::is;
///
/// assert!(is(&f64::NAN, &f64::NAN));
/// assert!(is(&0.0_f64, &-0.0_f64));
/// assert!(!is(&1.0_f64, &2.0_f64));
/// ```
#[inline]
pub fn is<T: Value + ?Sized>(first: &T, second: &T) -> bool {
    first.equals(second)
}

// =============================================================================
// Hash primitives
// =============================================================================

/// Reduces a 32-bit integer to the 31-bit range by copying the sign bit into
/// bit 30.
#[inline]
#[must_use]
pub const fn smi(value: i32) -> Hash {
    (((value as u32) >> 1) & 0x4000_0000) as i32 | (value & (0xbfff_ffff_u32 as i32))
}

/// Hashes an integer. Values that fit in 32 bits hash to themselves (after
/// [`smi`] reduction); wider values fold their high half in.
#[inline]
#[must_use]
pub const fn hash_integer(value: i64) -> Hash {
    if value >= i32::MIN as i64 && value <= i32::MAX as i64 {
        smi(value as i32)
    } else {
        smi((value as i32) ^ ((value >> 32) as i32))
    }
}

/// Hashes a float. NaN and infinities hash to `0`; integral values hash like
/// the corresponding integer.
#[must_use]
pub fn hash_number(number: f64) -> Hash {
    if !number.is_finite() {
        return 0;
    }
    if number.fract() == 0.0 && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        return hash_integer(number as i64);
    }
    let bits = number.to_bits();
    smi((bits as i32) ^ ((bits >> 32) as i32))
}

/// Polynomial rolling hash over the characters of `text`.
#[must_use]
pub fn hash_string(text: &str) -> Hash {
    let hashed = text
        .chars()
        .fold(0_i32, |hashed, character| hashed.wrapping_mul(31).wrapping_add(character as i32));
    smi(hashed)
}

thread_local! {
    static STRING_HASH_CACHE: RefCell<FxHashMap<Box<str>, Hash>> =
        RefCell::new(FxHashMap::default());
}

fn cached_hash_string(text: &str) -> Hash {
    STRING_HASH_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(&hashed) = cache.get(text) {
            return hashed;
        }
        let hashed = hash_string(text);
        if cache.len() >= STRING_HASH_CACHE_MAX_SIZE {
            tracing::trace!(entries = cache.len(), "resetting string hash cache");
            cache.clear();
        }
        cache.insert(text.into(), hashed);
        hashed
    })
}

/// Combines two hashes into one, order-sensitively.
#[inline]
#[must_use]
pub const fn hash_merge(first: Hash, second: Hash) -> Hash {
    first
        ^ (second
            .wrapping_add(0x9e37_79b9_u32 as i32)
            .wrapping_add(first << 6)
            .wrapping_add(first >> 2))
}

/// Final avalanche applied to collection hashes, mixing in the element count.
#[must_use]
pub const fn murmur_hash_of_size(size: usize, hash: Hash) -> Hash {
    let mut mixed = hash.wrapping_mul(0xcc9e_2d51_u32 as i32);
    mixed = mixed.rotate_left(15).wrapping_mul(0x1b87_3593);
    mixed = mixed.rotate_left(13).wrapping_mul(5);
    mixed = mixed.wrapping_add(0xe654_6b64_u32 as i32) ^ (size as i32);
    mixed = (mixed ^ ((mixed as u32) >> 16) as i32).wrapping_mul(0x85eb_ca6b_u32 as i32);
    mixed = (mixed ^ ((mixed as u32) >> 13) as i32).wrapping_mul(0xc2b2_ae35_u32 as i32);
    smi(mixed ^ ((mixed as u32) >> 16) as i32)
}

/// Hashes a sequence of element hashes where position matters.
pub fn hash_ordered<I: IntoIterator<Item = Hash>>(hashes: I) -> Hash {
    let (size, hashed) = hashes.into_iter().fold((0_usize, 1_i32), |(size, hashed), element| {
        (size + 1, hashed.wrapping_mul(31).wrapping_add(element))
    });
    murmur_hash_of_size(size, hashed)
}

/// Hashes a bag of element hashes where position does not matter.
pub fn hash_unordered<I: IntoIterator<Item = Hash>>(hashes: I) -> Hash {
    let (size, hashed) = hashes
        .into_iter()
        .fold((0_usize, 0_i32), |(size, hashed), element| (size + 1, hashed.wrapping_add(element)));
    murmur_hash_of_size(size, hashed)
}

// =============================================================================
// Scalar implementations
// =============================================================================

macro_rules! impl_value_for_integer {
    ($($integer:ty),* $(,)?) => {
        $(
            impl Value for $integer {
                #[inline]
                fn hash_code(&self) -> Hash {
                    hash_integer(*self as i64)
                }

                #[inline]
                fn equals(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_value_for_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_value_for_wide_integer {
    ($($integer:ty),* $(,)?) => {
        $(
            impl Value for $integer {
                #[inline]
                fn hash_code(&self) -> Hash {
                    hash_integer((*self as i64) ^ ((*self >> 64) as i64))
                }

                #[inline]
                fn equals(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_value_for_wide_integer!(i128, u128);

impl Value for f64 {
    fn hash_code(&self) -> Hash {
        hash_number(*self)
    }

    fn equals(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl Value for f32 {
    fn hash_code(&self) -> Hash {
        hash_number(f64::from(*self))
    }

    fn equals(&self, other: &Self) -> bool {
        self == other || (self.is_nan() && other.is_nan())
    }
}

impl Value for bool {
    fn hash_code(&self) -> Hash {
        if *self { TRUE_HASH } else { FALSE_HASH }
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

impl Value for char {
    fn hash_code(&self) -> Hash {
        hash_integer(i64::from(u32::from(*self)))
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

impl Value for () {
    fn hash_code(&self) -> Hash {
        NULL_HASH
    }

    fn equals(&self, _other: &Self) -> bool {
        true
    }
}

impl Value for str {
    fn hash_code(&self) -> Hash {
        if self.len() > STRING_HASH_CACHE_MIN_LENGTH {
            cached_hash_string(self)
        } else {
            hash_string(self)
        }
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

impl Value for String {
    fn hash_code(&self) -> Hash {
        self.as_str().hash_code()
    }

    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

// =============================================================================
// Composite implementations
// =============================================================================

impl<T: Value + ?Sized> Value for &T {
    fn hash_code(&self) -> Hash {
        (**self).hash_code()
    }

    fn equals(&self, other: &Self) -> bool {
        (**self).equals(*other)
    }
}

impl<T: Value + ?Sized> Value for Box<T> {
    fn hash_code(&self) -> Hash {
        (**self).hash_code()
    }

    fn equals(&self, other: &Self) -> bool {
        (**self).equals(other)
    }
}

impl<T: Value + ?Sized> Value for Rc<T> {
    fn hash_code(&self) -> Hash {
        (**self).hash_code()
    }

    fn equals(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || (**self).equals(other)
    }
}

impl<T: Value + ?Sized> Value for Arc<T> {
    fn hash_code(&self) -> Hash {
        (**self).hash_code()
    }

    fn equals(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || (**self).equals(other)
    }
}

impl<T: Value> Value for Option<T> {
    fn hash_code(&self) -> Hash {
        self.as_ref().map_or(NULL_HASH, Value::hash_code)
    }

    fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(first), Some(second)) => first.equals(second),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Value> Value for [T] {
    fn hash_code(&self) -> Hash {
        hash_ordered(self.iter().map(Value::hash_code))
    }

    fn equals(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|(first, second)| first.equals(second))
    }
}

impl<T: Value> Value for Vec<T> {
    fn hash_code(&self) -> Hash {
        self.as_slice().hash_code()
    }

    fn equals(&self, other: &Self) -> bool {
        self.as_slice().equals(other.as_slice())
    }
}

macro_rules! impl_value_for_tuple {
    ($(($($name:ident : $index:tt),+)),* $(,)?) => {
        $(
            impl<$($name: Value),+> Value for ($($name,)+) {
                fn hash_code(&self) -> Hash {
                    hash_ordered([$(self.$index.hash_code()),+])
                }

                fn equals(&self, other: &Self) -> bool {
                    $(self.$index.equals(&other.$index))&&+
                }
            }
        )*
    };
}

impl_value_for_tuple!(
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
);

// =============================================================================
// Identity
// =============================================================================

static NEXT_IDENTITY_HASH: AtomicU32 = AtomicU32::new(1);

/// Returns the next identity hash: a monotonically increasing counter that
/// wraps to zero after 30 bits.
fn next_identity_hash() -> Hash {
    (NEXT_IDENTITY_HASH.fetch_add(1, Ordering::Relaxed) & 0x3fff_ffff) as Hash
}

struct IdentityCell<T> {
    hash: HashCache,
    value: T,
}

/// A shared handle compared by reference identity.
///
/// Two `Identity` handles are equal only if they were cloned from the same
/// [`Identity::new`] call. The hash is assigned from a process-wide counter the
/// first time it is requested and stored in the handle's allocation, so every
/// clone rehashes identically and no side table keeps the value alive.
///
/// # Examples
///
/// ```rust
/// use persistent_collections::value::{Identity, Value};
///
/// let first = Identity::new("shape");
/// let second = Identity::new("shape");
/// assert!(first.equals(&first.clone()));
/// assert!(!first.equals(&second));
/// assert_eq!(first.hash_code(), first.clone().hash_code());
/// ```
pub struct Identity<T> {
    cell: ReferenceCounter<IdentityCell<T>>,
}

impl<T> Identity<T> {
    /// Wraps `value` in a new identity.
    pub fn new(value: T) -> Self {
        Self {
            cell: ReferenceCounter::new(IdentityCell {
                hash: HashCache::new(),
                value,
            }),
        }
    }

    /// Returns `true` if both handles refer to the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self {
            cell: ReferenceCounter::clone(&self.cell),
        }
    }
}

impl<T> Deref for Identity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.cell.value
    }
}

impl<T> Value for Identity<T> {
    fn hash_code(&self) -> Hash {
        *self.cell.hash.get_or_init(next_identity_hash)
    }

    fn equals(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: fmt::Debug> fmt::Debug for Identity<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Identity").field(&self.cell.value).finish()
    }
}

// =============================================================================
// Structural
// =============================================================================

/// Adapts a `std::hash::Hash + Eq` type to the value protocol.
///
/// ```rust
/// use persistent_collections::value::{Structural, Value};
///
/// #[derive(Hash, PartialEq, Eq)]
/// struct Point { x: i32, y: i32 }
///
/// let first = Structural(Point { x: 1, y: 2 });
/// let second = Structural(Point { x: 1, y: 2 });
/// assert!(first.equals(&second));
/// assert_eq!(first.hash_code(), second.hash_code());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Structural<T>(pub T);

impl<T: std::hash::Hash + Eq> Value for Structural<T> {
    fn hash_code(&self) -> Hash {
        let mut hasher = FxHasher::default();
        std::hash::Hash::hash(&self.0, &mut hasher);
        let hashed = hasher.finish();
        smi((hashed as i32) ^ ((hashed >> 32) as i32))
    }

    fn equals(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
