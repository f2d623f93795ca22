//! The diffable capability: an explicit, ordered description of a type's
//! fields that the diff engine walks instead of inspecting types at runtime.

use serde::Serialize;
pub use serde_json::Value;

use crate::errors::{ExError, Result};

/// Conversion of a value into its document (JSON) form
///
/// Blanket-implemented for every sized `Serialize` type so that field
/// references can be stored as trait objects.
pub trait AsDocument {
    fn as_document(&self) -> Result<Value>;
}

impl<T: Serialize> AsDocument for T {
    fn as_document(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ExError::serialization("as_document", e))
    }
}

/// Identity of a collection element, compared across original and current
pub trait IdentityKey {
    fn identity_key(&self) -> Option<Value>;
}

macro_rules! identity_key_by_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IdentityKey for $ty {
                fn identity_key(&self) -> Option<Value> {
                    serde_json::to_value(self).ok()
                }
            }
        )*
    };
}

identity_key_by_value!(String, u32, u64, i32, i64, crate::model::ObjectId);

/// One field as seen by the diff engine
pub enum Field<'a> {
    /// Compared by document equality; a change becomes a field-set
    Scalar(&'a dyn AsDocument),
    /// Nested trackable object, recursed into when present on both sides
    Nested(Option<&'a dyn Diffable>),
    /// Collection compared by element membership
    Collection(Vec<Element<'a>>),
}

/// One collection element
pub enum Element<'a> {
    /// Identified by its value
    Scalar(&'a dyn AsDocument),
    /// Identified by `Diffable::identity`, falling back to its document;
    /// elements present on both sides are diffed recursively
    Trackable(&'a dyn Diffable),
}

/// A type whose changes can be computed structurally
///
/// `fields` must return the same names in the same order for every value of
/// the type; the order is the traversal order of the diff.
pub trait Diffable: AsDocument {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)>;

    /// Identity used to match this value inside a collection
    fn identity(&self) -> Option<Value> {
        None
    }
}

/// Implement [`Diffable`] from a field list
///
/// Field kinds:
/// - `value`: scalar or unmodeled type (`Serialize`)
/// - `nested`: a `Diffable` field
/// - `optional`: an `Option` of a `Diffable`
/// - `values`: a collection of scalars, matched by value
/// - `trackables`: a collection of `Diffable`s, matched by identity
///
/// An optional `identity:` clause names a field implementing
/// [`IdentityKey`] used to match values of this type inside collections.
///
/// ```
/// use docunit_core::diffable;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Address {
///     city: String,
///     zip: String,
/// }
///
/// diffable!(Address { city: value, zip: value });
/// ```
#[macro_export]
macro_rules! diffable {
    (@field $self:ident, $field:ident, value) => {
        $crate::diff::field::Field::Scalar(&$self.$field)
    };
    (@field $self:ident, $field:ident, nested) => {
        $crate::diff::field::Field::Nested(Some(&$self.$field))
    };
    (@field $self:ident, $field:ident, optional) => {
        $crate::diff::field::Field::Nested(
            $self
                .$field
                .as_ref()
                .map(|v| v as &dyn $crate::diff::field::Diffable),
        )
    };
    (@field $self:ident, $field:ident, values) => {
        $crate::diff::field::Field::Collection(
            $self
                .$field
                .iter()
                .map(|v| $crate::diff::field::Element::Scalar(v))
                .collect(),
        )
    };
    (@field $self:ident, $field:ident, trackables) => {
        $crate::diff::field::Field::Collection(
            $self
                .$field
                .iter()
                .map(|v| $crate::diff::field::Element::Trackable(v))
                .collect(),
        )
    };
    ($ty:ty { identity: $key:ident; $($field:ident : $kind:ident),* $(,)? }) => {
        impl $crate::diff::field::Diffable for $ty {
            fn fields(&self) -> Vec<(&'static str, $crate::diff::field::Field<'_>)> {
                vec![$( (stringify!($field), $crate::diffable!(@field self, $field, $kind)) ),*]
            }

            fn identity(&self) -> Option<$crate::diff::field::Value> {
                $crate::diff::field::IdentityKey::identity_key(&self.$key)
            }
        }
    };
    ($ty:ty { $($field:ident : $kind:ident),* $(,)? }) => {
        impl $crate::diff::field::Diffable for $ty {
            fn fields(&self) -> Vec<(&'static str, $crate::diff::field::Field<'_>)> {
                vec![$( (stringify!($field), $crate::diffable!(@field self, $field, $kind)) ),*]
            }
        }
    };
}
