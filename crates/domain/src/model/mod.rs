//! Owned, standalone entities: [`Adapter`] → [`Device`] → [`Service`] → [`Parameter`].
//!
//! These are the *detached* form of the hierarchy. They are ordinary values
//! owned by whoever built them and can be populated freely before being
//! moved into a [`Store`](crate::store::Store). Detaching from the store
//! gives the same owned values back. Dropping one frees it: the entity's
//! [`UserData`] is dropped first, then its children.

use std::any::Any;
use std::fmt;

use crate::error::{EntityKind, HubError, Rejected};

macro_rules! impl_entity_common {
    ($ty:ident) => {
        impl $ty {
            #[must_use]
            pub fn id(&self) -> &str {
                &self.id
            }

            #[must_use]
            pub fn attributes(&self) -> &$crate::attribute::Attributes {
                &self.attributes
            }

            pub fn attributes_mut(&mut self) -> &mut $crate::attribute::Attributes {
                &mut self.attributes
            }

            #[must_use]
            pub fn attribute(&self, key: &str) -> Option<&str> {
                self.attributes.get(key)
            }

            /// Set an attribute, returning the previous value.
            ///
            /// # Errors
            ///
            /// See [`Attributes::set`]($crate::attribute::Attributes::set).
            pub fn set_attribute(
                &mut self,
                key: impl Into<String>,
                value: impl Into<String>,
            ) -> Result<Option<String>, $crate::error::HubError> {
                self.attributes.set(key, value)
            }
        }
    };
}

macro_rules! impl_user_data {
    ($ty:ident) => {
        impl $ty {
            #[must_use]
            pub fn data(&self) -> Option<&$crate::model::UserData> {
                self.data.as_ref()
            }

            pub fn data_mut(&mut self) -> Option<&mut $crate::model::UserData> {
                self.data.as_mut()
            }

            /// Replace the user data, returning the previous payload.
            pub fn set_data(
                &mut self,
                data: $crate::model::UserData,
            ) -> Option<$crate::model::UserData> {
                self.data.replace(data)
            }

            pub fn take_data(&mut self) -> Option<$crate::model::UserData> {
                self.data.take()
            }
        }
    };
}

mod adapter;
mod device;
mod parameter;
mod service;

pub use adapter::{Adapter, AdapterBuilder};
pub use device::{Device, DeviceBuilder};
pub use parameter::{Parameter, ParameterBuilder};
pub use service::{Action, Actions, Service, ServiceBuilder};

/// Opaque, typed payload owned by an entity.
///
/// Dropping it is the entity's free hook: implement [`Drop`] on the payload
/// to release non-memory resources when the entity is freed.
pub struct UserData(Box<dyn Any + Send>);

impl UserData {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }

    /// Take the payload back out.
    ///
    /// # Errors
    ///
    /// Gives `self` back if the payload is not a `T`.
    pub fn into_inner<T: Any>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|boxed| *boxed).map_err(Self)
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserData(..)")
    }
}

/// Append `child` unless a sibling already uses its identifier.
fn push_unique<T>(
    children: &mut Vec<T>,
    child: T,
    kind: EntityKind,
    id_of: impl Fn(&T) -> &str,
) -> Result<(), Rejected<T>> {
    let id = id_of(&child);
    if children.iter().any(|c| id_of(c) == id) {
        let error = HubError::NotUnique {
            kind,
            id: id.to_string(),
        };
        return Err(Rejected::new(error, child));
    }
    children.push(child);
    Ok(())
}

fn take_child<T>(children: &mut Vec<T>, id: &str, id_of: impl Fn(&T) -> &str) -> Option<T> {
    let position = children.iter().position(|c| id_of(c) == id)?;
    Some(children.remove(position))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn should_downcast_to_stored_type() {
        let mut data = UserData::new(7_u32);
        assert!(data.is::<u32>());
        *data.downcast_mut::<u32>().unwrap() += 1;
        assert_eq!(data.downcast_ref::<u32>(), Some(&8));
        assert!(data.downcast_ref::<String>().is_none());
    }

    #[test]
    fn should_give_data_back_when_type_mismatches() {
        let data = UserData::new("text");
        let data = data.into_inner::<u32>().unwrap_err();
        assert_eq!(data.into_inner::<&str>().unwrap(), "text");
    }

    #[test]
    fn should_run_free_hook_once_when_dropped() {
        let drops = Arc::new(AtomicUsize::new(0));
        let data = UserData::new(Counted(Arc::clone(&drops)));
        drop(data);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
