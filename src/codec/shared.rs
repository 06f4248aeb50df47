//! Shared pointers to polymorphic values: the identity-tracked references.
//!
//! Writing an `Rc<P>` keys the object by its allocation and consults the
//! concrete class's tracking policy. Reading restores sharing: every alias of
//! one stored node decodes to a clone of the same `Rc`.

use super::{Decode, Encode, Strategy};
use crate::archive::{InputArchive, OutputArchive};
use crate::class::Polymorphic;
use crate::error::Result;
use crate::identity::ObjectKey;
use crate::path::StoragePath;
use crate::rt;
use std::rc::Rc;
use std::sync::Arc;

impl<P: Polymorphic> Encode for Rc<P> {
    fn strategy() -> Strategy {
        Strategy::Polymorphic
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        let key = ObjectKey::of_rc(self);
        ar.encode_identified(path, key, &**self, Some(Box::new(Rc::clone(self))))
    }
}

impl<P: Polymorphic> Decode for Rc<P> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let node = ar.tracked_node(path)?;
        if let Some(node) = node
            && let Some(existing) = ar.shared::<Rc<P>>(node)?
        {
            return Ok(existing);
        }
        let value = Rc::new(rt::decode_polymorphic::<P>(ar, path)?);
        if let Some(node) = node {
            ar.share(node, Box::new(Rc::clone(&value)));
        }
        Ok(value)
    }
}

impl<P: Polymorphic> Encode for Arc<P> {
    fn strategy() -> Strategy {
        Strategy::Polymorphic
    }

    fn encode(&self, ar: &mut OutputArchive, path: &StoragePath) -> Result<()> {
        let key = ObjectKey::of_arc(self);
        ar.encode_identified(path, key, &**self, Some(Box::new(Arc::clone(self))))
    }
}

impl<P: Polymorphic> Decode for Arc<P> {
    fn decode(ar: &mut InputArchive, path: &StoragePath) -> Result<Self> {
        let node = ar.tracked_node(path)?;
        if let Some(node) = node
            && let Some(existing) = ar.shared::<Arc<P>>(node)?
        {
            return Ok(existing);
        }
        let value = Arc::new(rt::decode_polymorphic::<P>(ar, path)?);
        if let Some(node) = node {
            ar.share(node, Box::new(Arc::clone(&value)));
        }
        Ok(value)
    }
}
