//! The reference engine.
//!
//! Every reference-typed slot starts with one varuint tag: `0` is null, `1`
//! introduces a new object, and `i + 2` is a back-reference to the object
//! whose first encounter was assigned index `i`. New objects at polymorphic
//! sites carry their dynamic type identity before the payload; sites whose
//! static type is final skip it. On decode a slot is allocated before any
//! payload so cyclic children can resolve their back-references.

use crate::{
    codec::{
        Codec,
        DecodeCx,
        DynIn,
        DynOut,
        EncodeCx,
    },
    error::{
        Error,
        Malformed,
    },
    formatter::Formatter,
    graph::{
        ObjRef,
        Ref,
    },
};
use core::{
    any::{
        Any,
        TypeId,
    },
    marker::PhantomData,
};
use std::sync::Arc;
use tether_wire::{
    Input,
    Output,
    VarintRead,
    VarintWrite,
};

const TAG_NULL: u64 = 0;
const TAG_NEW: u64 = 1;
const TAG_BACK_BASE: u64 = 2;

/// Adapts a content formatter to the uniform slot-facing surface, erasing
/// the concrete type behind [`ObjRef`].
pub(crate) trait Dispatch: Send + Sync {
    fn encode_obj(
        &self,
        cx: &mut EncodeCx<'_>,
        obj: &ObjRef,
        out: &mut dyn Output,
    ) -> Result<(), Error>;

    fn decode_obj(
        &self,
        cx: &mut DecodeCx<'_>,
        slot: usize,
        input: &mut dyn Input,
    ) -> Result<ObjRef, Error>;
}

/// Dispatcher for default-constructible types: the handle is published to
/// the slot *before* the payload decodes, so the type may participate in
/// cycles.
pub(crate) struct InPlaceDispatch<T> {
    fmt: Arc<dyn Formatter>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Codec + Send + Default> Dispatch for InPlaceDispatch<T> {
    fn encode_obj(
        &self,
        cx: &mut EncodeCx<'_>,
        obj: &ObjRef,
        out: &mut dyn Output,
    ) -> Result<(), Error> {
        let node = obj
            .downcast::<T>()
            .ok_or_else(|| Error::missing_formatter(obj.type_name()))?;
        let guard = node.lock();
        self.fmt.encode_any(cx, &*guard as &dyn Any, out)
    }

    fn decode_obj(
        &self,
        cx: &mut DecodeCx<'_>,
        slot: usize,
        input: &mut dyn Input,
    ) -> Result<ObjRef, Error> {
        cx.charge(core::mem::size_of::<T>().max(1))?;
        let node = Ref::new(T::default());
        let obj = ObjRef::from_ref(&node);
        cx.session.set(slot, obj.clone());
        let mut guard = node.lock();
        self.fmt
            .decode_any_into(cx, &mut *guard as &mut dyn Any, input)?;
        drop(guard);
        Ok(obj)
    }
}

/// Dispatcher for types without a default value: the payload decodes first
/// and the slot is published afterwards, so a cycle through such an object
/// fails with a cyclic-before-init error instead of deadlocking on a value
/// that cannot exist half-built.
pub(crate) struct ByValueDispatch<T> {
    fmt: Arc<dyn Formatter>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Codec + Send> Dispatch for ByValueDispatch<T> {
    fn encode_obj(
        &self,
        cx: &mut EncodeCx<'_>,
        obj: &ObjRef,
        out: &mut dyn Output,
    ) -> Result<(), Error> {
        let node = obj
            .downcast::<T>()
            .ok_or_else(|| Error::missing_formatter(obj.type_name()))?;
        let guard = node.lock();
        self.fmt.encode_any(cx, &*guard as &dyn Any, out)
    }

    fn decode_obj(
        &self,
        cx: &mut DecodeCx<'_>,
        slot: usize,
        input: &mut dyn Input,
    ) -> Result<ObjRef, Error> {
        cx.charge(core::mem::size_of::<T>().max(1))?;
        let boxed = self.fmt.decode_any(cx, input)?;
        let value = boxed
            .downcast::<T>()
            .map_err(|_| Error::missing_formatter(core::any::type_name::<T>()))?;
        let obj = ObjRef::new(*value);
        cx.session.set(slot, obj.clone());
        Ok(obj)
    }
}

pub(crate) fn make_in_place<T: Codec + Send + Default>(
    fmt: Arc<dyn Formatter>,
) -> Arc<dyn Dispatch> {
    Arc::new(InPlaceDispatch::<T> {
        fmt,
        _marker: PhantomData,
    })
}

pub(crate) fn make_by_value<T: Codec + Send>(fmt: Arc<dyn Formatter>) -> Arc<dyn Dispatch> {
    Arc::new(ByValueDispatch::<T> {
        fmt,
        _marker: PhantomData,
    })
}

fn back_tag(index: usize) -> u64 {
    (index as u64).saturating_add(TAG_BACK_BASE)
}

fn back_index(tag: u64) -> usize {
    usize::try_from(tag.saturating_sub(TAG_BACK_BASE)).unwrap_or(usize::MAX)
}

/// Encode a reference slot whose static type is final: no dynamic identity
/// travels, the payload is always the static type's.
fn encode_sealed<T: Codec + Send>(
    cx: &mut EncodeCx<'_>,
    node: &Ref<T>,
    out: &mut dyn Output,
) -> Result<(), Error> {
    if let Some(index) = cx.session.lookup(node.addr()) {
        tracing::trace!(index, "reference slot: back");
        out.write_varuint(back_tag(index))?;
        return Ok(())
    }
    let index = cx.session.allocate(node.addr());
    tracing::trace!(index, "reference slot: new");
    out.write_varuint(TAG_NEW)?;
    let fmt = cx.kernel.content_formatter_by_id(TypeId::of::<T>())?;
    let guard = node.lock();
    match fmt {
        Some(fmt) => fmt.encode_any(cx, &*guard as &dyn Any, out),
        None => guard.encode(cx, out),
    }
}

fn decode_sealed<T: Codec + Send + Default>(
    cx: &mut DecodeCx<'_>,
    input: &mut dyn Input,
) -> Result<Option<Ref<T>>, Error> {
    let tag = input.read_varuint64()?;
    match tag {
        TAG_NULL => Ok(None),
        TAG_NEW => {
            let slot = cx.session.allocate();
            cx.charge(core::mem::size_of::<T>().max(1))?;
            let node = Ref::new(T::default());
            cx.session.set(slot, ObjRef::from_ref(&node));
            let fmt = cx.kernel.content_formatter_by_id(TypeId::of::<T>())?;
            {
                let mut guard = node.lock();
                match fmt {
                    Some(fmt) => {
                        fmt.decode_any_into(cx, &mut *guard as &mut dyn Any, input)?
                    }
                    None => *guard = T::decode(cx, input)?,
                }
            }
            Ok(Some(node))
        }
        tag => {
            let index = back_index(tag);
            let obj = cx.session.get(index)?;
            let node = obj
                .downcast::<T>()
                .ok_or(Malformed::SlotTypeMismatch { index })?;
            Ok(Some(node))
        }
    }
}

/// Encode a polymorphic reference slot: new objects carry their dynamic
/// type identity before the payload.
fn encode_poly(
    cx: &mut EncodeCx<'_>,
    obj: &ObjRef,
    out: &mut dyn Output,
) -> Result<(), Error> {
    if let Some(index) = cx.session.lookup(obj.addr()) {
        tracing::trace!(index, "polymorphic slot: back");
        out.write_varuint(back_tag(index))?;
        return Ok(())
    }
    let index = cx.session.allocate(obj.addr());
    tracing::trace!(index, ty = obj.type_name(), "polymorphic slot: new");
    out.write_varuint(TAG_NEW)?;
    let entry = cx
        .kernel
        .entry_by_id(obj.value_type())
        .ok_or_else(|| Error::missing_formatter(obj.type_name()))?;
    cx.kernel.write_type_ident(out, &entry.ident)?;
    let dispatch = cx.kernel.dispatcher_for(&entry)?;
    dispatch.encode_obj(cx, obj, out)
}

fn decode_poly(
    cx: &mut DecodeCx<'_>,
    input: &mut dyn Input,
) -> Result<Option<ObjRef>, Error> {
    let tag = input.read_varuint64()?;
    match tag {
        TAG_NULL => Ok(None),
        TAG_NEW => {
            let slot = cx.session.allocate();
            let ident = cx.kernel.read_type_ident(input)?;
            let entry = cx.kernel.resolve_entry(&ident)?;
            let dispatch = cx.kernel.dispatcher_for(&entry)?;
            let obj = dispatch.decode_obj(cx, slot, input)?;
            if !cx.session.is_written(slot) {
                return Err(Malformed::SlotNotWritten { index: slot }.into())
            }
            Ok(Some(obj))
        }
        tag => {
            let index = back_index(tag);
            Ok(Some(cx.session.get(index)?))
        }
    }
}

impl<T: Codec + Send + Default> Codec for Ref<T> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        encode_sealed(cx, self, &mut DynOut(out))
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        decode_sealed(cx, &mut DynIn(input))?
            .ok_or_else(|| Malformed::UnexpectedNull.into())
    }
}

impl<T: Codec + Send + Default> Codec for Option<Ref<T>> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        match self {
            None => {
                out.write_varuint(TAG_NULL)?;
                Ok(())
            }
            Some(node) => encode_sealed(cx, node, &mut DynOut(out)),
        }
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        decode_sealed(cx, &mut DynIn(input))
    }
}

impl Codec for ObjRef {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        encode_poly(cx, self, &mut DynOut(out))
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        decode_poly(cx, &mut DynIn(input))?
            .ok_or_else(|| Malformed::UnexpectedNull.into())
    }
}

impl Codec for Option<ObjRef> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        match self {
            None => {
                out.write_varuint(TAG_NULL)?;
                Ok(())
            }
            Some(obj) => encode_poly(cx, obj, &mut DynOut(out)),
        }
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        decode_poly(cx, &mut DynIn(input))
    }
}
