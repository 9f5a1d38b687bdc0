//! The formatter resolver chain.
//!
//! A resolver inspects a runtime type and either materializes a formatter
//! or declines. Resolvers run in order and the first formatter wins; user
//! resolvers are prepended to the built-in chain, so they can override any
//! built-in decision. Materialized formatters are cached by the kernel, one
//! per type.

use crate::{
    formatter::Formatter,
    ident::TypeIdent,
    kernel::Tether,
    reflect::{
        RuntimeType,
        TypeKind,
    },
};
use std::{
    collections::BTreeMap,
    sync::Arc,
};

/// Materializes formatters for runtime types, or declines.
pub trait Resolver: Send + Sync {
    /// Produce a formatter for the type, or `None` to pass to the next
    /// resolver in the chain.
    fn resolve(&self, kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>>;
}

/// Substitution accumulated while unifying a pattern with a ground type.
pub type Substitution = BTreeMap<u8, TypeIdent>;

/// Structurally unify a pattern (whose `TypeParam` nodes are variables)
/// with a ground target identity.
///
/// Variables unify with any ground type, consistently across occurrences;
/// constructed types unify by definition equality and pointwise argument
/// unification; arrays by rank parity and element unification; everything
/// else by equality.
pub fn unify(pattern: &TypeIdent, target: &TypeIdent, subst: &mut Substitution) -> bool {
    match (pattern, target) {
        (TypeIdent::TypeParam { index, .. }, ground) => match subst.get(index) {
            Some(bound) => bound == ground,
            None => {
                subst.insert(*index, ground.clone());
                true
            }
        },
        (TypeIdent::SzArray(a), TypeIdent::SzArray(b)) => unify(a, b, subst),
        (
            TypeIdent::Array { rank: ra, elem: ea },
            TypeIdent::Array { rank: rb, elem: eb },
        ) => ra == rb && unify(ea, eb, subst),
        (
            TypeIdent::Constructed { def: da, args: aa },
            TypeIdent::Constructed { def: db, args: ab },
        ) => {
            unify(da, db, subst)
                && aa.len() == ab.len()
                && aa.iter().zip(ab).all(|(a, b)| unify(a, b, subst))
        }
        (a, b) => a == b,
    }
}

/// A generic formatter template: a pattern identity with free variables and
/// a factory invoked once the variables have a unique ground substitution.
pub struct FormatterTemplate {
    /// Pattern to unify against, with `TypeParam` nodes as variables.
    pub pattern: TypeIdent,
    /// Factory producing the formatter for a solved substitution. May
    /// decline, letting the chain continue.
    pub make:
        Arc<dyn Fn(&Substitution, &Tether) -> Option<Arc<dyn Formatter>> + Send + Sync>,
}

pub(crate) struct NominatedResolver;

impl Resolver for NominatedResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        ty.nominated.clone()
    }
}

pub(crate) struct TemplateResolver {
    pub templates: Vec<FormatterTemplate>,
}

impl Resolver for TemplateResolver {
    fn resolve(&self, kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        self.templates.iter().find_map(|template| {
            let mut subst = Substitution::new();
            if unify(&template.pattern, &ty.ident, &mut subst) {
                (template.make)(&subst, kernel)
            } else {
                None
            }
        })
    }
}

pub(crate) struct SequenceResolver;

impl Resolver for SequenceResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        (ty.kind == TypeKind::Sequence).then(|| ty.base.clone())
    }
}

pub(crate) struct MapResolver;

impl Resolver for MapResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        (ty.kind == TypeKind::Map).then(|| ty.base.clone())
    }
}

pub(crate) struct BlitResolver;

impl Resolver for BlitResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        if ty.kind == TypeKind::Aggregate && ty.blittable {
            ty.blit.clone()
        } else {
            None
        }
    }
}

pub(crate) struct EnumResolver;

impl Resolver for EnumResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        (ty.kind == TypeKind::Enum).then(|| ty.base.clone())
    }
}

pub(crate) struct PrimitiveResolver;

impl Resolver for PrimitiveResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        (ty.kind == TypeKind::Primitive).then(|| ty.base.clone())
    }
}

/// Last resort: the member-by-member formatter of a user aggregate.
pub(crate) struct ByMemberResolver;

impl Resolver for ByMemberResolver {
    fn resolve(&self, _kernel: &Tether, ty: &RuntimeType) -> Option<Arc<dyn Formatter>> {
        (ty.kind == TypeKind::Aggregate).then(|| ty.base.clone())
    }
}

/// The built-in chain, in its fixed order.
pub(crate) fn builtin_chain(templates: Vec<FormatterTemplate>) -> Vec<Arc<dyn Resolver>> {
    vec![
        Arc::new(NominatedResolver),
        Arc::new(TemplateResolver { templates }),
        Arc::new(SequenceResolver),
        Arc::new(MapResolver),
        Arc::new(BlitResolver),
        Arc::new(EnumResolver),
        Arc::new(PrimitiveResolver),
        Arc::new(ByMemberResolver),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{
        builtin,
        PackageIdent,
        Version,
    };

    fn var(index: u8) -> TypeIdent {
        TypeIdent::TypeParam {
            index,
            parent: Box::new(TypeIdent::named(
                "template",
                PackageIdent::named("template", Version::default()),
            )),
        }
    }

    #[test]
    fn variables_bind_once_and_stay_consistent() {
        // Pattern: Map<T0, T0> against Map<u32, u32> and Map<u32, u64>.
        let pattern = TypeIdent::constructed(
            TypeIdent::Builtin(builtin::MAP),
            vec![var(0), var(0)],
        );
        let same = TypeIdent::constructed(
            TypeIdent::Builtin(builtin::MAP),
            vec![
                TypeIdent::Builtin(builtin::U32),
                TypeIdent::Builtin(builtin::U32),
            ],
        );
        let mixed = TypeIdent::constructed(
            TypeIdent::Builtin(builtin::MAP),
            vec![
                TypeIdent::Builtin(builtin::U32),
                TypeIdent::Builtin(builtin::U64),
            ],
        );

        let mut subst = Substitution::new();
        assert!(unify(&pattern, &same, &mut subst));
        assert_eq!(subst.get(&0), Some(&TypeIdent::Builtin(builtin::U32)));

        let mut subst = Substitution::new();
        assert!(!unify(&pattern, &mixed, &mut subst));
    }

    #[test]
    fn arrays_unify_by_rank() {
        let pattern = TypeIdent::Array {
            rank: 2,
            elem: Box::new(var(0)),
        };
        let two = TypeIdent::Array {
            rank: 2,
            elem: Box::new(TypeIdent::Builtin(builtin::F64)),
        };
        let three = TypeIdent::Array {
            rank: 3,
            elem: Box::new(TypeIdent::Builtin(builtin::F64)),
        };

        let mut subst = Substitution::new();
        assert!(unify(&pattern, &two, &mut subst));
        let mut subst = Substitution::new();
        assert!(!unify(&pattern, &three, &mut subst));
    }

    #[test]
    fn ground_mismatches_decline() {
        let mut subst = Substitution::new();
        assert!(!unify(
            &TypeIdent::Builtin(builtin::U8),
            &TypeIdent::Builtin(builtin::U16),
            &mut subst
        ));
        assert!(unify(
            &TypeIdent::sz_array(var(3)),
            &TypeIdent::sz_array(TypeIdent::Builtin(builtin::STRING)),
            &mut subst
        ));
        assert_eq!(subst.len(), 1);
    }
}
