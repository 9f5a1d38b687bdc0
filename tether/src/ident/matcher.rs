//! Symbolic parameter matching.
//!
//! An open generic method cannot carry its parameter types directly: they
//! may refer back to the method's own generic parameters, which do not exist
//! until the method is resolved. A matcher tree describes each parameter
//! symbolically; candidates are methods whose declared parameter shapes
//! satisfy every tree.

use crate::ident::TypeIdent;

/// Symbolic description of one parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// Single-dimensional array of a matched element.
    SzArray(Box<Matcher>),
    /// Multi-dimensional array of a matched element.
    Array {
        /// Number of dimensions, 1..=32.
        rank: u8,
        /// Element matcher.
        elem: Box<Matcher>,
    },
    /// Formal parameter of a generic *type*, anchored to that type.
    TypeParam {
        /// Position in the parent's formal parameter list.
        index: u8,
        /// The generic definition owning the parameter.
        parent: Box<TypeIdent>,
    },
    /// Formal parameter of the candidate method itself. This is the
    /// self-referential case that rules out direct type encoding.
    MethodParam(u8),
    /// Instantiation of a generic definition with matched arguments.
    Constructed {
        /// The open definition.
        def: Box<TypeIdent>,
        /// Argument matchers.
        args: Vec<Matcher>,
    },
    /// A ground type, matched by identity equality.
    Exact(Box<TypeIdent>),
}

impl Matcher {
    /// Shorthand for a ground-type matcher.
    pub fn exact(ident: TypeIdent) -> Self {
        Self::Exact(Box::new(ident))
    }

    /// Whether a candidate parameter shape satisfies this matcher.
    ///
    /// Shapes are compared structurally; `MethodParam` positions must agree,
    /// which is what resolves the self-reference symbolically.
    pub fn satisfied_by(&self, candidate: &Matcher) -> bool {
        match (self, candidate) {
            (Self::SzArray(a), Self::SzArray(b)) => a.satisfied_by(b),
            (
                Self::Array { rank: ra, elem: ea },
                Self::Array { rank: rb, elem: eb },
            ) => ra == rb && ea.satisfied_by(eb),
            (
                Self::TypeParam {
                    index: ia,
                    parent: pa,
                },
                Self::TypeParam {
                    index: ib,
                    parent: pb,
                },
            ) => ia == ib && pa == pb,
            (Self::MethodParam(a), Self::MethodParam(b)) => a == b,
            (
                Self::Constructed { def: da, args: aa },
                Self::Constructed { def: db, args: ab },
            ) => {
                da == db
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(a, b)| a.satisfied_by(b))
            }
            (Self::Exact(a), Self::Exact(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::builtin;

    #[test]
    fn method_params_match_by_position() {
        let a = Matcher::MethodParam(0);
        assert!(a.satisfied_by(&Matcher::MethodParam(0)));
        assert!(!a.satisfied_by(&Matcher::MethodParam(1)));
        assert!(!a.satisfied_by(&Matcher::exact(TypeIdent::Builtin(builtin::U8))));
    }

    #[test]
    fn structure_must_agree() {
        let nested = Matcher::SzArray(Box::new(Matcher::MethodParam(0)));
        assert!(nested.satisfied_by(&Matcher::SzArray(Box::new(Matcher::MethodParam(0)))));
        assert!(!nested.satisfied_by(&Matcher::MethodParam(0)));

        let constructed = Matcher::Constructed {
            def: Box::new(TypeIdent::Builtin(builtin::MAP)),
            args: vec![
                Matcher::exact(TypeIdent::Builtin(builtin::STRING)),
                Matcher::MethodParam(1),
            ],
        };
        assert!(constructed.satisfied_by(&constructed.clone()));
        let wrong_arg = Matcher::Constructed {
            def: Box::new(TypeIdent::Builtin(builtin::MAP)),
            args: vec![
                Matcher::exact(TypeIdent::Builtin(builtin::STRING)),
                Matcher::MethodParam(0),
            ],
        };
        assert!(!constructed.satisfied_by(&wrong_arg));
    }
}
