//! The nominal type system.
//!
//! Types live in an arena owned by [`TypeSystem`] and are addressed by
//! [`TypeId`] handles; a signature-keyed map makes registration idempotent,
//! so two types with the same canonical signature are always the same
//! handle. The `none` sentinel is handle 0 and doubles as the lookup
//! failure value.

use std::collections::HashMap;

/// Stable handle into the type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub usize);

/// Handle of the pre-registered `none` sentinel.
pub const NONE_TYPE: TypeId = TypeId(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    None,
    Integral,
    Struct,
    Pointer,
    Function,
}

/// A `(type, name)` pair: function argument or struct member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub ty: TypeId,
    pub name: String,
}

impl Definition {
    pub fn new(ty: TypeId, name: &str) -> Definition {
        Definition {
            ty,
            name: name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    None,
    Integral { signed: bool },
    Struct { members: Vec<Definition> },
    Pointer { target: TypeId },
    Function { args: Vec<Definition>, return_type: TypeId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsType {
    pub signature: String,
    pub tag: TypeTag,
    pub size: usize,
    pub mutable: bool,
    pub is_static: bool,
    pub kind: TypeKind,
}

#[derive(Debug)]
pub struct TypeSystem {
    types: Vec<HsType>,
    by_signature: HashMap<String, TypeId>,
    aliases: HashMap<String, String>,
}

impl TypeSystem {
    pub fn new() -> TypeSystem {
        let mut ts = TypeSystem {
            types: Vec::new(),
            by_signature: HashMap::new(),
            aliases: HashMap::new(),
        };

        ts.add_type(HsType {
            signature: "none".to_owned(),
            tag: TypeTag::None,
            size: 0,
            mutable: false,
            is_static: false,
            kind: TypeKind::None,
        });

        for &(name, size, signed) in &[
            ("u8", 1, false),
            ("u16", 2, false),
            ("u32", 4, false),
            ("i8", 1, true),
            ("i16", 2, true),
            ("i32", 4, true),
        ] {
            ts.add_type(HsType {
                signature: name.to_owned(),
                tag: TypeTag::Integral,
                size,
                mutable: false,
                is_static: false,
                kind: TypeKind::Integral { signed },
            });
        }

        ts.type_def("void", "none");
        ts.type_def("byte", "u8");
        ts.type_def("char", "i8");
        ts.type_def("short", "u16");
        ts.type_def("int", "i32");
        ts.type_def("long", "u32");

        // Built-in string record: { u32 size, char* ptr }.
        let char_ptr = {
            let char_ty = ts.get_type("char");
            ts.pointer_to(char_ty)
        };
        let u32_ty = ts.get_type("u32");

        ts.add_type(HsType {
            signature: "hs_string".to_owned(),
            tag: TypeTag::Struct,
            size: 8,
            mutable: false,
            is_static: false,
            kind: TypeKind::Struct {
                members: vec![
                    Definition::new(u32_ty, "size"),
                    Definition::new(char_ptr, "ptr"),
                ],
            },
        });

        ts
    }

    /// Idempotent registration: an already-known signature returns the
    /// interned handle instead of adding a duplicate record.
    pub fn add_type(&mut self, record: HsType) -> TypeId {
        if let Some(&id) = self.by_signature.get(&record.signature) {
            return id;
        }

        let id = TypeId(self.types.len());

        self.by_signature.insert(record.signature.clone(), id);
        self.types.push(record);

        id
    }

    /// Resolves a signature, consulting the alias table first; unknown
    /// signatures yield the `none` sentinel.
    pub fn get_type(&self, signature: &str) -> TypeId {
        let signature = match self.aliases.get(signature) {
            Some(target) => target.as_str(),
            None => signature,
        };

        self.by_signature
            .get(signature)
            .copied()
            .unwrap_or(NONE_TYPE)
    }

    pub fn type_def(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_owned(), target.to_owned());
    }

    /// True iff resolution yields something other than the `none` sentinel.
    pub fn exists(&self, signature: &str) -> bool {
        self.get_type(signature) != NONE_TYPE
    }

    pub fn get(&self, id: TypeId) -> &HsType {
        &self.types[id.0]
    }

    pub fn signature(&self, id: TypeId) -> &str {
        &self.get(id).signature
    }

    pub fn size_of(&self, id: TypeId) -> usize {
        self.get(id).size
    }

    /// Interns the pointer type for `target` (size is always 4).
    pub fn pointer_to(&mut self, target: TypeId) -> TypeId {
        let signature = format!("{}*", self.signature(target));

        self.add_type(HsType {
            signature,
            tag: TypeTag::Pointer,
            size: 4,
            mutable: false,
            is_static: false,
            kind: TypeKind::Pointer { target },
        })
    }

    /// Interns the function type `(args) -> return_type` (size is always 4;
    /// a function handle is a code pointer).
    pub fn function_of(&mut self, args: &[Definition], return_type: TypeId) -> TypeId {
        let arg_sigs: Vec<&str> = args.iter().map(|a| self.signature(a.ty)).collect();

        let signature = format!(
            "({})->{}",
            arg_sigs.join(","),
            self.signature(return_type)
        );

        self.add_type(HsType {
            signature,
            tag: TypeTag::Function,
            size: 4,
            mutable: false,
            is_static: false,
            kind: TypeKind::Function {
                args: args.to_vec(),
                return_type,
            },
        })
    }

    /// Interns a modified copy of `base`; `mut ` prefixes the payload
    /// signature and `static ` prefixes `mut`.
    pub fn with_modifiers(&mut self, base: TypeId, mutable: bool, is_static: bool) -> TypeId {
        if !mutable && !is_static {
            return base;
        }

        let mut signature = String::new();

        if is_static {
            signature.push_str("static ");
        }

        if mutable {
            signature.push_str("mut ");
        }

        signature.push_str(self.signature(base));

        let mut record = self.get(base).clone();

        record.signature = signature;
        record.mutable = mutable;
        record.is_static = is_static;

        self.add_type(record)
    }

    /// Structural equality: tag, size, `mut`, `static`, then kind-specific
    /// recursion. Aliases play no part; they were resolved at lookup.
    pub fn type_eq(&self, t: TypeId, u: TypeId) -> bool {
        if t == u {
            return true;
        }

        let (a, b) = (self.get(t), self.get(u));

        if a.tag != b.tag
            || a.size != b.size
            || a.mutable != b.mutable
            || a.is_static != b.is_static
        {
            return false;
        }

        match (&a.kind, &b.kind) {
            (TypeKind::None, TypeKind::None) => true,

            (TypeKind::Integral { signed: sa }, TypeKind::Integral { signed: sb }) => sa == sb,

            (TypeKind::Pointer { target: ta }, TypeKind::Pointer { target: tb }) => {
                self.type_eq(*ta, *tb)
            }

            (
                TypeKind::Function {
                    args: aa,
                    return_type: ra,
                },
                TypeKind::Function {
                    args: ab,
                    return_type: rb,
                },
            ) => {
                self.type_eq(*ra, *rb)
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| self.type_eq(x.ty, y.ty))
            }

            (TypeKind::Struct { members: ma }, TypeKind::Struct { members: mb }) => {
                ma.len() == mb.len()
                    && ma.iter().zip(mb).all(|(x, y)| self.type_eq(x.ty, y.ty))
            }

            _ => false,
        }
    }

    pub fn is_none(&self, id: TypeId) -> bool {
        id == NONE_TYPE
    }
}

impl Default for TypeSystem {
    fn default() -> TypeSystem {
        TypeSystem::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_types_and_aliases() {
        let ts = TypeSystem::new();

        assert_eq!(ts.size_of(ts.get_type("u8")), 1);
        assert_eq!(ts.size_of(ts.get_type("u16")), 2);
        assert_eq!(ts.size_of(ts.get_type("i32")), 4);
        assert_eq!(ts.get_type("int"), ts.get_type("i32"));
        assert_eq!(ts.get_type("char"), ts.get_type("i8"));
        assert_eq!(ts.get_type("long"), ts.get_type("u32"));
        assert_eq!(ts.get_type("void"), NONE_TYPE);
        assert_eq!(ts.get_type("no_such_type"), NONE_TYPE);
    }

    #[test]
    fn interning_round_trips_through_signatures() {
        let mut ts = TypeSystem::new();

        let u32_ty = ts.get_type("u32");
        let ptr = ts.pointer_to(u32_ty);
        let ptr_ptr = ts.pointer_to(ptr);

        assert_eq!(ts.signature(ptr_ptr), "u32**");
        assert_eq!(ts.get_type("u32**"), ptr_ptr);

        // Registering the same shape again yields the same handle.
        assert_eq!(ts.pointer_to(ptr), ptr_ptr);
    }

    #[test]
    fn function_signatures() {
        let mut ts = TypeSystem::new();

        let u32_ty = ts.get_type("u32");
        let args = vec![Definition::new(u32_ty, "x"), Definition::new(u32_ty, "y")];
        let fty = ts.function_of(&args, u32_ty);

        assert_eq!(ts.signature(fty), "(u32,u32)->u32");

        let none_fty = ts.function_of(&[], NONE_TYPE);

        assert_eq!(ts.signature(none_fty), "()->none");
    }

    #[test]
    fn modifier_signatures() {
        let mut ts = TypeSystem::new();

        let u32_ty = ts.get_type("u32");
        let m = ts.with_modifiers(u32_ty, true, false);
        let sm = ts.with_modifiers(u32_ty, true, true);

        assert_eq!(ts.signature(m), "mut u32");
        assert_eq!(ts.signature(sm), "static mut u32");
        assert_eq!(ts.with_modifiers(u32_ty, false, false), u32_ty);
    }

    #[test]
    fn equality_is_structural() {
        let mut ts = TypeSystem::new();

        let u32_ty = ts.get_type("u32");
        let i32_ty = ts.get_type("i32");
        let u8_ty = ts.get_type("u8");

        assert!(ts.type_eq(u32_ty, ts.get_type("long")));
        assert!(!ts.type_eq(u32_ty, i32_ty)); // signedness
        assert!(!ts.type_eq(u8_ty, u32_ty)); // size

        let p1 = ts.pointer_to(u32_ty);
        let p2 = ts.pointer_to(i32_ty);

        assert!(!ts.type_eq(p1, p2));

        let m = ts.with_modifiers(u32_ty, true, false);

        assert!(!ts.type_eq(m, u32_ty));
    }

    #[test]
    fn equality_matches_signature_equality() {
        let mut ts = TypeSystem::new();

        let u32_ty = ts.get_type("u32");
        let ids = vec![
            NONE_TYPE,
            u32_ty,
            ts.get_type("i8"),
            ts.pointer_to(u32_ty),
            ts.function_of(&[Definition::new(u32_ty, "x")], u32_ty),
        ];

        for &a in &ids {
            for &b in &ids {
                let eq = ts.type_eq(a, b);
                let sig_eq = ts.signature(a) == ts.signature(b);

                assert_eq!(eq, sig_eq);
            }
        }
    }
}
