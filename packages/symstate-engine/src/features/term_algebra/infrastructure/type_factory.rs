//! Type factory
//!
//! Interns `Type` nodes and answers layout questions (sizes in memory
//! elements, record field offsets) used by GEP encoding and allocation.

use super::interner::Interner;
use crate::features::term_algebra::domain::{Signedness, Type, TypeId};
use rustc_hash::FxHashMap;

/// Width of the default integer type
pub const DEFAULT_INTEGER_BITS: u32 = 32;

/// Width of pointers and of the synthesized integer terms (bounds, signs)
pub const POINTER_BITS: u32 = 64;

#[derive(Debug, Clone)]
pub struct TypeFactory {
    arena: Interner<Type>,
    records: FxHashMap<String, Vec<TypeId>>,
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            arena: Interner::new(),
            records: FxHashMap::default(),
        };
        factory.intern(Type::Bool);
        factory.intern(Type::Unknown);
        factory.intern(Type::Float);
        factory
    }

    fn intern(&mut self, ty: Type) -> TypeId {
        TypeId(self.arena.intern(ty))
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.arena.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn bool(&mut self) -> TypeId {
        self.intern(Type::Bool)
    }

    pub fn float(&mut self) -> TypeId {
        self.intern(Type::Float)
    }

    pub fn unknown(&mut self) -> TypeId {
        self.intern(Type::Unknown)
    }

    pub fn integer(&mut self, bitsize: u32, signedness: Signedness) -> TypeId {
        self.intern(Type::Integer {
            bitsize,
            signedness,
        })
    }

    pub fn default_integer(&mut self) -> TypeId {
        self.integer(DEFAULT_INTEGER_BITS, Signedness::Unknown)
    }

    /// Integer wide enough to hold a pointer-sized quantity
    pub fn size_integer(&mut self) -> TypeId {
        self.integer(POINTER_BITS, Signedness::Unknown)
    }

    pub fn pointer(&mut self, pointed: TypeId, memspace: u32) -> TypeId {
        self.intern(Type::Pointer { pointed, memspace })
    }

    pub fn pointer_to(&mut self, pointed: TypeId) -> TypeId {
        self.pointer(pointed, 0)
    }

    pub fn array(&mut self, element: TypeId, size: Option<u64>) -> TypeId {
        self.intern(Type::Array { element, size })
    }

    pub fn record(&mut self, name: impl Into<String>) -> TypeId {
        self.intern(Type::Record { name: name.into() })
    }

    /// Register (or replace) the field list of a named record
    pub fn define_record(&mut self, name: impl Into<String>, fields: Vec<TypeId>) -> TypeId {
        let name = name.into();
        self.records.insert(name.clone(), fields);
        self.record(name)
    }

    pub fn record_body(&self, name: &str) -> Option<&[TypeId]> {
        self.records.get(name).map(|v| v.as_slice())
    }

    pub fn function(&mut self, ret: TypeId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Function { ret, args })
    }

    pub fn type_error(&mut self, message: impl Into<String>) -> TypeId {
        self.intern(Type::TypeError {
            message: message.into(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_error(&self, id: TypeId) -> bool {
        self.get(id).is_error()
    }

    pub fn pointed(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Pointer { pointed, .. } => Some(*pointed),
            _ => None,
        }
    }

    /// Bit width of the SMT encoding of a scalar type
    pub fn bitsize(&self, id: TypeId) -> Option<u32> {
        match self.get(id) {
            Type::Bool => Some(1),
            Type::Integer { bitsize, .. } => Some(*bitsize),
            Type::Pointer { .. } | Type::Float => Some(POINTER_BITS),
            _ => None,
        }
    }

    /// Join of two operand types
    ///
    /// Unknown is neutral, integers widen, a pointer absorbs an integer
    /// (pointer arithmetic); anything else is a type error.
    pub fn merge(&mut self, a: TypeId, b: TypeId) -> TypeId {
        if a == b {
            return a;
        }
        match (self.get(a).clone(), self.get(b).clone()) {
            (Type::TypeError { .. }, _) => a,
            (_, Type::TypeError { .. }) => b,
            (Type::Unknown, _) => b,
            (_, Type::Unknown) => a,
            (
                Type::Integer {
                    bitsize: ba,
                    signedness: sa,
                },
                Type::Integer {
                    bitsize: bb,
                    signedness: sb,
                },
            ) => {
                let sign = if sa == sb { sa } else { Signedness::Unknown };
                self.integer(ba.max(bb), sign)
            }
            (Type::Pointer { .. }, Type::Integer { .. }) => a,
            (Type::Integer { .. }, Type::Pointer { .. }) => b,
            (Type::Bool, Type::Integer { .. }) => b,
            (Type::Integer { .. }, Type::Bool) => a,
            (ta, tb) => self.type_error(format!(
                "cannot merge types {} and {}",
                self.display_type(&ta),
                self.display_type(&tb)
            )),
        }
    }

    /// Element type reached by indexing an aggregate with `index`
    pub fn aggregate_element(&mut self, aggregate: TypeId, index: Option<i64>) -> TypeId {
        match self.get(aggregate).clone() {
            Type::Array { element, .. } => element,
            Type::Record { name } => {
                let field = index
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| self.record_body(&name).and_then(|b| b.get(i).copied()));
                match field {
                    Some(f) => f,
                    None => self.type_error(format!(
                        "no field {:?} in record {}",
                        index, name
                    )),
                }
            }
            Type::Unknown => aggregate,
            other => self.type_error(format!(
                "indexing into non-aggregate type {}",
                self.display_type(&other)
            )),
        }
    }

    /// Size of a type in memory elements
    pub fn size_in_elems(&self, id: TypeId) -> u64 {
        match self.get(id) {
            Type::Array { element, size } => size.unwrap_or(1).max(1) * self.size_in_elems(*element),
            Type::Record { name } => match self.record_body(name) {
                Some(fields) if !fields.is_empty() => {
                    fields.iter().map(|f| self.size_in_elems(*f)).sum()
                }
                _ => 1,
            },
            _ => 1,
        }
    }

    /// Offset of field `idx` inside a record, in memory elements
    pub fn struct_offset_in_elems(&self, id: TypeId, idx: usize) -> Option<u64> {
        match self.get(id) {
            Type::Record { name } => {
                let body = self.record_body(name)?;
                if idx >= body.len() {
                    return None;
                }
                Some(body[..idx].iter().map(|f| self.size_in_elems(*f)).sum())
            }
            _ => None,
        }
    }

    pub fn display(&self, id: TypeId) -> String {
        self.display_type(self.get(id))
    }

    fn display_type(&self, ty: &Type) -> String {
        match ty {
            Type::Bool => "bool".to_string(),
            Type::Integer {
                bitsize,
                signedness,
            } => match signedness {
                Signedness::Unsigned => format!("u{}", bitsize),
                Signedness::Signed => format!("i{}", bitsize),
                Signedness::Unknown => format!("int{}", bitsize),
            },
            Type::Float => "float".to_string(),
            Type::Unknown => "?".to_string(),
            Type::Pointer { pointed, memspace } => {
                if *memspace == 0 {
                    format!("{}*", self.display(*pointed))
                } else {
                    format!("{}*@{}", self.display(*pointed), memspace)
                }
            }
            Type::Array { element, size } => match size {
                Some(n) => format!("{}[{}]", self.display(*element), n),
                None => format!("{}[]", self.display(*element)),
            },
            Type::Record { name } => format!("struct {}", name),
            Type::Function { ret, args } => format!(
                "{}({})",
                self.display(*ret),
                args.iter()
                    .map(|a| self.display(*a))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Type::TypeError { message } => format!("<type error: {}>", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_are_interned() {
        let mut tf = TypeFactory::new();
        let a = tf.integer(32, Signedness::Signed);
        let b = tf.integer(32, Signedness::Signed);
        assert_eq!(a, b);
        let p1 = tf.pointer_to(a);
        let p2 = tf.pointer_to(b);
        assert_eq!(p1, p2);
        assert_eq!(tf.pointed(p1), Some(a));
    }

    #[test]
    fn test_merge_rules() {
        let mut tf = TypeFactory::new();
        let i8t = tf.integer(8, Signedness::Signed);
        let i32t = tf.integer(32, Signedness::Signed);
        let unknown = tf.unknown();
        let ptr = tf.pointer_to(i32t);
        let float = tf.float();

        assert_eq!(tf.merge(i8t, i32t), i32t);
        assert_eq!(tf.merge(unknown, i8t), i8t);
        assert_eq!(tf.merge(ptr, i32t), ptr);
        let err = tf.merge(ptr, float);
        assert!(tf.is_error(err));
        // errors propagate
        assert_eq!(tf.merge(err, i32t), err);
    }

    #[test]
    fn test_layout() {
        let mut tf = TypeFactory::new();
        let int = tf.default_integer();
        let arr = tf.array(int, Some(4));
        let rec = tf.define_record("pair", vec![arr, int]);

        assert_eq!(tf.size_in_elems(int), 1);
        assert_eq!(tf.size_in_elems(arr), 4);
        assert_eq!(tf.size_in_elems(rec), 5);
        assert_eq!(tf.struct_offset_in_elems(rec, 0), Some(0));
        assert_eq!(tf.struct_offset_in_elems(rec, 1), Some(4));
        assert_eq!(tf.struct_offset_in_elems(rec, 2), None);
        assert_eq!(tf.aggregate_element(rec, Some(1)), int);
        assert_eq!(tf.aggregate_element(arr, Some(3)), int);
        let bad = tf.aggregate_element(int, Some(0));
        assert!(tf.is_error(bad));
    }

    #[test]
    fn test_display() {
        let mut tf = TypeFactory::new();
        let u8t = tf.integer(8, Signedness::Unsigned);
        let p = tf.pointer(u8t, 2);
        assert_eq!(tf.display(p), "u8*@2");
    }
}
