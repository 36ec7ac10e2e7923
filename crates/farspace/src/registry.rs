//! # Type and Method Registry
//!
//! Assigns stable, compact numeric identities to remotable types and their
//! callable operations so a call can cross the wire without carrying names
//! or signatures.
//!
//! ## Philosophy
//!
//! - **Descriptor tables, not reflection**: a remotable type is declared as a
//!   static [`RemotableSpec`] listing its operations. The matching dispatcher
//!   is written (or generated) per target type.
//! - **Deterministic ids**: operations are totally ordered by the canonical
//!   comparator (name, then arity, then parameter type names) before ids are
//!   assigned, erasing any dependence on declaration order. Two peers built
//!   from the same source and registering types in the same order agree on
//!   every id.
//! - **Transitive closure**: registering a root type registers every
//!   remotable type reachable through its parameters and return types.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;

use dashmap::DashMap;

use farwire::CallPolicy;
use farwire::MethodId;
use farwire::WireValue;
use farwire::NULL_OBJECT;

use crate::remotable::Value;

/// Registry failures. Fatal to the registration call, not to the runtime.
#[derive(Debug, Clone)]
pub enum Error {
    /// The type was registered before; the user controls registration order,
    /// so a second registration is a configuration defect.
    AlreadyRegistered(&'static str),
    /// Two operations of one type compared fully equal under the canonical
    /// comparator.
    DuplicateSignature {
        type_name: &'static str,
        method: &'static str,
    },
    /// Two operations share a name and arity. Dispatch is by name and arity,
    /// so such a pair cannot be told apart at a call site.
    AmbiguousOverload {
        type_name: &'static str,
        method: &'static str,
        arity: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered(name) => {
                write!(f, "type '{}' is already registered", name)
            }
            Self::DuplicateSignature { type_name, method } => {
                write!(f, "type '{}' declares '{}' twice with one signature", type_name, method)
            }
            Self::AmbiguousOverload { type_name, method, arity } => {
                write!(
                    f,
                    "type '{}' declares '{}' twice with {} parameters",
                    type_name, method, arity
                )
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Reference to a parameter or return type.
#[derive(Clone, Copy)]
pub enum TypeRef {
    Unit,
    Bool,
    I32,
    I64,
    F64,
    Str,
    Bytes,
    /// A remotable type; values of this type cross the wire as object ids.
    Remotable(&'static RemotableSpec),
}

impl TypeRef {
    /// The canonical name used by the method comparator.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            TypeRef::Unit => "unit",
            TypeRef::Bool => "bool",
            TypeRef::I32 => "i32",
            TypeRef::I64 => "i64",
            TypeRef::F64 => "f64",
            TypeRef::Str => "str",
            TypeRef::Bytes => "bytes",
            TypeRef::Remotable(spec) => spec.name,
        }
    }

    pub fn as_remotable(&self) -> Option<&'static RemotableSpec> {
        match self {
            TypeRef::Remotable(spec) => Some(spec),
            _ => None,
        }
    }

    /// The canonical zero of this type: false, 0, empty, or null.
    pub fn zero_value(&self) -> Value {
        match self {
            TypeRef::Unit => Value::Unit,
            TypeRef::Bool => Value::Bool(false),
            TypeRef::I32 => Value::I32(0),
            TypeRef::I64 => Value::I64(0),
            TypeRef::F64 => Value::F64(0.0),
            TypeRef::Str => Value::Str(String::new()),
            TypeRef::Bytes => Value::Bytes(Vec::new()),
            TypeRef::Remotable(_) => Value::Object(None),
        }
    }

    /// The wire form of [`TypeRef::zero_value`], used for failure replies.
    pub fn zero_wire(&self) -> WireValue {
        match self {
            TypeRef::Unit => WireValue::Unit,
            TypeRef::Bool => WireValue::Bool(false),
            TypeRef::I32 => WireValue::I32(0),
            TypeRef::I64 => WireValue::I64(0),
            TypeRef::F64 => WireValue::F64(0.0),
            TypeRef::Str => WireValue::Str(String::new()),
            TypeRef::Bytes => WireValue::Bytes(Vec::new()),
            TypeRef::Remotable(_) => WireValue::Object(NULL_OBJECT),
        }
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// One callable operation of a remotable type.
#[derive(Clone, Copy)]
pub struct MethodSpec {
    pub name: &'static str,
    pub params: &'static [TypeRef],
    pub returns: TypeRef,
    pub policy: CallPolicy,
    /// Local-only helper; filtered out during registration.
    pub local: bool,
}

impl MethodSpec {
    pub const fn new(
        name: &'static str,
        params: &'static [TypeRef],
        returns: TypeRef,
    ) -> Self {
        Self {
            name,
            params,
            returns,
            policy: CallPolicy::DEFAULT,
            local: false,
        }
    }

    pub const fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn local(mut self) -> Self {
        self.local = true;
        self
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.params.len())
    }
}

/// A declared capability set with at least one operation.
pub struct RemotableSpec {
    pub name: &'static str,
    pub methods: &'static [MethodSpec],
}

impl RemotableSpec {
    /// True iff this spec declares a non-local operation with the given name
    /// and arity.
    pub fn declares(&self, method: &str, arity: usize) -> bool {
        self.methods
            .iter()
            .any(|m| !m.local && m.name == method && m.params.len() == arity)
    }
}

impl fmt::Debug for RemotableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Specs can be self-referential; print the name only.
        write!(f, "RemotableSpec({})", self.name)
    }
}

/// Identity of a registered remotable type.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type-{}", self.0)
    }
}

/// Canonical record per callable operation.
pub struct CachedMethod {
    pub id: MethodId,
    pub owner: &'static RemotableSpec,
    pub spec: &'static MethodSpec,
    /// Positions of parameters whose declared type is remotable.
    pub local_param_indices: Vec<usize>,
    /// The return spec when the return type is remotable.
    pub remote_return: Option<&'static RemotableSpec>,
}

impl CachedMethod {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn arity(&self) -> usize {
        self.spec.params.len()
    }

    pub fn returns(&self) -> TypeRef {
        self.spec.returns
    }

    pub fn policy(&self) -> CallPolicy {
        self.spec.policy
    }

    pub fn is_remote_return(&self) -> bool {
        self.remote_return.is_some()
    }
}

impl fmt::Debug for CachedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}/{}", self.id, self.owner.name, self.name(), self.arity())
    }
}

/// The canonical comparator: name, then arity, then parameter type names.
pub fn compare_methods(a: &MethodSpec, b: &MethodSpec) -> Ordering {
    a.name
        .cmp(b.name)
        .then_with(|| a.params.len().cmp(&b.params.len()))
        .then_with(|| {
            a.params
                .iter()
                .zip(b.params.iter())
                .map(|(pa, pb)| pa.canonical_name().cmp(pb.canonical_name()))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
}

/// Registry of remotable types and their cached methods.
///
/// Effectively append-only once the runtime serves traffic; DashMap gives
/// safe concurrent reads during registration.
pub struct Registry {
    types: DashMap<&'static str, TypeId>,
    methods: DashMap<MethodId, Arc<CachedMethod>>,
    type_methods: DashMap<&'static str, Vec<Arc<CachedMethod>>>,
    next_type_id: AtomicU32,
    next_method_id: AtomicU32,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
            methods: DashMap::new(),
            type_methods: DashMap::new(),
            next_type_id: AtomicU32::new(0),
            next_method_id: AtomicU32::new(0),
        }
    }

    pub fn is_registered(&self, spec: &RemotableSpec) -> bool {
        self.types.contains_key(spec.name)
    }

    /// Registers a type and, transitively, every remotable type referenced by
    /// its parameters and return types. Registering a type twice is an error.
    pub fn register(&self, spec: &'static RemotableSpec) -> Result<TypeId> {
        if self.is_registered(spec) {
            return Err(Error::AlreadyRegistered(spec.name));
        }
        self.register_unchecked(spec)
    }

    fn register_unchecked(&self, spec: &'static RemotableSpec) -> Result<TypeId> {
        let type_id = TypeId(self.next_type_id.fetch_add(1, AtomicOrdering::AcqRel));
        tracing::debug!(type_name = spec.name, %type_id, "registering remotable");
        // Insert before walking methods so recursive references terminate.
        self.types.insert(spec.name, type_id);

        let mut methods: Vec<&'static MethodSpec> =
            spec.methods.iter().filter(|m| !m.local).collect();
        methods.sort_by(|a, b| compare_methods(a, b));

        for pair in methods.windows(2) {
            if compare_methods(pair[0], pair[1]) == Ordering::Equal {
                return Err(Error::DuplicateSignature {
                    type_name: spec.name,
                    method: pair[0].name,
                });
            }
            if pair[0].name == pair[1].name && pair[0].params.len() == pair[1].params.len() {
                return Err(Error::AmbiguousOverload {
                    type_name: spec.name,
                    method: pair[0].name,
                    arity: pair[0].params.len(),
                });
            }
        }

        let mut cached = Vec::with_capacity(methods.len());
        let mut referenced: Vec<&'static RemotableSpec> = Vec::new();
        for method in methods {
            let id = MethodId(self.next_method_id.fetch_add(1, AtomicOrdering::AcqRel));
            tracing::debug!(%id, type_name = spec.name, method = method.name, "registering remotable method");

            let local_param_indices: Vec<usize> = method
                .params
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.as_remotable().map(|_| i))
                .collect();
            let remote_return = method.returns.as_remotable();

            for param in method.params.iter().filter_map(|p| p.as_remotable()) {
                referenced.push(param);
            }
            if let Some(ret) = remote_return {
                referenced.push(ret);
            }

            let record = Arc::new(CachedMethod {
                id,
                owner: spec,
                spec: method,
                local_param_indices,
                remote_return,
            });
            self.methods.insert(id, record.clone());
            cached.push(record);
        }
        self.type_methods.insert(spec.name, cached);

        // Reach the transitive closure; already-registered types are skipped.
        for reference in referenced {
            if !self.is_registered(reference) {
                self.register_unchecked(reference)?;
            }
        }

        Ok(type_id)
    }

    pub fn method_by_id(&self, id: MethodId) -> Option<Arc<CachedMethod>> {
        self.methods.get(&id).map(|entry| entry.value().clone())
    }

    /// Resolves an operation of a registered type by name and arity.
    pub fn resolve(
        &self,
        type_name: &str,
        method: &str,
        arity: usize,
    ) -> Option<Arc<CachedMethod>> {
        let methods = self.type_methods.get(type_name)?;
        methods
            .iter()
            .find(|m| m.name() == method && m.arity() == arity)
            .cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
