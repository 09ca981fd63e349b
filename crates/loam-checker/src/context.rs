//! Per-compilation-unit mutable checking state.
//!
//! One `CheckerContext` exists per unit, created and torn down by the
//! driver; nothing here is process-global. It owns the diagnostic sink,
//! the per-node type side tables, the lexical scope stacks, and the
//! flow-narrowing state.

use crate::flow::{AssignmentTracker, DelegationMetadata, TempKey, TemporaryTypeStack};
use loam_common::{Atom, Diagnostic, DiagnosticKind, DiagnosticSink, SourcePos, Span};
use loam_hir::ExprId;
use loam_solver::{lowest_upper_bound, ClassId, TypeEnv, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Identity of a method body: declaring class plus index into the class
/// info's method list (or constructor list, distinguished by flag).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub class: ClassId,
    pub index: u32,
    pub is_ctor: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct LocalVar {
    /// Declared (static) type; Unknown for `def` declarations until the
    /// initializer pins it down.
    pub declared: TypeId,
    /// Flow type after the most recent assignment on this path.
    pub current: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureSignature {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

#[derive(Default)]
pub struct CheckerContext {
    pub sink: DiagnosticSink,

    /// Inferred type per expression node. Once stored, an entry is only
    /// replaced by a widened (LUB) type, never silently downgraded.
    pub expr_types: FxHashMap<ExprId, TypeId>,
    pub closure_sigs: FxHashMap<ExprId, ClosureSignature>,

    /// Lexical scopes, innermost last.
    pub locals: Vec<FxHashMap<Atom, LocalVar>>,
    pub temp_types: TemporaryTypeStack,
    pub tracker: AssignmentTracker,

    pub enclosing_class: Vec<ClassId>,
    pub enclosing_method: Vec<MethodKey>,
    /// Delegation chain; one entry per lexically-entered closure.
    pub delegation: Vec<DelegationMetadata>,

    /// Guards on-demand method checking against mutual recursion.
    pub visited_methods: FxHashSet<MethodKey>,
    /// Return types inferred for `def` methods checked on demand.
    pub inferred_returns: FxHashMap<MethodKey, TypeId>,
    /// Collected return-expression types, one frame per active body.
    pub return_frames: Vec<Vec<TypeId>>,
    /// Declared return type of each active body, parallel to
    /// `return_frames` (unknown for `def`).
    pub declared_returns: Vec<TypeId>,

    /// Types learned for variables shared with closures; drives the
    /// re-check-until-stable pass.
    pub shared_vars: FxHashMap<Atom, TypeId>,
    /// Locals-scope depth at each lexically-entered closure; assignments
    /// below the innermost floor write a shared variable.
    pub closure_floors: Vec<usize>,
    /// Expressions that named a class and act as static receivers.
    pub class_receivers: FxHashSet<ExprId>,
}

impl CheckerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        span: Span,
        pos: SourcePos,
        message: impl Into<String>,
    ) {
        self.sink.push(Diagnostic::new(kind, span, pos, message));
    }

    /// Cache an expression type. A conflicting earlier entry widens via
    /// LUB rather than being overwritten.
    pub fn record_expr_type(&mut self, env: &TypeEnv<'_>, id: ExprId, ty: TypeId) -> TypeId {
        match self.expr_types.get(&id).copied() {
            Some(existing) if existing != ty => {
                let widened = lowest_upper_bound(env, existing, ty);
                self.expr_types.insert(id, widened);
                widened
            }
            _ => {
                self.expr_types.insert(id, ty);
                ty
            }
        }
    }

    pub fn expr_type(&self, id: ExprId) -> Option<TypeId> {
        self.expr_types.get(&id).copied()
    }

    pub fn current_class(&self) -> Option<ClassId> {
        self.enclosing_class.last().copied()
    }

    pub fn push_scope(&mut self) {
        self.locals.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) {
        self.locals.pop();
    }

    pub fn declare_local(&mut self, name: Atom, var: LocalVar) {
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name, var);
        }
    }

    pub fn local(&self, name: Atom) -> Option<LocalVar> {
        self.locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .copied()
    }

    pub fn local_mut(&mut self, name: Atom) -> Option<&mut LocalVar> {
        self.locals
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(&name))
    }

    /// Index of the innermost scope declaring `name`.
    pub fn local_scope_index(&self, name: Atom) -> Option<usize> {
        self.locals.iter().rposition(|scope| scope.contains_key(&name))
    }

    /// Whether an assignment to `name` writes a variable shared with the
    /// innermost enclosing closure.
    pub fn is_shared_with_closure(&self, name: Atom) -> bool {
        match (self.closure_floors.last(), self.local_scope_index(name)) {
            (Some(&floor), Some(idx)) => idx < floor,
            _ => false,
        }
    }

    /// Whether `name` resolves in a scope outside the innermost closure
    /// boundary. Scope indices at or below `boundary` are "outer".
    pub fn is_declared_local(&self, name: Atom) -> bool {
        self.locals.iter().any(|scope| scope.contains_key(&name))
    }

    /// The effective read type of a local: a live narrowing fact wins
    /// over the flow type.
    pub fn effective_local_type(&self, name: Atom) -> Option<TypeId> {
        if let Some(narrowed) = self.temp_types.lookup(TempKey::Var(name)) {
            return Some(narrowed);
        }
        self.local(name).map(|v| v.current)
    }
}
