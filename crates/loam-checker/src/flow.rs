//! Control-flow state: temporary (instanceof-narrowed) types, the
//! per-branch assignment tracker, and closure delegation metadata.

use loam_common::Atom;
use loam_solver::TypeId;
use rustc_hash::FxHashMap;

/// Key for a narrowing fact: a variable identity, or a textual key for
/// expressions without stable identity (property chains).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TempKey {
    Var(Atom),
    Text(Atom),
}

/// Stack of scoped narrowing facts. Strictly LIFO: scope boundaries
/// match lexical block boundaries, and the facts of a scope die with it.
#[derive(Default, Debug)]
pub struct TemporaryTypeStack {
    scopes: Vec<FxHashMap<TempKey, Vec<TypeId>>>,
}

impl TemporaryTypeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// Returns `false` when no scope was open — an invariant violation
    /// the caller escalates to a fatal error.
    pub fn pop_scope(&mut self) -> bool {
        self.scopes.pop().is_some()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Record a narrowing fact in the innermost scope.
    pub fn record(&mut self, key: TempKey, ty: TypeId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.entry(key).or_default().push(ty);
        }
    }

    /// The effective narrowed type: the most recently recorded fact in
    /// the innermost scope that has one.
    pub fn lookup(&self, key: TempKey) -> Option<TypeId> {
        for scope in self.scopes.iter().rev() {
            if let Some(types) = scope.get(&key) {
                if let Some(&last) = types.last() {
                    return Some(last);
                }
            }
        }
        None
    }

    /// An assignment to the key invalidates every fact about it, in
    /// every open scope.
    pub fn clear(&mut self, key: TempKey) {
        for scope in &mut self.scopes {
            scope.remove(&key);
        }
    }
}

/// Records, per open branch, the sequence of types assigned to each
/// variable. The driver opens a frame per branch and merges frames via
/// least-upper-bound at the end of the construct.
#[derive(Default, Debug)]
pub struct AssignmentTracker {
    frames: Vec<FxHashMap<Atom, Vec<TypeId>>>,
}

impl AssignmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    pub fn pop_frame(&mut self) -> FxHashMap<Atom, Vec<TypeId>> {
        self.frames.pop().unwrap_or_default()
    }

    pub fn in_branch(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn record(&mut self, var: Atom, ty: TypeId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.entry(var).or_default().push(ty);
        }
    }
}

/// The order in which a closure's two alternate receivers are consulted
/// during member lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DelegationStrategy {
    OwnerFirst,
    DelegateFirst,
    OwnerOnly,
    DelegateOnly,
}

/// Delegation context for one closure body. Nested closures chain their
/// contexts through the checker's stack; a closure queries its own
/// entry, never another closure's.
#[derive(Copy, Clone, Debug)]
pub struct DelegationMetadata {
    pub owner: TypeId,
    pub delegate: TypeId,
    pub strategy: DelegationStrategy,
}

impl DelegationMetadata {
    /// Receivers in consultation order.
    pub fn receivers(&self) -> Vec<(TypeId, &'static str)> {
        match self.strategy {
            DelegationStrategy::OwnerFirst => {
                vec![(self.owner, "owner"), (self.delegate, "delegate")]
            }
            DelegationStrategy::DelegateFirst => {
                vec![(self.delegate, "delegate"), (self.owner, "owner")]
            }
            DelegationStrategy::OwnerOnly => vec![(self.owner, "owner")],
            DelegationStrategy::DelegateOnly => vec![(self.delegate, "delegate")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_are_scope_local() {
        let mut stack = TemporaryTypeStack::new();
        let key = TempKey::Var(Atom(1));
        stack.push_scope();
        stack.record(key, TypeId(5));
        assert_eq!(stack.lookup(key), Some(TypeId(5)));
        assert!(stack.pop_scope());
        assert_eq!(stack.lookup(key), None);
    }

    #[test]
    fn assignment_clears_facts_in_all_scopes() {
        let mut stack = TemporaryTypeStack::new();
        let key = TempKey::Var(Atom(1));
        stack.push_scope();
        stack.record(key, TypeId(5));
        stack.push_scope();
        stack.record(key, TypeId(6));
        stack.clear(key);
        assert_eq!(stack.lookup(key), None);
    }

    #[test]
    fn pop_on_empty_reports_violation() {
        let mut stack = TemporaryTypeStack::new();
        assert!(!stack.pop_scope());
    }
}
