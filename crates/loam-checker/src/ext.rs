//! The extension hook protocol.
//!
//! External policy plugs into checking through `CheckerExtension`, a
//! trait with one default no-op method per checkpoint. The dispatcher
//! holds an ordered list of boxed handlers. Boolean checkpoints run
//! every handler and OR their "handled" answers (handlers are expected
//! to be idempotent and may each contribute side effects); candidate
//! checkpoints let each handler narrow the list and stop once it reaches
//! size one. A panicking handler is isolated: the fault becomes a
//! diagnostic and the remaining handlers still run.

use crate::context::CheckerContext;
use loam_common::{Atom, Diagnostic, DiagnosticKind, SourcePos, Span};
use loam_hir::{ExprId, StmtId};
use loam_solver::{MethodInfo, TypeEnv, TypeId};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What the dispatcher hands each checkpoint: the type environment and
/// the mutable per-unit checking state, so handlers can attach
/// synthesized types or record their own diagnostics.
pub struct HookCx<'e, 'c> {
    pub env: TypeEnv<'e>,
    pub ctx: &'c mut CheckerContext,
}

/// One method per checkpoint; every method defaults to "not handled".
#[allow(unused_variables)]
pub trait CheckerExtension {
    fn setup(&mut self) {}
    fn finish(&mut self) {}

    fn before_visit_class(&mut self, cx: &mut HookCx<'_, '_>, class: loam_solver::ClassId) -> bool {
        false
    }
    fn after_visit_class(&mut self, cx: &mut HookCx<'_, '_>, class: loam_solver::ClassId) {}

    fn before_visit_method(&mut self, cx: &mut HookCx<'_, '_>, method: &MethodInfo) -> bool {
        false
    }
    fn after_visit_method(&mut self, cx: &mut HookCx<'_, '_>, method: &MethodInfo) {}

    fn before_method_call(&mut self, cx: &mut HookCx<'_, '_>, call: ExprId) -> bool {
        false
    }
    fn after_method_call(&mut self, cx: &mut HookCx<'_, '_>, call: ExprId) {}

    /// Observation point: a call was resolved to `method`.
    fn on_method_selection(&mut self, cx: &mut HookCx<'_, '_>, expr: ExprId, method: &MethodInfo) {}

    /// No candidate matched. Returned candidates (possibly synthesized)
    /// replace the empty resolution result.
    fn handle_missing_method(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        receiver: TypeId,
        name: Atom,
        arg_types: &[TypeId],
        call: ExprId,
    ) -> Vec<MethodInfo> {
        Vec::new()
    }

    /// Several candidates tied. The returned list replaces the input.
    fn handle_ambiguous_methods(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        candidates: Vec<MethodInfo>,
        origin: ExprId,
    ) -> Vec<MethodInfo> {
        candidates
    }

    fn handle_unresolved_variable(&mut self, cx: &mut HookCx<'_, '_>, var: ExprId) -> bool {
        false
    }
    fn handle_unresolved_property(&mut self, cx: &mut HookCx<'_, '_>, prop: ExprId) -> bool {
        false
    }
    fn handle_unresolved_attribute(&mut self, cx: &mut HookCx<'_, '_>, attr: ExprId) -> bool {
        false
    }

    fn handle_incompatible_assignment(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        lhs: TypeId,
        rhs: TypeId,
        expr: ExprId,
    ) -> bool {
        false
    }

    fn handle_incompatible_return_type(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        stmt: StmtId,
        inferred: TypeId,
    ) -> bool {
        false
    }
}

/// Ordered chain of extension handlers.
#[derive(Default)]
pub struct ExtensionDispatcher {
    handlers: Vec<Box<dyn CheckerExtension>>,
}

impl ExtensionDispatcher {
    pub fn new(handlers: Vec<Box<dyn CheckerExtension>>) -> Self {
        Self { handlers }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn push(&mut self, handler: Box<dyn CheckerExtension>) {
        self.handlers.push(handler);
    }

    pub fn setup(&mut self) {
        for handler in &mut self.handlers {
            handler.setup();
        }
    }

    pub fn finish(&mut self) {
        for handler in &mut self.handlers {
            handler.finish();
        }
    }

    /// Run a boolean checkpoint across the whole chain. Every handler
    /// runs even after one reports handled.
    fn each_bool(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        mut f: impl FnMut(&mut Box<dyn CheckerExtension>, &mut HookCx<'_, '_>) -> bool,
    ) -> bool {
        let mut handled = false;
        for handler in &mut self.handlers {
            match catch_unwind(AssertUnwindSafe(|| f(handler, cx))) {
                Ok(result) => handled |= result,
                Err(_) => record_fault(cx, pos),
            }
        }
        handled
    }

    fn each_unit(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        mut f: impl FnMut(&mut Box<dyn CheckerExtension>, &mut HookCx<'_, '_>),
    ) {
        for handler in &mut self.handlers {
            if catch_unwind(AssertUnwindSafe(|| f(handler, cx))).is_err() {
                record_fault(cx, pos);
            }
        }
    }

    pub fn before_visit_class(&mut self, cx: &mut HookCx<'_, '_>, class: loam_solver::ClassId) -> bool {
        self.each_bool(cx, SourcePos::DUMMY, |h, cx| h.before_visit_class(cx, class))
    }

    pub fn after_visit_class(&mut self, cx: &mut HookCx<'_, '_>, class: loam_solver::ClassId) {
        self.each_unit(cx, SourcePos::DUMMY, |h, cx| h.after_visit_class(cx, class));
    }

    pub fn before_visit_method(&mut self, cx: &mut HookCx<'_, '_>, method: &MethodInfo) -> bool {
        self.each_bool(cx, SourcePos::DUMMY, |h, cx| h.before_visit_method(cx, method))
    }

    pub fn after_visit_method(&mut self, cx: &mut HookCx<'_, '_>, method: &MethodInfo) {
        self.each_unit(cx, SourcePos::DUMMY, |h, cx| h.after_visit_method(cx, method));
    }

    pub fn before_method_call(&mut self, cx: &mut HookCx<'_, '_>, pos: SourcePos, call: ExprId) -> bool {
        self.each_bool(cx, pos, |h, cx| h.before_method_call(cx, call))
    }

    pub fn after_method_call(&mut self, cx: &mut HookCx<'_, '_>, pos: SourcePos, call: ExprId) {
        self.each_unit(cx, pos, |h, cx| h.after_method_call(cx, call));
    }

    pub fn on_method_selection(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        expr: ExprId,
        method: &MethodInfo,
    ) {
        self.each_unit(cx, pos, |h, cx| h.on_method_selection(cx, expr, method));
    }

    /// Collect synthesized candidates from every handler.
    pub fn handle_missing_method(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        receiver: TypeId,
        name: Atom,
        arg_types: &[TypeId],
        call: ExprId,
    ) -> Vec<MethodInfo> {
        let mut collected = Vec::new();
        for handler in &mut self.handlers {
            match catch_unwind(AssertUnwindSafe(|| {
                handler.handle_missing_method(cx, receiver, name, arg_types, call)
            })) {
                Ok(mut found) => collected.append(&mut found),
                Err(_) => record_fault(cx, pos),
            }
        }
        collected
    }

    /// Let handlers narrow an ambiguous candidate set; stops early once
    /// a single candidate remains.
    pub fn handle_ambiguous_methods(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        mut candidates: Vec<MethodInfo>,
        origin: ExprId,
    ) -> Vec<MethodInfo> {
        for handler in &mut self.handlers {
            if candidates.len() <= 1 {
                break;
            }
            let input = candidates.clone();
            match catch_unwind(AssertUnwindSafe(|| {
                handler.handle_ambiguous_methods(cx, input, origin)
            })) {
                Ok(narrowed) => candidates = narrowed,
                Err(_) => record_fault(cx, pos),
            }
        }
        candidates
    }

    pub fn handle_unresolved_variable(&mut self, cx: &mut HookCx<'_, '_>, pos: SourcePos, var: ExprId) -> bool {
        self.each_bool(cx, pos, |h, cx| h.handle_unresolved_variable(cx, var))
    }

    pub fn handle_unresolved_property(&mut self, cx: &mut HookCx<'_, '_>, pos: SourcePos, prop: ExprId) -> bool {
        self.each_bool(cx, pos, |h, cx| h.handle_unresolved_property(cx, prop))
    }

    pub fn handle_unresolved_attribute(&mut self, cx: &mut HookCx<'_, '_>, pos: SourcePos, attr: ExprId) -> bool {
        self.each_bool(cx, pos, |h, cx| h.handle_unresolved_attribute(cx, attr))
    }

    pub fn handle_incompatible_assignment(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        lhs: TypeId,
        rhs: TypeId,
        expr: ExprId,
    ) -> bool {
        self.each_bool(cx, pos, |h, cx| {
            h.handle_incompatible_assignment(cx, lhs, rhs, expr)
        })
    }

    pub fn handle_incompatible_return_type(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        pos: SourcePos,
        stmt: StmtId,
        inferred: TypeId,
    ) -> bool {
        self.each_bool(cx, pos, |h, cx| {
            h.handle_incompatible_return_type(cx, stmt, inferred)
        })
    }
}

fn record_fault(cx: &mut HookCx<'_, '_>, pos: SourcePos) {
    cx.ctx.sink.push(Diagnostic::new(
        DiagnosticKind::ExtensionFault,
        Span::DUMMY,
        pos,
        "type-checking extension raised an error and was skipped",
    ));
}
