//! The checking driver for the Loam static type-checking engine.
//!
//! `Checker` owns the interners, the class store, and the per-unit
//! mutable state, and walks a `loam_hir::Module` statement by statement.
//! Pure type-level judgments live in `loam-solver`; this crate adds
//! everything that needs driver context: member resolution, overload
//! scoring, closure inference, flow narrowing, and the extension hook
//! protocol.
//!
//! The driver's `impl Checker` blocks are split by concern: expression
//! checking in `expr`, call resolution in `calls`, statements and
//! branch merging in `stmts`.

pub mod assign;
pub mod calls;
pub mod closures;
pub mod collab;
pub mod context;
pub mod expr;
pub mod ext;
pub mod flow;
pub mod lower;
pub mod methods;
pub mod stmts;
pub mod symbols;

pub use assign::AssignVerdict;
pub use collab::{
    ClosureSignatureHintProvider, ConstValue, ConstantEvaluator, ExtensionLoader,
    LiteralConstantEvaluator, NoExtensions, NoHints,
};
pub use context::{CheckerContext, ClosureSignature, LocalVar, MethodKey};
pub use ext::{CheckerExtension, ExtensionDispatcher, HookCx};
pub use flow::{DelegationMetadata, DelegationStrategy, TempKey};
pub use methods::{ResolvedCall, Resolution};
pub use symbols::{Receiver, PropertyLookup};

use crate::lower::{DeclaredModule, Lowerer, TypeParamScope};
use loam_common::{Diagnostic, FatalResult, Interner};
use loam_hir::{ExprId, Module};
use loam_solver::{ClassStore, TypeEnv, TypeId, TypeInterner};
use std::sync::Arc;
use tracing::debug;

/// One type-checking engine instance. Holds the symbol tables across
/// `check` calls so several modules can share a compilation scope.
pub struct Checker {
    pub interner: Arc<Interner>,
    pub types: TypeInterner,
    pub store: ClassStore,
    pub ctx: CheckerContext,
    hooks: ExtensionDispatcher,
    hints: Box<dyn ClosureSignatureHintProvider>,
    consts: Box<dyn ConstantEvaluator>,
    pub(crate) declared: Option<DeclaredModule>,
    pub(crate) scope: TypeParamScope,
}

impl Checker {
    pub fn new(interner: Arc<Interner>) -> Self {
        let types = TypeInterner::new();
        let store = ClassStore::new(&interner, &types);
        Self {
            interner,
            types,
            store,
            ctx: CheckerContext::new(),
            hooks: ExtensionDispatcher::default(),
            hints: Box::new(NoHints),
            consts: Box::new(LiteralConstantEvaluator),
            declared: None,
            scope: TypeParamScope::default(),
        }
    }

    pub fn add_extension(&mut self, handler: Box<dyn CheckerExtension>) {
        self.hooks.push(handler);
    }

    /// Load extension handlers through an `ExtensionLoader`.
    pub fn load_extensions(&mut self, loader: &dyn ExtensionLoader, id: &str) {
        for handler in loader.load(id) {
            self.hooks.push(handler);
        }
    }

    pub fn set_hint_provider(&mut self, hints: Box<dyn ClosureSignatureHintProvider>) {
        self.hints = hints;
    }

    pub fn set_constant_evaluator(&mut self, consts: Box<dyn ConstantEvaluator>) {
        self.consts = consts;
    }

    /// Type-check one module: register its declarations, then walk every
    /// class body and the script statements. Returns the collected
    /// diagnostics; `Err` only for internal invariant violations.
    pub fn check(&mut self, module: &Module) -> FatalResult<Vec<Diagnostic>> {
        let declared = {
            let lowerer = Lowerer::new(&self.interner, &self.types);
            lowerer.declare_module(&mut self.store, module, &mut self.ctx.sink)
        };
        let class_ids = declared.class_ids.clone();
        self.declared = Some(declared);

        self.hooks.setup();
        for (decl, class_id) in module.classes.iter().zip(class_ids) {
            self.check_class(module, decl, class_id)?;
        }
        if !module.script.is_empty() {
            self.check_script(module)?;
        }
        self.hooks.finish();

        debug!(
            diagnostics = self.ctx.sink.diagnostics().len(),
            "module checked"
        );
        Ok(self.ctx.sink.take())
    }

    // Shared plumbing for the impl blocks in the sibling modules.

    pub(crate) fn env(&self) -> TypeEnv<'_> {
        TypeEnv::new(&self.interner, &self.types, &self.store)
    }

    /// Cache an expression type; conflicting entries widen via LUB.
    pub(crate) fn record(&mut self, id: ExprId, ty: TypeId) -> TypeId {
        let env = TypeEnv::new(&self.interner, &self.types, &self.store);
        self.ctx.record_expr_type(&env, id, ty)
    }

    /// Run a closure against the hook dispatcher with a fresh `HookCx`.
    pub(crate) fn with_hooks<R>(
        &mut self,
        f: impl FnOnce(&mut ExtensionDispatcher, &mut HookCx<'_, '_>) -> R,
    ) -> R {
        let env = TypeEnv::new(&self.interner, &self.types, &self.store);
        let mut cx = HookCx {
            env,
            ctx: &mut self.ctx,
        };
        f(&mut self.hooks, &mut cx)
    }

    pub(crate) fn evaluate_constant(
        &self,
        module: &Module,
        expr: ExprId,
    ) -> Result<ConstValue, String> {
        self.consts.evaluate(module, expr)
    }

    pub(crate) fn closure_hints(
        &self,
        method: &loam_solver::MethodInfo,
        arg_types: &[TypeId],
        closure: ExprId,
    ) -> Vec<Vec<TypeId>> {
        self.hints.signatures(method, arg_types, closure)
    }
}
