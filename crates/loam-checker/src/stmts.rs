//! Statement checking: class and method bodies, lexical scopes, branch
//! tracking and merging, and instanceof narrowing.

use crate::context::{LocalVar, MethodKey};
use crate::flow::TempKey;
use crate::lower::Lowerer;
use crate::Checker;
use loam_common::{Atom, DiagnosticKind, Fatal, FatalResult, SourcePos};
use loam_hir::{ExprKind, Module, StmtId, StmtKind, TypeRef};
use loam_solver::{lub_all, ClassId, ParamInfo, PrimitiveKind, TypeId, TypeInterner};
use rustc_hash::FxHashMap;
use tracing::trace;

/// Cap on body re-checks driven by closure-shared variable widening.
const MAX_BODY_PASSES: usize = 4;

impl Checker {
    pub(crate) fn check_class(
        &mut self,
        module: &Module,
        decl: &loam_hir::ClassDecl,
        class_id: ClassId,
    ) -> FatalResult<()> {
        if self.with_hooks(|h, cx| h.before_visit_class(cx, class_id)) {
            return Ok(());
        }
        self.ctx.enclosing_class.push(class_id);
        self.scope.push(self.store.class(class_id).type_params.clone());

        let field_types: Vec<TypeId> =
            self.store.class(class_id).fields.iter().map(|f| f.ty).collect();
        for (field, &ty) in decl.fields.iter().zip(&field_types) {
            if let Some(init) = field.init {
                let init_ty = self.check_expr(module, init)?;
                self.check_value_fits(module, ty, init, init_ty, decl.pos)?;
            }
        }
        let prop_types: Vec<TypeId> = self
            .store
            .class(class_id)
            .properties
            .iter()
            .map(|p| p.ty)
            .collect();
        for (prop, &ty) in decl.properties.iter().zip(&prop_types) {
            if let Some(init) = prop.init {
                let init_ty = self.check_expr(module, init)?;
                self.check_value_fits(module, ty, init, init_ty, decl.pos)?;
            }
        }

        for index in 0..decl.methods.len() {
            self.check_method(module, class_id, index as u32, false)?;
        }
        for index in 0..decl.ctors.len() {
            self.check_method(module, class_id, index as u32, true)?;
        }

        self.with_hooks(|h, cx| h.after_visit_class(cx, class_id));
        self.scope.pop();
        self.ctx.enclosing_class.pop();
        Ok(())
    }

    pub(crate) fn check_method(
        &mut self,
        module: &Module,
        class: ClassId,
        index: u32,
        is_ctor: bool,
    ) -> FatalResult<()> {
        let key = MethodKey {
            class,
            index,
            is_ctor,
        };
        if !self.ctx.visited_methods.insert(key) {
            return Ok(());
        }
        let info = {
            let class_info = self.store.class(class);
            let list = if is_ctor {
                &class_info.ctors
            } else {
                &class_info.methods
            };
            match list.get(index as usize) {
                Some(info) => info.clone(),
                None => return Ok(()),
            }
        };
        let Some(decl) = self
            .declared
            .as_ref()
            .and_then(|d| d.method_decl(module, key))
        else {
            return Ok(());
        };
        let (body, pos) = match (&decl.body, decl.pos) {
            (Some(body), pos) => (body.clone(), pos),
            (None, _) => return Ok(()),
        };

        if self.with_hooks(|h, cx| h.before_visit_method(cx, &info)) {
            return Ok(());
        }
        self.scope.push(info.type_params.clone());

        let declared_ret = if is_ctor {
            self.types.primitive(PrimitiveKind::Void)
        } else {
            info.ret
        };
        let inferred = self.check_body_stable(module, &info.params, &body, declared_ret, pos)?;
        if !is_ctor && info.ret == TypeInterner::UNKNOWN {
            self.ctx.inferred_returns.insert(key, inferred);
        }

        self.with_hooks(|h, cx| h.after_visit_method(cx, &info));
        self.scope.pop();
        Ok(())
    }

    pub(crate) fn check_script(&mut self, module: &Module) -> FatalResult<()> {
        let body = module.script.clone();
        self.check_body_stable(
            module,
            &[],
            &body,
            TypeInterner::UNKNOWN,
            SourcePos::DUMMY,
        )?;
        Ok(())
    }

    /// Run a body, repeating while closure-shared variable types keep
    /// widening. Diagnostic deduplication makes the re-runs silent.
    fn check_body_stable(
        &mut self,
        module: &Module,
        params: &[ParamInfo],
        body: &[StmtId],
        declared_ret: TypeId,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        let mut inferred = TypeInterner::UNKNOWN;
        for pass in 0..MAX_BODY_PASSES {
            let before = self.ctx.shared_vars.clone();
            inferred = self.check_body(module, params, body, declared_ret, pos)?;
            if self.ctx.shared_vars == before {
                break;
            }
            trace!(pass, "re-checking body after shared-variable widening");
        }
        Ok(inferred)
    }

    /// Check one body in a fresh lexical scope; returns the inferred
    /// return type (LUB of return expressions, void when none).
    pub(crate) fn check_body(
        &mut self,
        module: &Module,
        params: &[ParamInfo],
        body: &[StmtId],
        declared_ret: TypeId,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        self.ctx.push_scope();
        for param in params {
            self.ctx.declare_local(
                param.name,
                LocalVar {
                    declared: param.ty,
                    current: param.ty,
                },
            );
        }
        self.ctx.return_frames.push(Vec::new());
        self.ctx.declared_returns.push(declared_ret);
        self.ctx.temp_types.push_scope();

        let result = self.check_block(module, body);

        if !self.ctx.temp_types.pop_scope() {
            return Err(Fatal::at("narrowing scope stack underflow", pos));
        }
        self.ctx.declared_returns.pop();
        let returns = self.ctx.return_frames.pop().unwrap_or_default();
        self.ctx.pop_scope();
        result?;

        if returns.is_empty() {
            return Ok(self.types.primitive(PrimitiveKind::Void));
        }
        let env = self.env();
        Ok(lub_all(&env, returns))
    }

    pub(crate) fn check_block(&mut self, module: &Module, stmts: &[StmtId]) -> FatalResult<()> {
        for &stmt in stmts {
            self.check_stmt(module, stmt)?;
        }
        Ok(())
    }

    pub(crate) fn check_stmt(&mut self, module: &Module, id: StmtId) -> FatalResult<()> {
        let stmt = module.arena.stmt(id).clone();
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.check_expr(module, *expr)?;
            }
            StmtKind::VarDecl {
                name,
                declared,
                init,
            } => {
                self.check_var_decl(module, *name, declared.as_ref(), *init, stmt.pos)?;
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_if(module, *cond, then_block, else_block.as_deref())?;
            }
            StmtKind::While { cond, body } => {
                self.check_expr(module, *cond)?;
                let mut guards = Vec::new();
                self.collect_guards(module, *cond, true, &mut guards);
                self.ctx.tracker.push_frame();
                self.ctx.temp_types.push_scope();
                for (key, ty) in guards {
                    self.ctx.temp_types.record(key, ty);
                }
                let result = self.check_block(module, body);
                if !self.ctx.temp_types.pop_scope() {
                    return Err(Fatal::at("narrowing scope stack underflow", stmt.pos));
                }
                let frame = self.ctx.tracker.pop_frame();
                result?;
                // The loop body may not run at all; the pre-loop type
                // always participates in the merge.
                self.merge_branch_frames(vec![frame], true);
            }
            StmtKind::Switch { subject, cases } => {
                let subject_ty = self.check_expr(module, *subject)?;
                let mut frames = Vec::with_capacity(cases.len());
                let mut has_default = false;
                for case in cases {
                    has_default |= case.values.is_empty();
                    for &value in &case.values {
                        let value_ty = self.check_expr(module, value)?;
                        self.check_value_fits(module, subject_ty, value, value_ty, stmt.pos)?;
                    }
                    self.ctx.tracker.push_frame();
                    let result = self.check_block(module, &case.body);
                    frames.push(self.ctx.tracker.pop_frame());
                    result?;
                }
                self.merge_branch_frames(frames, !has_default);
            }
            StmtKind::Return(value) => {
                let ty = match value {
                    Some(expr) => self.check_expr(module, *expr)?,
                    None => self.types.primitive(PrimitiveKind::Void),
                };
                if let Some(frame) = self.ctx.return_frames.last_mut() {
                    frame.push(ty);
                }
                let declared = self.ctx.declared_returns.last().copied();
                if let Some(declared) = declared {
                    if declared != TypeInterner::UNKNOWN
                        && declared != self.types.primitive(PrimitiveKind::Void)
                    {
                        let verdict = {
                            let env = self.env();
                            crate::assign::assignment_verdict(
                                &env,
                                module,
                                declared,
                                *value,
                                ty,
                                self.ctx.current_class(),
                            )
                        };
                        if !verdict.is_ok() {
                            let handled = self
                                .with_hooks(|h, cx| {
                                    h.handle_incompatible_return_type(cx, stmt.pos, id, ty)
                                });
                            if !handled {
                                let message = {
                                    let env = self.env();
                                    format!(
                                        "cannot return value of type {} from method returning {}",
                                        env.display(ty),
                                        env.display(declared)
                                    )
                                };
                                self.ctx.report(
                                    DiagnosticKind::IncompatibleReturnType,
                                    stmt.span,
                                    stmt.pos,
                                    message,
                                );
                            }
                        }
                    }
                }
            }
            StmtKind::Block(stmts) => {
                self.ctx.push_scope();
                self.ctx.temp_types.push_scope();
                let result = self.check_block(module, stmts);
                if !self.ctx.temp_types.pop_scope() {
                    return Err(Fatal::at("narrowing scope stack underflow", stmt.pos));
                }
                self.ctx.pop_scope();
                result?;
            }
        }
        Ok(())
    }

    fn check_var_decl(
        &mut self,
        module: &Module,
        name: Atom,
        declared: Option<&TypeRef>,
        init: Option<loam_hir::ExprId>,
        pos: SourcePos,
    ) -> FatalResult<()> {
        let declared_ty = declared.map(|tr| self.lower_tr(tr, pos));
        let init_ty = match init {
            Some(expr) => Some((expr, self.check_expr(module, expr)?)),
            None => None,
        };

        let (slot, current) = match (declared_ty, init_ty) {
            (Some(decl_ty), Some((expr, ty))) => {
                self.check_value_fits(module, decl_ty, expr, ty, pos)?;
                // Flow type starts at the initializer when it is the
                // more precise of the two.
                let current = {
                    let env = self.env();
                    if loam_solver::is_assignable_to(&env, ty, decl_ty)
                        && ty != TypeInterner::UNKNOWN
                    {
                        ty
                    } else {
                        decl_ty
                    }
                };
                (decl_ty, current)
            }
            (Some(decl_ty), None) => (decl_ty, decl_ty),
            (None, Some((_, ty))) => (TypeInterner::UNKNOWN, ty),
            (None, None) => (TypeInterner::UNKNOWN, TypeInterner::UNKNOWN),
        };
        self.ctx.declare_local(
            name,
            LocalVar {
                declared: slot,
                current,
            },
        );
        Ok(())
    }

    fn check_if(
        &mut self,
        module: &Module,
        cond: loam_hir::ExprId,
        then_block: &[StmtId],
        else_block: Option<&[StmtId]>,
    ) -> FatalResult<()> {
        let pos = module.arena.expr(cond).pos;
        self.check_expr(module, cond)?;

        let mut then_guards = Vec::new();
        self.collect_guards(module, cond, true, &mut then_guards);
        let mut else_guards = Vec::new();
        self.collect_guards(module, cond, false, &mut else_guards);

        self.ctx.tracker.push_frame();
        self.ctx.temp_types.push_scope();
        for &(key, ty) in &then_guards {
            self.ctx.temp_types.record(key, ty);
        }
        let then_result = self.check_block(module, then_block);
        if !self.ctx.temp_types.pop_scope() {
            return Err(Fatal::at("narrowing scope stack underflow", pos));
        }
        let then_frame = self.ctx.tracker.pop_frame();
        then_result?;

        let mut frames = vec![then_frame];
        let mut exhaustive = false;
        if let Some(else_block) = else_block {
            self.ctx.tracker.push_frame();
            self.ctx.temp_types.push_scope();
            for &(key, ty) in &else_guards {
                self.ctx.temp_types.record(key, ty);
            }
            let else_result = self.check_block(module, else_block);
            if !self.ctx.temp_types.pop_scope() {
                return Err(Fatal::at("narrowing scope stack underflow", pos));
            }
            frames.push(self.ctx.tracker.pop_frame());
            else_result?;
            exhaustive = true;
        }
        self.merge_branch_frames(frames, !exhaustive);

        // `if (!(x instanceof T)) return ...` narrows x to T for the
        // rest of the enclosing block.
        if else_block.is_none() && block_always_exits(module, then_block) {
            for (key, ty) in else_guards {
                self.ctx.temp_types.record(key, ty);
            }
        }
        Ok(())
    }

    /// Merge per-branch assignment frames back into the flow types: each
    /// assigned variable becomes the LUB of its branch-final types, plus
    /// its pre-branch type when some path skips the assignment.
    pub(crate) fn merge_branch_frames(
        &mut self,
        frames: Vec<FxHashMap<Atom, Vec<TypeId>>>,
        include_pre: bool,
    ) {
        let mut merged: FxHashMap<Atom, Vec<TypeId>> = FxHashMap::default();
        let branch_count = frames.len();
        for frame in frames {
            for (name, types) in frame {
                if let Some(&last) = types.last() {
                    merged.entry(name).or_default().push(last);
                }
            }
        }
        for (name, mut types) in merged {
            let assigned_everywhere = types.len() == branch_count;
            if include_pre || !assigned_everywhere {
                if let Some(var) = self.ctx.local(name) {
                    types.push(var.current);
                }
            }
            let ty = {
                let env = self.env();
                lub_all(&env, types)
            };
            if let Some(var) = self.ctx.local_mut(name) {
                var.current = ty;
            }
            // Outer frames see the merged result as one assignment.
            if self.ctx.tracker.in_branch() {
                self.ctx.tracker.record(name, ty);
            }
        }
    }

    /// Instanceof facts implied by `cond` when it evaluates to
    /// `positive`. And-chains contribute in positive position, or-chains
    /// in negative position, and negation flips the sense.
    pub(crate) fn collect_guards(
        &mut self,
        module: &Module,
        cond: loam_hir::ExprId,
        positive: bool,
        out: &mut Vec<(TempKey, TypeId)>,
    ) {
        let expr = module.arena.expr(cond).clone();
        match &expr.kind {
            ExprKind::InstanceOf {
                value,
                target,
                negated,
            } => {
                if positive != *negated {
                    if let Some(key) = self.narrow_key(module, *value) {
                        let ty = self.lower_tr(target, expr.pos);
                        out.push((key, ty));
                    }
                }
            }
            ExprKind::Binary {
                op: loam_hir::BinOp::And,
                lhs,
                rhs,
            } if positive => {
                self.collect_guards(module, *lhs, true, out);
                self.collect_guards(module, *rhs, true, out);
            }
            ExprKind::Binary {
                op: loam_hir::BinOp::Or,
                lhs,
                rhs,
            } if !positive => {
                self.collect_guards(module, *lhs, false, out);
                self.collect_guards(module, *rhs, false, out);
            }
            ExprKind::Unary {
                op: loam_hir::UnOp::Not,
                operand,
            } => {
                self.collect_guards(module, *operand, !positive, out);
            }
            _ => {}
        }
    }

    /// Narrowing key for an expression: variable identity, or a textual
    /// key for one-level property chains.
    pub(crate) fn narrow_key(&self, module: &Module, expr: loam_hir::ExprId) -> Option<TempKey> {
        match &module.arena.expr(expr).kind {
            ExprKind::Var(name) => Some(TempKey::Var(*name)),
            ExprKind::Property { object, name, .. } => {
                let ExprKind::Var(base) = &module.arena.expr(*object).kind else {
                    return None;
                };
                let text = format!(
                    "{}.{}",
                    self.interner.resolve(*base),
                    self.interner.resolve(*name)
                );
                Some(TempKey::Text(self.interner.intern(&text)))
            }
            _ => None,
        }
    }

    pub(crate) fn lower_tr(&mut self, tr: &TypeRef, pos: SourcePos) -> TypeId {
        let lowerer = Lowerer::new(&self.interner, &self.types);
        lowerer.lower_type_ref(&self.store, &self.scope, tr, pos, &mut self.ctx.sink)
    }
}

/// Whether every path through the block exits (ends in a return).
fn block_always_exits(module: &Module, block: &[StmtId]) -> bool {
    let Some(&last) = block.last() else {
        return false;
    };
    match &module.arena.stmt(last).kind {
        StmtKind::Return(_) => true,
        StmtKind::Block(inner) => block_always_exits(module, inner),
        StmtKind::If {
            then_block,
            else_block: Some(else_block),
            ..
        } => block_always_exits(module, then_block) && block_always_exits(module, else_block),
        _ => false,
    }
}
