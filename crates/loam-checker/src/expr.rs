//! Expression checking.
//!
//! Every expression node gets a type recorded in the context's side
//! table. Resolution failures become diagnostics, never aborts; the
//! unknown type keeps checking going downstream of an error.

use crate::assign::{assignment_verdict, AssignVerdict};
use crate::collab::ConstValue;
use crate::flow::TempKey;
use crate::symbols::{find_attribute, find_property, find_settable, implicit_receivers};
use crate::Checker;
use loam_common::{Atom, DiagnosticKind, FatalResult, SourcePos, Span};
use loam_hir::{BinOp, ExprId, ExprKind, Module, UnOp};
use loam_solver::lub::boxed;
use loam_solver::widening::{literal_fits, promote};
use loam_solver::{
    lowest_upper_bound, primitive_kind_of, PrimitiveKind, TypeData, TypeId, TypeInterner,
};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Operator-overload method names consulted when numeric promotion does
/// not apply.
static OPERATOR_METHODS: Lazy<FxHashMap<BinOp, &'static str>> = Lazy::new(|| {
    [
        (BinOp::Add, "plus"),
        (BinOp::Sub, "minus"),
        (BinOp::Mul, "multiply"),
        (BinOp::Div, "div"),
        (BinOp::Rem, "mod"),
    ]
    .into_iter()
    .collect()
});

impl Checker {
    pub(crate) fn check_expr(&mut self, module: &Module, id: ExprId) -> FatalResult<TypeId> {
        let expr = module.arena.expr(id);
        let pos = expr.pos;
        let span = expr.span;
        let ty = match &expr.kind {
            ExprKind::NullLit => TypeInterner::UNKNOWN,
            ExprKind::BoolLit(_) => self.types.primitive(PrimitiveKind::Boolean),
            ExprKind::IntLit(_) => self.types.primitive(PrimitiveKind::Int),
            ExprKind::LongLit(_) => self.types.primitive(PrimitiveKind::Long),
            ExprKind::DoubleLit(_) => self.types.primitive(PrimitiveKind::Double),
            ExprKind::BigDecimalLit(_) => self.store.builtins.big_decimal,
            ExprKind::CharLit(_) => self.types.primitive(PrimitiveKind::Char),
            ExprKind::StringLit(_) => self.store.builtins.string,
            ExprKind::GStringLit { parts } => {
                for &part in parts {
                    self.check_expr(module, part)?;
                }
                self.store.builtins.gstring
            }
            ExprKind::ListLit(elements) => {
                let mut element_types = Vec::with_capacity(elements.len());
                for &element in elements {
                    element_types.push(self.check_expr(module, element)?);
                }
                let component = {
                    let env = self.env();
                    if element_types.is_empty() {
                        TypeInterner::UNKNOWN
                    } else {
                        boxed(&env, loam_solver::lub_all(&env, element_types))
                    }
                };
                self.types
                    .named_with(self.store.builtins.list_class, [component])
            }
            ExprKind::MapLit(entries) => {
                let mut key_types = Vec::with_capacity(entries.len());
                let mut value_types = Vec::with_capacity(entries.len());
                for &(key, value) in entries {
                    key_types.push(self.check_expr(module, key)?);
                    value_types.push(self.check_expr(module, value)?);
                }
                let (key_ty, value_ty) = {
                    let env = self.env();
                    let key_ty = if key_types.is_empty() {
                        TypeInterner::UNKNOWN
                    } else {
                        boxed(&env, loam_solver::lub_all(&env, key_types))
                    };
                    let value_ty = if value_types.is_empty() {
                        TypeInterner::UNKNOWN
                    } else {
                        boxed(&env, loam_solver::lub_all(&env, value_types))
                    };
                    (key_ty, value_ty)
                };
                self.types
                    .named_with(self.store.builtins.map_class, [key_ty, value_ty])
            }
            ExprKind::Var(name) => self.check_var(module, id, *name, span, pos)?,
            ExprKind::ClassRef(tr) => {
                let ty = self.lower_tr(tr, pos);
                self.ctx.class_receivers.insert(id);
                ty
            }
            ExprKind::Property { object, name, .. } => {
                self.check_property(module, id, *object, *name, span, pos)?
            }
            ExprKind::Attribute { object, name } => {
                let receiver = self.check_expr(module, *object)?;
                let lookup = {
                    let env = self.env();
                    find_attribute(&env, receiver, *name, self.ctx.current_class())
                };
                match lookup {
                    Some(field) => field.ty,
                    None => {
                        let handled =
                            self.with_hooks(|h, cx| h.handle_unresolved_attribute(cx, pos, id));
                        if handled {
                            self.ctx.expr_type(id).unwrap_or(TypeInterner::UNKNOWN)
                        } else {
                            let message = {
                                let env = self.env();
                                format!(
                                    "no such attribute {} for type {}",
                                    self.interner.resolve(*name),
                                    env.display(receiver)
                                )
                            };
                            self.ctx
                                .report(DiagnosticKind::UnresolvedSymbol, span, pos, message);
                            TypeInterner::UNKNOWN
                        }
                    }
                }
            }
            ExprKind::Call {
                receiver,
                name,
                args,
                safe,
            } => self.check_call(module, id, *receiver, *name, args, *safe)?,
            ExprKind::New { class, args } => self.check_new(module, id, class, args)?,
            ExprKind::Binary { op, lhs, rhs } => {
                self.check_binary(module, id, *op, *lhs, *rhs, span, pos)?
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(module, *operand)?;
                match op {
                    UnOp::Not => self.types.primitive(PrimitiveKind::Boolean),
                    UnOp::Neg => {
                        let kind = {
                            let env = self.env();
                            primitive_kind_of(&env, operand_ty)
                        };
                        match kind {
                            Some(k) if loam_solver::widening::is_numeric(k) => operand_ty,
                            _ if operand_ty == TypeInterner::UNKNOWN => TypeInterner::UNKNOWN,
                            _ => {
                                let message = {
                                    let env = self.env();
                                    format!("cannot negate value of type {}", env.display(operand_ty))
                                };
                                self.ctx.report(
                                    DiagnosticKind::UnsupportedOperator,
                                    span,
                                    pos,
                                    message,
                                );
                                TypeInterner::UNKNOWN
                            }
                        }
                    }
                }
            }
            ExprKind::Ternary { cond, then, other } => {
                self.check_expr(module, *cond)?;
                // Each arm is a branch for the assignment tracker, same
                // as an if/else.
                self.ctx.tracker.push_frame();
                let then_result = self.check_guarded(module, *cond, true, *then);
                let then_frame = self.ctx.tracker.pop_frame();
                let then_ty = then_result?;
                self.ctx.tracker.push_frame();
                let other_result = self.check_guarded(module, *cond, false, *other);
                let other_frame = self.ctx.tracker.pop_frame();
                let other_ty = other_result?;
                self.merge_branch_frames(vec![then_frame, other_frame], false);
                let env = self.env();
                lowest_upper_bound(&env, then_ty, other_ty)
            }
            ExprKind::Elvis { value, fallback } => {
                let value_ty = self.check_expr(module, *value)?;
                let fallback_ty = self.check_expr(module, *fallback)?;
                let env = self.env();
                lowest_upper_bound(&env, value_ty, fallback_ty)
            }
            ExprKind::Cast { target, value } => {
                self.check_expr(module, *value)?;
                self.lower_tr(target, pos)
            }
            ExprKind::InstanceOf { value, .. } => {
                self.check_expr(module, *value)?;
                self.types.primitive(PrimitiveKind::Boolean)
            }
            ExprKind::Closure { params, body } => {
                let params = params.clone();
                let body = body.clone();
                self.check_closure(module, id, &params, &body, None, pos)?
            }
        };
        Ok(self.record(id, ty))
    }

    /// An expression checked under the narrowing facts `cond` implies in
    /// the given sense.
    fn check_guarded(
        &mut self,
        module: &Module,
        cond: ExprId,
        positive: bool,
        expr: ExprId,
    ) -> FatalResult<TypeId> {
        let mut guards = Vec::new();
        self.collect_guards(module, cond, positive, &mut guards);
        self.ctx.temp_types.push_scope();
        for (key, ty) in guards {
            self.ctx.temp_types.record(key, ty);
        }
        let result = self.check_expr(module, expr);
        if !self.ctx.temp_types.pop_scope() {
            return Err(loam_common::Fatal::new("narrowing scope stack underflow"));
        }
        result
    }

    fn check_var(
        &mut self,
        module: &Module,
        id: ExprId,
        name: Atom,
        span: Span,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        let _ = module;
        if let Some(narrowed) = self.ctx.temp_types.lookup(TempKey::Var(name)) {
            return Ok(narrowed);
        }
        if let Some(var) = self.ctx.local(name) {
            let mut ty = var.current;
            if let Some(&shared) = self.ctx.shared_vars.get(&name) {
                let env = self.env();
                ty = lowest_upper_bound(&env, ty, shared);
            }
            return Ok(ty);
        }
        // A bare name may be a property of an implicit receiver.
        let receivers = {
            let env = self.env();
            implicit_receivers(&env, &self.ctx)
        };
        for receiver in &receivers {
            let lookup = {
                let env = self.env();
                find_property(&env, receiver.ty, name, self.ctx.current_class())
            };
            if let Some(lookup) = lookup {
                return Ok(lookup.ty());
            }
        }
        // Or a class name acting as a static receiver.
        if let Some(class) = self.store.lookup(name) {
            self.ctx.class_receivers.insert(id);
            return Ok(self.types.named(class));
        }
        let handled = self.with_hooks(|h, cx| h.handle_unresolved_variable(cx, pos, id));
        if handled {
            return Ok(self.ctx.expr_type(id).unwrap_or(TypeInterner::UNKNOWN));
        }
        self.ctx.report(
            DiagnosticKind::UnresolvedSymbol,
            span,
            pos,
            format!("unable to resolve variable {}", self.interner.resolve(name)),
        );
        Ok(TypeInterner::UNKNOWN)
    }

    fn check_property(
        &mut self,
        module: &Module,
        id: ExprId,
        object: ExprId,
        name: Atom,
        span: Span,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        let receiver = self.check_expr(module, object)?;
        if let Some(key) = self.narrow_key(module, id) {
            if let Some(narrowed) = self.ctx.temp_types.lookup(key) {
                return Ok(narrowed);
            }
        }
        // Arrays expose a length pseudo-property.
        if matches!(self.types.lookup(receiver), TypeData::Array { .. })
            && &*self.interner.resolve(name) == "length"
        {
            return Ok(self.types.primitive(PrimitiveKind::Int));
        }
        let static_receiver = self.ctx.class_receivers.contains(&object);
        let lookup = {
            let env = self.env();
            find_property(&env, receiver, name, self.ctx.current_class())
        };
        match lookup {
            Some(lookup) => {
                if static_receiver && !lookup.is_static() {
                    let message = format!(
                        "cannot access instance member {} from a static context",
                        self.interner.resolve(name)
                    );
                    self.ctx
                        .report(DiagnosticKind::InaccessibleMember, span, pos, message);
                }
                Ok(lookup.ty())
            }
            None => {
                let handled = self.with_hooks(|h, cx| h.handle_unresolved_property(cx, pos, id));
                if handled {
                    return Ok(self.ctx.expr_type(id).unwrap_or(TypeInterner::UNKNOWN));
                }
                let message = {
                    let env = self.env();
                    format!(
                        "no such property {} for type {}",
                        self.interner.resolve(name),
                        env.display(receiver)
                    )
                };
                self.ctx
                    .report(DiagnosticKind::UnresolvedSymbol, span, pos, message);
                Ok(TypeInterner::UNKNOWN)
            }
        }
    }

    fn check_binary(
        &mut self,
        module: &Module,
        id: ExprId,
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        if op == BinOp::Assign {
            return self.check_assign(module, id, lhs, rhs, span, pos);
        }
        let lhs_ty = self.check_expr(module, lhs)?;
        // Logical operators narrow their right operand.
        let rhs_ty = match op {
            BinOp::And => self.check_guarded(module, lhs, true, rhs)?,
            BinOp::Or => self.check_guarded(module, lhs, false, rhs)?,
            _ => self.check_expr(module, rhs)?,
        };

        let boolean = self.types.primitive(PrimitiveKind::Boolean);
        match op {
            BinOp::And | BinOp::Or | BinOp::Eq | BinOp::Ne => Ok(boolean),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Ok(boolean),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                self.arithmetic_type(id, op, lhs_ty, rhs_ty, span, pos)
            }
            BinOp::Assign => Ok(rhs_ty),
        }
    }

    fn arithmetic_type(
        &mut self,
        id: ExprId,
        op: BinOp,
        lhs_ty: TypeId,
        rhs_ty: TypeId,
        span: Span,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        if lhs_ty == TypeInterner::UNKNOWN || rhs_ty == TypeInterner::UNKNOWN {
            return Ok(TypeInterner::UNKNOWN);
        }
        // String concatenation.
        if op == BinOp::Add {
            let b = &self.store.builtins;
            let stringy = |ty: TypeId, cls| {
                self.types.lookup(ty).named_class() == Some(cls)
            };
            if stringy(lhs_ty, b.string_class)
                || stringy(lhs_ty, b.gstring_class)
                || stringy(rhs_ty, b.string_class)
                || stringy(rhs_ty, b.gstring_class)
            {
                return Ok(self.store.builtins.string);
            }
        }
        // Numeric promotion.
        let kinds = {
            let env = self.env();
            (
                primitive_kind_of(&env, lhs_ty),
                primitive_kind_of(&env, rhs_ty),
            )
        };
        if let (Some(a), Some(b)) = kinds {
            if let Some(promoted) = promote(a, b) {
                return Ok(self.types.primitive(promoted));
            }
        }
        // Operator-overload method on the left operand.
        if let Some(&method_name) = OPERATOR_METHODS.get(&op) {
            let name = self.interner.intern(method_name);
            let resolution = {
                let env = self.env();
                let candidates =
                    crate::symbols::find_methods(&env, lhs_ty, name, self.ctx.current_class(), false);
                crate::methods::choose_method(&env, lhs_ty, &candidates, &[rhs_ty])
            };
            if let crate::methods::Resolution::Unique(call) = resolution {
                return Ok(call.ret);
            }
        }
        let message = {
            let env = self.env();
            format!(
                "operator {op:?} cannot be applied to {} and {}",
                env.display(lhs_ty),
                env.display(rhs_ty)
            )
        };
        self.ctx
            .report(DiagnosticKind::UnsupportedOperator, span, pos, message);
        Ok(TypeInterner::UNKNOWN)
    }

    fn check_assign(
        &mut self,
        module: &Module,
        id: ExprId,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        let _ = id;
        let rhs_ty = self.check_expr(module, rhs)?;
        match &module.arena.expr(lhs).kind {
            ExprKind::Var(name) => {
                let name = *name;
                if let Some(var) = self.ctx.local(name) {
                    let fits =
                        self.check_value_fits(module, var.declared, rhs, rhs_ty, pos)?;
                    let new_ty = if fits && rhs_ty != TypeInterner::UNKNOWN {
                        rhs_ty
                    } else if var.declared != TypeInterner::UNKNOWN {
                        var.declared
                    } else {
                        rhs_ty
                    };
                    self.ctx.temp_types.clear(TempKey::Var(name));
                    if self.ctx.is_shared_with_closure(name) {
                        // The closure may run at any time; the outer flow
                        // type stays put and reads see the LUB instead.
                        let merged = match self.ctx.shared_vars.get(&name).copied() {
                            Some(existing) => {
                                let env = self.env();
                                lowest_upper_bound(&env, existing, new_ty)
                            }
                            None => new_ty,
                        };
                        self.ctx.shared_vars.insert(name, merged);
                    } else {
                        if let Some(var) = self.ctx.local_mut(name) {
                            var.current = new_ty;
                        }
                        if self.ctx.tracker.in_branch() {
                            self.ctx.tracker.record(name, new_ty);
                        }
                    }
                } else {
                    self.assign_implicit_property(module, name, rhs, rhs_ty, span, pos)?;
                }
            }
            ExprKind::Property { object, name, .. } => {
                let (object, name) = (*object, *name);
                let receiver = self.check_expr(module, object)?;
                let slot = {
                    let env = self.env();
                    find_settable(&env, receiver, name, self.ctx.current_class())
                };
                match slot {
                    Some(slot) => {
                        self.check_value_fits(module, slot, rhs, rhs_ty, pos)?;
                        if let Some(key) = self.narrow_key(module, lhs) {
                            self.ctx.temp_types.clear(key);
                        }
                    }
                    None => {
                        let handled =
                            self.with_hooks(|h, cx| h.handle_unresolved_property(cx, pos, lhs));
                        if !handled {
                            let message = {
                                let env = self.env();
                                format!(
                                    "no such property {} for type {}",
                                    self.interner.resolve(name),
                                    env.display(receiver)
                                )
                            };
                            self.ctx
                                .report(DiagnosticKind::UnresolvedSymbol, span, pos, message);
                        }
                    }
                }
            }
            ExprKind::Attribute { object, name } => {
                let (object, name) = (*object, *name);
                let receiver = self.check_expr(module, object)?;
                let field = {
                    let env = self.env();
                    find_attribute(&env, receiver, name, self.ctx.current_class())
                };
                match field {
                    Some(field) => {
                        self.check_value_fits(module, field.ty, rhs, rhs_ty, pos)?;
                    }
                    None => {
                        let handled =
                            self.with_hooks(|h, cx| h.handle_unresolved_attribute(cx, pos, lhs));
                        if !handled {
                            let message = {
                                let env = self.env();
                                format!(
                                    "no such attribute {} for type {}",
                                    self.interner.resolve(name),
                                    env.display(receiver)
                                )
                            };
                            self.ctx
                                .report(DiagnosticKind::UnresolvedSymbol, span, pos, message);
                        }
                    }
                }
            }
            _ => {
                self.check_expr(module, lhs)?;
            }
        }
        Ok(rhs_ty)
    }

    fn assign_implicit_property(
        &mut self,
        module: &Module,
        name: Atom,
        rhs: ExprId,
        rhs_ty: TypeId,
        span: Span,
        pos: SourcePos,
    ) -> FatalResult<()> {
        let receivers = {
            let env = self.env();
            implicit_receivers(&env, &self.ctx)
        };
        for receiver in &receivers {
            let slot = {
                let env = self.env();
                find_settable(&env, receiver.ty, name, self.ctx.current_class())
            };
            if let Some(slot) = slot {
                self.check_value_fits(module, slot, rhs, rhs_ty, pos)?;
                return Ok(());
            }
        }
        self.ctx.report(
            DiagnosticKind::UnresolvedSymbol,
            span,
            pos,
            format!("unable to resolve variable {}", self.interner.resolve(name)),
        );
        Ok(())
    }

    /// Assignment-compatibility check with diagnostics: consults the
    /// constant evaluator for narrow primitive targets, gives extension
    /// hooks the first refusal, then reports. Returns whether the value
    /// fits.
    pub(crate) fn check_value_fits(
        &mut self,
        module: &Module,
        target: TypeId,
        expr: ExprId,
        ty: TypeId,
        pos: SourcePos,
    ) -> FatalResult<bool> {
        if target == TypeInterner::UNKNOWN {
            return Ok(true);
        }
        let mut verdict = {
            let env = self.env();
            assignment_verdict(&env, module, target, Some(expr), ty, self.ctx.current_class())
        };

        // A non-literal constant expression may still fit a narrow
        // numeric target.
        if matches!(
            verdict,
            AssignVerdict::PrecisionLoss | AssignVerdict::Incompatible
        ) {
            if let Some(kind) = {
                let env = self.env();
                primitive_kind_of(&env, target)
            } {
                if matches!(
                    kind,
                    PrimitiveKind::Byte
                        | PrimitiveKind::Short
                        | PrimitiveKind::Char
                        | PrimitiveKind::Int
                ) {
                    match self.evaluate_constant(module, expr) {
                        Ok(ConstValue::Int(v)) | Ok(ConstValue::Long(v)) => {
                            if literal_fits(v, kind) {
                                verdict = AssignVerdict::Ok;
                            } else {
                                verdict = AssignVerdict::PrecisionLoss;
                            }
                        }
                        Ok(_) => {}
                        Err(reason) => {
                            if constant_shaped(module, expr) {
                                self.ctx.report(
                                    DiagnosticKind::ConstantEvaluation,
                                    Span::DUMMY,
                                    pos,
                                    reason,
                                );
                            }
                        }
                    }
                }
            }
        }

        let span = module.arena.expr(expr).span;
        match verdict {
            AssignVerdict::Ok => Ok(true),
            AssignVerdict::OkUnchecked => {
                let message = {
                    let env = self.env();
                    format!(
                        "unchecked assignment of {} to {}",
                        env.display(ty),
                        env.display(target)
                    )
                };
                self.ctx
                    .report(DiagnosticKind::UncheckedGenerics, span, pos, message);
                Ok(true)
            }
            AssignVerdict::PrecisionLoss => {
                let handled = self
                    .with_hooks(|h, cx| h.handle_incompatible_assignment(cx, pos, target, ty, expr));
                if !handled {
                    let message = {
                        let env = self.env();
                        format!(
                            "possible loss of precision converting {} to {}",
                            env.display(ty),
                            env.display(target)
                        )
                    };
                    self.ctx
                        .report(DiagnosticKind::PossibleLossOfPrecision, span, pos, message);
                }
                Ok(false)
            }
            AssignVerdict::Incompatible => {
                let handled = self
                    .with_hooks(|h, cx| h.handle_incompatible_assignment(cx, pos, target, ty, expr));
                if !handled {
                    let message = {
                        let env = self.env();
                        format!(
                            "cannot assign value of type {} to variable of type {}",
                            env.display(ty),
                            env.display(target)
                        )
                    };
                    self.ctx
                        .report(DiagnosticKind::IncompatibleAssignment, span, pos, message);
                }
                Ok(false)
            }
            AssignVerdict::NoSuchProperty(name) => {
                let handled = self
                    .with_hooks(|h, cx| h.handle_incompatible_assignment(cx, pos, target, ty, expr));
                if !handled {
                    let message = {
                        let env = self.env();
                        format!(
                            "no such property {} for type {}",
                            self.interner.resolve(name),
                            env.display(target)
                        )
                    };
                    self.ctx
                        .report(DiagnosticKind::UnresolvedSymbol, span, pos, message);
                }
                Ok(false)
            }
        }
    }
}

/// An expression the constant evaluator is expected to handle: literals
/// and unary/binary combinations of them.
fn constant_shaped(module: &Module, expr: ExprId) -> bool {
    match &module.arena.expr(expr).kind {
        ExprKind::IntLit(_)
        | ExprKind::LongLit(_)
        | ExprKind::DoubleLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::CharLit(_)
        | ExprKind::StringLit(_)
        | ExprKind::NullLit => true,
        ExprKind::Unary { operand, .. } => constant_shaped(module, *operand),
        ExprKind::Binary { lhs, rhs, .. } => {
            constant_shaped(module, *lhs) && constant_shaped(module, *rhs)
        }
        _ => false,
    }
}
