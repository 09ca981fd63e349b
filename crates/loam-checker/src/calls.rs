//! Call and constructor resolution, closure argument inference, and
//! on-demand return-type inference for undeclared methods.
//!
//! A call is resolved against each candidate receiver in consultation
//! order; the first receiver producing a unique match wins. Closure
//! literal arguments are typed after resolution so the selected
//! parameter's shape (hint signatures or a SAM target) can drive their
//! parameter inference.

use crate::closures::{pick_hint, sam_signature_with, merge_params};
use crate::context::{ClosureSignature, MethodKey};
use crate::flow::{DelegationMetadata, DelegationStrategy};
use crate::methods::{choose_method, Resolution, ResolvedCall};
use crate::symbols::{explicit_receivers, find_constructors, find_methods};
use crate::Checker;
use loam_common::{Atom, DiagnosticKind, FatalResult, SourcePos, Span};
use loam_hir::{ClosureParam, ExprId, ExprKind, Module, StmtId, StmtKind, TypeRef};
use loam_solver::{
    is_assignable_to, MethodInfo, ParamInfo, PrimitiveKind, TypeData, TypeId, TypeInterner,
};
use tracing::trace;

impl Checker {
    pub(crate) fn check_call(
        &mut self,
        module: &Module,
        id: ExprId,
        receiver: Option<ExprId>,
        name: Atom,
        args: &[ExprId],
        safe: bool,
    ) -> FatalResult<TypeId> {
        let _ = safe;
        let expr = module.arena.expr(id);
        let (span, pos) = (expr.span, expr.pos);

        if self.with_hooks(|h, cx| h.before_method_call(cx, pos, id)) {
            return Ok(self.ctx.expr_type(id).unwrap_or(TypeInterner::UNKNOWN));
        }

        let (receivers, static_only) = match receiver {
            Some(object) => {
                let ty = self.check_expr(module, object)?;
                let static_only = self.ctx.class_receivers.contains(&object);
                let receivers = {
                    let env = self.env();
                    explicit_receivers(&env, ty)
                };
                (receivers, static_only)
            }
            None => {
                let receivers = {
                    let env = self.env();
                    crate::symbols::implicit_receivers(&env, &self.ctx)
                };
                (receivers, false)
            }
        };

        let (arg_types, closure_args) = self.check_args(module, args)?;

        let mut resolved: Option<ResolvedCall> = None;
        let mut ambiguity: Option<(TypeId, Vec<MethodInfo>)> = None;
        for r in &receivers {
            let resolution = {
                let env = self.env();
                let candidates =
                    find_methods(&env, r.ty, name, self.ctx.current_class(), static_only);
                choose_method(&env, r.ty, &candidates, &arg_types)
            };
            match resolution {
                Resolution::Unique(call) => {
                    resolved = Some(*call);
                    break;
                }
                Resolution::Ambiguous(candidates) => {
                    ambiguity = Some((r.ty, candidates));
                    break;
                }
                Resolution::None => {}
            }
        }

        // A bare name may call a closure held in a local variable.
        if resolved.is_none() && ambiguity.is_none() && receiver.is_none() {
            if let Some(ret) = self.closure_variable_call(name, &arg_types, span, pos) {
                self.finish_closure_args(module, id, &closure_args, None)?;
                self.with_hooks(|h, cx| h.after_method_call(cx, pos, id));
                return Ok(ret);
            }
        }

        if let Some((receiver_ty, candidates)) = ambiguity {
            let narrowed = self.with_hooks(|h, cx| {
                h.handle_ambiguous_methods(cx, pos, candidates.clone(), id)
            });
            if narrowed.len() == 1 {
                let resolution = {
                    let env = self.env();
                    choose_method(&env, receiver_ty, &narrowed, &arg_types)
                };
                if let Resolution::Unique(call) = resolution {
                    resolved = Some(*call);
                }
            }
            if resolved.is_none() {
                let message = {
                    let env = self.env();
                    format!(
                        "reference to {} is ambiguous on {}",
                        self.interner.resolve(name),
                        env.display(receiver_ty)
                    )
                };
                self.ctx
                    .report(DiagnosticKind::AmbiguousMethod, span, pos, message);
                self.finish_closure_args(module, id, &closure_args, None)?;
                return Ok(TypeInterner::UNKNOWN);
            }
        }

        if resolved.is_none() {
            let primary = receivers
                .first()
                .map(|r| r.ty)
                .unwrap_or(TypeInterner::UNKNOWN);
            // A dynamic receiver accepts any call.
            if primary == TypeInterner::UNKNOWN {
                self.finish_closure_args(module, id, &closure_args, None)?;
                return Ok(TypeInterner::UNKNOWN);
            }
            let synthesized = self.with_hooks(|h, cx| {
                h.handle_missing_method(cx, pos, primary, name, &arg_types, id)
            });
            if !synthesized.is_empty() {
                let resolution = {
                    let env = self.env();
                    choose_method(&env, primary, &synthesized, &arg_types)
                };
                if let Resolution::Unique(call) = resolution {
                    trace!("missing-method checkpoint supplied a candidate");
                    resolved = Some(*call);
                }
            }
            if resolved.is_none() {
                let message = {
                    let env = self.env();
                    let shown: Vec<String> =
                        arg_types.iter().map(|&t| env.display(t)).collect();
                    format!(
                        "cannot find matching method {}.{}({})",
                        env.display(primary),
                        self.interner.resolve(name),
                        shown.join(", ")
                    )
                };
                self.ctx
                    .report(DiagnosticKind::NoMatchingMethod, span, pos, message);
                self.finish_closure_args(module, id, &closure_args, None)?;
                return Ok(TypeInterner::UNKNOWN);
            }
        }

        let call = match resolved {
            Some(call) => call,
            None => return Ok(TypeInterner::UNKNOWN),
        };
        self.with_hooks(|h, cx| h.on_method_selection(cx, pos, id, &call.method));

        self.finish_closure_args(module, id, &closure_args, Some(&call))?;

        let mut ret = call.ret;
        if ret == TypeInterner::UNKNOWN {
            ret = self.infer_def_return(module, &call)?;
        }
        self.with_hooks(|h, cx| h.after_method_call(cx, pos, id));
        Ok(ret)
    }

    /// Type the arguments. Closure literals get an uninferred closure
    /// placeholder type and their bodies are deferred until resolution
    /// has selected a target parameter.
    fn check_args(
        &mut self,
        module: &Module,
        args: &[ExprId],
    ) -> FatalResult<(Vec<TypeId>, Vec<(usize, ExprId)>)> {
        let mut arg_types = Vec::with_capacity(args.len());
        let mut closure_args = Vec::new();
        for (i, &arg) in args.iter().enumerate() {
            if matches!(module.arena.expr(arg).kind, ExprKind::Closure { .. }) {
                closure_args.push((i, arg));
                arg_types.push(self.types.intern(TypeData::Closure {
                    params: None,
                    ret: TypeInterner::UNKNOWN,
                }));
            } else {
                arg_types.push(self.check_expr(module, arg)?);
            }
        }
        Ok((arg_types, closure_args))
    }

    /// Check deferred closure arguments. With a resolved call, each
    /// closure's parameter types come from hint signatures or from the
    /// SAM shape of its target parameter.
    fn finish_closure_args(
        &mut self,
        module: &Module,
        call_expr: ExprId,
        closure_args: &[(usize, ExprId)],
        call: Option<&ResolvedCall>,
    ) -> FatalResult<()> {
        let _ = call_expr;
        for &(index, closure_id) in closure_args {
            let expr = module.arena.expr(closure_id);
            let pos = expr.pos;
            let ExprKind::Closure { params, body } = &expr.kind else {
                continue;
            };
            let params = params.clone();
            let body = body.clone();

            let sig = match call {
                Some(call) => {
                    let param_ty = call
                        .params
                        .get(index)
                        .copied()
                        .unwrap_or(TypeInterner::UNKNOWN);
                    let declared: Vec<Option<TypeId>> = params
                        .iter()
                        .map(|p| p.ty.as_ref().map(|tr| self.lower_tr(tr, pos)))
                        .collect();
                    let hints = self.closure_hints(&call.method, &call.params, closure_id);
                    let picked = {
                        let env = self.env();
                        pick_hint(&env, &hints, &declared)
                    };
                    match picked {
                        Some(hint) => Some(ClosureSignature {
                            params: hint,
                            ret: TypeInterner::UNKNOWN,
                        }),
                        None => {
                            let env = self.env();
                            sam_signature_with(&env, param_ty, Some(&call.bindings))
                        }
                    }
                }
                None => None,
            };
            let ty = self.check_closure(module, closure_id, &params, &body, sig, pos)?;
            self.record(closure_id, ty);
        }
        Ok(())
    }

    /// Resolve a bare-name call against a closure-typed local. The
    /// closure's known parameter list checks the call like a method
    /// signature: arity must match and each argument must be assignable
    /// to its parameter.
    fn closure_variable_call(
        &mut self,
        name: Atom,
        arg_types: &[TypeId],
        span: Span,
        pos: SourcePos,
    ) -> Option<TypeId> {
        let current = self.ctx.local(name)?.current;
        match self.types.lookup(current) {
            TypeData::Closure {
                params: Some(params),
                ret,
            } => {
                let fits = params.len() == arg_types.len() && {
                    let env = self.env();
                    params
                        .iter()
                        .zip(arg_types.iter())
                        .all(|(&p, &a)| is_assignable_to(&env, a, p))
                };
                if !fits {
                    let message = {
                        let env = self.env();
                        let shown: Vec<String> =
                            arg_types.iter().map(|&t| env.display(t)).collect();
                        format!(
                            "cannot call closure {} with arguments ({})",
                            self.interner.resolve(name),
                            shown.join(", ")
                        )
                    };
                    self.ctx
                        .report(DiagnosticKind::NoMatchingMethod, span, pos, message);
                    return Some(TypeInterner::UNKNOWN);
                }
                Some(ret)
            }
            // Parameters not inferred yet: accept the call.
            TypeData::Closure { params: None, ret } => Some(ret),
            TypeData::Named { class, .. } if class == self.store.builtins.closure_class => {
                Some(TypeInterner::UNKNOWN)
            }
            _ => None,
        }
    }

    /// Check a closure literal body and produce its inferred type.
    /// `sig` carries parameter types imposed by the surrounding call
    /// target; explicitly declared parameter types win over it.
    pub(crate) fn check_closure(
        &mut self,
        module: &Module,
        id: ExprId,
        params: &[ClosureParam],
        body: &[StmtId],
        sig: Option<ClosureSignature>,
        pos: SourcePos,
    ) -> FatalResult<TypeId> {
        let declared: Vec<Option<TypeId>> = params
            .iter()
            .map(|p| p.ty.as_ref().map(|tr| self.lower_tr(tr, pos)))
            .collect();
        let final_params = merge_params(&declared, sig.as_ref().map(|s| s.params.as_slice()));

        let names: Vec<Atom> = if params.is_empty() {
            vec![self.interner.intern("it")]
        } else {
            params.iter().map(|p| p.name).collect()
        };
        let param_infos: Vec<ParamInfo> = names
            .into_iter()
            .zip(final_params.iter().copied())
            .map(|(name, ty)| ParamInfo {
                name,
                ty,
                has_default: false,
            })
            .collect();

        // The owner chains through nested closures; the delegate defaults
        // to the owner until a target method overrides it.
        let owner = match self.ctx.delegation.last() {
            Some(meta) => meta.owner,
            None => match self.ctx.current_class() {
                Some(class) => self.types.named(class),
                None => TypeInterner::UNKNOWN,
            },
        };
        self.ctx.closure_floors.push(self.ctx.locals.len());
        self.ctx.delegation.push(DelegationMetadata {
            owner,
            delegate: owner,
            strategy: DelegationStrategy::OwnerFirst,
        });
        let declared_ret = sig.as_ref().map(|s| s.ret).unwrap_or(TypeInterner::UNKNOWN);
        let body_result = self.check_body(module, &param_infos, body, declared_ret, pos);
        self.ctx.delegation.pop();
        self.ctx.closure_floors.pop();
        let mut ret = body_result?;

        // A closure without a return statement yields its trailing
        // expression.
        let void = self.types.primitive(PrimitiveKind::Void);
        if ret == void {
            if let Some(&last) = body.last() {
                if let StmtKind::Expr(value) = module.arena.stmt(last).kind {
                    if let Some(ty) = self.ctx.expr_type(value) {
                        ret = ty;
                    }
                }
            }
        }

        self.ctx.closure_sigs.insert(
            id,
            ClosureSignature {
                params: final_params.clone(),
                ret,
            },
        );
        Ok(self.types.intern(TypeData::Closure {
            params: Some(final_params),
            ret,
        }))
    }

    pub(crate) fn check_new(
        &mut self,
        module: &Module,
        id: ExprId,
        class: &TypeRef,
        args: &[ExprId],
    ) -> FatalResult<TypeId> {
        let expr = module.arena.expr(id);
        let (span, pos) = (expr.span, expr.pos);
        let ty = self.lower_tr(class, pos);

        let mut arg_types = Vec::with_capacity(args.len());
        for &arg in args {
            arg_types.push(self.check_expr(module, arg)?);
        }

        let Some(class_id) = self.types.lookup(ty).named_class() else {
            return Ok(ty);
        };
        if self.store.class(class_id).is_abstract {
            let message = {
                let env = self.env();
                format!("cannot instantiate abstract type {}", env.display(ty))
            };
            self.ctx
                .report(DiagnosticKind::NoMatchingMethod, span, pos, message);
            return Ok(ty);
        }

        let resolution = {
            let env = self.env();
            let ctors = find_constructors(&env, class_id, self.ctx.current_class());
            choose_method(&env, ty, &ctors, &arg_types)
        };
        match resolution {
            Resolution::Unique(call) => {
                self.with_hooks(|h, cx| h.on_method_selection(cx, pos, id, &call.method));
            }
            Resolution::Ambiguous(_) => {
                let message = {
                    let env = self.env();
                    format!("constructor call on {} is ambiguous", env.display(ty))
                };
                self.ctx
                    .report(DiagnosticKind::AmbiguousMethod, span, pos, message);
            }
            Resolution::None => {
                let message = {
                    let env = self.env();
                    let shown: Vec<String> = arg_types.iter().map(|&t| env.display(t)).collect();
                    format!(
                        "cannot find matching constructor {}({})",
                        env.display(ty),
                        shown.join(", ")
                    )
                };
                self.ctx
                    .report(DiagnosticKind::NoMatchingMethod, span, pos, message);
            }
        }
        Ok(ty)
    }

    /// Return type for a call into a method declared without one. The
    /// body is checked on demand (once) and the inferred type cached; a
    /// recursive cycle yields the unknown type.
    fn infer_def_return(&mut self, module: &Module, call: &ResolvedCall) -> FatalResult<TypeId> {
        let class = call.method.declaring;
        let index = {
            let info = self.store.class(class);
            let exact = info.methods.iter().position(|m| m == &call.method);
            match exact.or_else(|| {
                info.methods
                    .iter()
                    .position(|m| m.name == call.method.name)
            }) {
                Some(index) => index as u32,
                None => return Ok(TypeInterner::UNKNOWN),
            }
        };
        let key = MethodKey {
            class,
            index,
            is_ctor: false,
        };
        if let Some(&cached) = self.ctx.inferred_returns.get(&key) {
            return Ok(cached);
        }
        // Already being checked: a recursive call into the body under
        // inference.
        if self.ctx.visited_methods.contains(&key) {
            return Ok(TypeInterner::UNKNOWN);
        }
        let class_params = self.store.class(class).type_params.clone();
        self.ctx.enclosing_class.push(class);
        self.scope.push(class_params);
        let result = self.check_method(module, class, index, false);
        self.scope.pop();
        self.ctx.enclosing_class.pop();
        result?;
        Ok(self
            .ctx
            .inferred_returns
            .get(&key)
            .copied()
            .unwrap_or(TypeInterner::UNKNOWN))
    }
}
