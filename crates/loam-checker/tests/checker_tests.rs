//! End-to-end checks driving `Checker` over built program graphs.

use loam_checker::{Checker, CheckerExtension, HookCx};
use loam_common::{Atom, Diagnostic, DiagnosticKind, Interner};
use loam_hir::{ClassKind, ExprId, HirBuilder, Visibility};
use loam_solver::{MemberFlags, MethodInfo, ParamInfo, PrimitiveKind, TypeId};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn kinds(diags: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diags.iter().map(|d| d.kind).collect()
}

fn run(interner: Arc<Interner>, b: HirBuilder) -> (Checker, Vec<Diagnostic>) {
    // `RUST_LOG` selects the trace level when debugging a failure.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let module = b.finish();
    let mut checker = Checker::new(interner);
    let diags = checker.check(&module).expect("check");
    (checker, diags)
}

#[test]
fn exact_overload_beats_boxing_and_varargs() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut class = b.class("C");
    let exact = {
        let p = b.param("x", Some(b.tr("int")));
        b.method("f", vec![p], Some(b.tr("String")), Some(vec![]))
    };
    let boxed = {
        let p = b.param("x", Some(b.tr("Integer")));
        b.method("f", vec![p], Some(b.tr("Object")), Some(vec![]))
    };
    let varargs = {
        let p = b.param("xs", Some(b.tr("int")));
        let mut m = b.method("f", vec![p], Some(b.tr("Object")), Some(vec![]));
        m.is_varargs = true;
        m
    };
    class.methods = vec![exact, boxed, varargs];
    b.push_class(class);

    let ctor = b.new_object(b.tr("C"), vec![]);
    let decl = b.var_decl("c", None, Some(ctor));
    b.push_script(decl);
    let recv = b.var("c");
    let one = b.int(1);
    let call = b.call(Some(recv), "f", vec![one]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(call),
        Some(checker.store.builtins.string)
    );
}

#[test]
fn boxing_beats_varargs() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut class = b.class("C");
    let boxed = {
        let p = b.param("x", Some(b.tr("Integer")));
        b.method("f", vec![p], Some(b.tr("String")), Some(vec![]))
    };
    let varargs = {
        let p = b.param("xs", Some(b.tr("int")));
        let mut m = b.method("f", vec![p], Some(b.tr("Object")), Some(vec![]));
        m.is_varargs = true;
        m
    };
    class.methods = vec![boxed, varargs];
    b.push_class(class);

    let ctor = b.new_object(b.tr("C"), vec![]);
    let decl = b.var_decl("c", None, Some(ctor));
    b.push_script(decl);
    let recv = b.var("c");
    let one = b.int(1);
    let call = b.call(Some(recv), "f", vec![one]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(call),
        Some(checker.store.builtins.string)
    );
}

#[test]
fn most_specific_parameter_wins_without_ambiguity() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut class = b.class("C");
    let general = {
        let p = b.param("o", Some(b.tr("Object")));
        b.method("f", vec![p], Some(b.tr("Object")), Some(vec![]))
    };
    let specific = {
        let p = b.param("s", Some(b.tr("String")));
        b.method("f", vec![p], Some(b.tr("String")), Some(vec![]))
    };
    class.methods = vec![general, specific];
    b.push_class(class);

    let ctor = b.new_object(b.tr("C"), vec![]);
    let decl = b.var_decl("c", None, Some(ctor));
    b.push_script(decl);
    let recv = b.var("c");
    let arg = b.string("hi");
    let call = b.call(Some(recv), "f", vec![arg]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(call),
        Some(checker.store.builtins.string)
    );
}

#[test]
fn symmetric_candidates_are_ambiguous() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut class = b.class("C");
    let left = {
        let a = b.param("a", Some(b.tr("String")));
        let o = b.param("b", Some(b.tr("Object")));
        b.method("f", vec![a, o], Some(b.tr("Object")), Some(vec![]))
    };
    let right = {
        let o = b.param("a", Some(b.tr("Object")));
        let a = b.param("b", Some(b.tr("String")));
        b.method("f", vec![o, a], Some(b.tr("Object")), Some(vec![]))
    };
    class.methods = vec![left, right];
    b.push_class(class);

    let ctor = b.new_object(b.tr("C"), vec![]);
    let decl = b.var_decl("c", None, Some(ctor));
    b.push_script(decl);
    let recv = b.var("c");
    let x = b.string("x");
    let y = b.string("y");
    let call = b.call(Some(recv), "f", vec![x, y]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::AmbiguousMethod]);
}

fn push_hierarchy(b: &mut HirBuilder) {
    // class S; class A extends S; class B extends S
    let s = b.class("S");
    b.push_class(s);
    let mut a = b.class("A");
    a.superclass = Some(b.tr("S"));
    b.push_class(a);
    let mut b_cls = b.class("B");
    b_cls.superclass = Some(b.tr("S"));
    b.push_class(b_cls);
}

fn named(checker: &Checker, name: &str) -> TypeId {
    let atom = checker.interner.intern(name);
    let class = checker.store.lookup(atom).expect("class registered");
    checker.types.named(class)
}

#[test]
fn branch_assignments_merge_to_common_supertype() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());
    push_hierarchy(&mut b);

    let flag_init = b.bool_lit(true);
    let flag_decl = b.var_decl("flag", None, Some(flag_init));
    b.push_script(flag_decl);
    let init = b.new_object(b.tr("A"), vec![]);
    let x_decl = b.var_decl("x", None, Some(init));
    b.push_script(x_decl);

    let then_lhs = b.var("x");
    let then_rhs = b.new_object(b.tr("A"), vec![]);
    let then_assign = b.assign(then_lhs, then_rhs);
    let then_stmt = b.expr_stmt(then_assign);
    let else_lhs = b.var("x");
    let else_rhs = b.new_object(b.tr("B"), vec![]);
    let else_assign = b.assign(else_lhs, else_rhs);
    let else_stmt = b.expr_stmt(else_assign);
    let cond = b.var("flag");
    let branch = b.if_stmt(cond, vec![then_stmt], Some(vec![else_stmt]));
    b.push_script(branch);

    let read = b.var("x");
    let observe = b.var_decl("y", None, Some(read));
    b.push_script(observe);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(checker.ctx.expr_type(read), Some(named(&checker, "S")));
}

#[test]
fn instanceof_narrows_inside_the_branch_only() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let lit = b.string("s");
    let init = b.cast(b.tr("Object"), lit);
    let decl = b.var_decl("o", Some(b.tr("Object")), Some(init));
    b.push_script(decl);

    let checked = b.var("o");
    let cond = b.instance_of(checked, b.tr("String"), false);
    let inside_read = b.var("o");
    let inside = b.var_decl("inside", None, Some(inside_read));
    let branch = b.if_stmt(cond, vec![inside], None);
    b.push_script(branch);

    let outside_read = b.var("o");
    let outside = b.var_decl("outside", None, Some(outside_read));
    b.push_script(outside);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(inside_read),
        Some(checker.store.builtins.string)
    );
    assert_eq!(
        checker.ctx.expr_type(outside_read),
        Some(checker.store.builtins.object)
    );
}

#[test]
fn negated_instanceof_with_early_return_narrows_the_rest() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let lit = b.string("s");
    let init = b.cast(b.tr("Object"), lit);
    let decl = b.var_decl("o", Some(b.tr("Object")), Some(init));
    b.push_script(decl);

    let checked = b.var("o");
    let cond = b.instance_of(checked, b.tr("String"), true);
    let bail = b.ret(None);
    let branch = b.if_stmt(cond, vec![bail], None);
    b.push_script(branch);

    let after_read = b.var("o");
    let after = b.var_decl("after", None, Some(after_read));
    b.push_script(after);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(after_read),
        Some(checker.store.builtins.string)
    );
}

#[test]
fn sam_target_infers_closure_parameter() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut mapper = b.class("Mapper");
    mapper.kind = ClassKind::Interface;
    mapper.is_abstract = true;
    let apply = {
        let p = b.param("v", Some(b.tr("String")));
        b.method("apply", vec![p], Some(b.tr("String")), None)
    };
    mapper.methods = vec![apply];
    b.push_class(mapper);

    let mut class = b.class("C");
    let go = {
        let p = b.param("m", Some(b.tr("Mapper")));
        b.method("go", vec![p], Some(b.tr("String")), Some(vec![]))
    };
    class.methods = vec![go];
    b.push_class(class);

    let ctor = b.new_object(b.tr("C"), vec![]);
    let decl = b.var_decl("c", None, Some(ctor));
    b.push_script(decl);
    let it_read = b.var("it");
    let body_ret = b.ret(Some(it_read));
    let closure = b.closure(vec![], vec![body_ret]);
    let recv = b.var("c");
    let call = b.call(Some(recv), "go", vec![closure]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    let sig = checker
        .ctx
        .closure_sigs
        .get(&closure)
        .expect("closure signature inferred");
    assert_eq!(sig.params, vec![checker.store.builtins.string]);
    assert_eq!(sig.ret, checker.store.builtins.string);
    assert_eq!(
        checker.ctx.expr_type(it_read),
        Some(checker.store.builtins.string)
    );
}

struct Frobnicate;

impl CheckerExtension for Frobnicate {
    fn handle_missing_method(
        &mut self,
        cx: &mut HookCx<'_, '_>,
        _receiver: TypeId,
        name: Atom,
        _arg_types: &[TypeId],
        _call: ExprId,
    ) -> Vec<MethodInfo> {
        if &*cx.env.interner.resolve(name) != "frobnicate" {
            return Vec::new();
        }
        vec![MethodInfo {
            name,
            declaring: cx.env.store.builtins.string_class,
            type_params: Vec::new(),
            params: vec![ParamInfo {
                name: cx.env.interner.intern("n"),
                ty: cx.env.types.primitive(PrimitiveKind::Int),
                has_default: false,
            }],
            ret: cx.env.store.builtins.string,
            flags: MemberFlags::empty(),
            visibility: Visibility::Public,
        }]
    }
}

#[test]
fn extension_can_veto_a_missing_method() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let lit = b.string("x");
    let decl = b.var_decl("s", None, Some(lit));
    b.push_script(decl);
    let recv = b.var("s");
    let one = b.int(1);
    let call = b.call(Some(recv), "frobnicate", vec![one]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let module = b.finish();
    let mut checker = Checker::new(interner);
    checker.add_extension(Box::new(Frobnicate));
    let diags = checker.check(&module).expect("check");
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(call),
        Some(checker.store.builtins.string)
    );
}

#[test]
fn missing_method_is_reported_without_an_extension() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let lit = b.string("x");
    let decl = b.var_decl("s", None, Some(lit));
    b.push_script(decl);
    let recv = b.var("s");
    let one = b.int(1);
    let call = b.call(Some(recv), "frobnicate", vec![one]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::NoMatchingMethod]);
}

#[test]
fn closure_shared_variable_widens_reads() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());
    push_hierarchy(&mut b);

    let init = b.new_object(b.tr("A"), vec![]);
    let x_decl = b.var_decl("x", None, Some(init));
    b.push_script(x_decl);

    let lhs = b.var("x");
    let rhs = b.new_object(b.tr("B"), vec![]);
    let assign = b.assign(lhs, rhs);
    let body = b.expr_stmt(assign);
    let closure = b.closure(vec![], vec![body]);
    let f_decl = b.var_decl("f", None, Some(closure));
    b.push_script(f_decl);

    let read = b.var("x");
    let observe = b.var_decl("y", None, Some(read));
    b.push_script(observe);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(checker.ctx.expr_type(read), Some(named(&checker, "S")));
}

#[test]
fn ternary_arm_assignments_merge_to_common_supertype() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());
    push_hierarchy(&mut b);

    let flag_init = b.bool_lit(true);
    let flag_decl = b.var_decl("flag", None, Some(flag_init));
    b.push_script(flag_decl);
    let init = b.new_object(b.tr("A"), vec![]);
    let x_decl = b.var_decl("x", None, Some(init));
    b.push_script(x_decl);

    let then_lhs = b.var("x");
    let then_rhs = b.new_object(b.tr("A"), vec![]);
    let then_assign = b.assign(then_lhs, then_rhs);
    let else_lhs = b.var("x");
    let else_rhs = b.new_object(b.tr("B"), vec![]);
    let else_assign = b.assign(else_lhs, else_rhs);
    let cond = b.var("flag");
    let tern = b.ternary(cond, then_assign, else_assign);
    let stmt = b.expr_stmt(tern);
    b.push_script(stmt);

    let read = b.var("x");
    let observe = b.var_decl("y", None, Some(read));
    b.push_script(observe);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(checker.ctx.expr_type(read), Some(named(&checker, "S")));
}

#[test]
fn closure_variable_call_rejects_bad_arguments() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    // def f = { int x -> x }; f("oops", "extra")
    let p = b.closure_param("x", Some(b.tr("int")));
    let x_read = b.var("x");
    let body = b.ret(Some(x_read));
    let closure = b.closure(vec![p], vec![body]);
    let f_decl = b.var_decl("f", None, Some(closure));
    b.push_script(f_decl);

    let oops = b.string("oops");
    let extra = b.string("extra");
    let call = b.call(None, "f", vec![oops, extra]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::NoMatchingMethod]);
}

#[test]
fn closure_variable_call_accepts_matching_arguments() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let p = b.closure_param("x", Some(b.tr("int")));
    let x_read = b.var("x");
    let body = b.ret(Some(x_read));
    let closure = b.closure(vec![p], vec![body]);
    let f_decl = b.var_decl("f", None, Some(closure));
    b.push_script(f_decl);

    let one = b.int(1);
    let call = b.call(None, "f", vec![one]);
    let stmt = b.expr_stmt(call);
    b.push_script(stmt);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(call),
        Some(checker.types.primitive(PrimitiveKind::Int))
    );
}

#[test]
fn oversized_literal_loses_precision_but_small_one_fits() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let big = b.int(300);
    let bad = b.var_decl("a", Some(b.tr("byte")), Some(big));
    b.push_script(bad);
    let small = b.int(5);
    let good = b.var_decl("b", Some(b.tr("byte")), Some(small));
    b.push_script(good);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::PossibleLossOfPrecision]);
}

#[test]
fn incompatible_initializer_is_reported() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let one = b.int(1);
    let decl = b.var_decl("s", Some(b.tr("String")), Some(one));
    b.push_script(decl);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::IncompatibleAssignment]);
}

#[test]
fn return_type_mismatch_is_reported() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut class = b.class("C");
    let body = {
        let one = b.int(1);
        let ret = b.ret(Some(one));
        vec![ret]
    };
    let f = b.method("f", vec![], Some(b.tr("String")), Some(body));
    class.methods = vec![f];
    b.push_class(class);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::IncompatibleReturnType]);
}

#[test]
fn unresolved_variable_is_reported() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let read = b.var("mystery");
    let stmt = b.expr_stmt(read);
    b.push_script(stmt);

    let (_, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![DiagnosticKind::UnresolvedSymbol]);
}

#[test]
fn undeclared_return_type_is_inferred_at_the_call_site() {
    let interner = Arc::new(Interner::new());
    let mut b = HirBuilder::new(interner.clone());

    let mut class = b.class("C");
    let body = {
        let lit = b.string("s");
        let ret = b.ret(Some(lit));
        vec![ret]
    };
    let g = b.method("g", vec![], None, Some(body));
    class.methods = vec![g];
    b.push_class(class);

    let ctor = b.new_object(b.tr("C"), vec![]);
    let decl = b.var_decl("c", None, Some(ctor));
    b.push_script(decl);
    let recv = b.var("c");
    let call = b.call(Some(recv), "g", vec![]);
    let observe = b.var_decl("r", None, Some(call));
    b.push_script(observe);

    let (checker, diags) = run(interner, b);
    assert_eq!(kinds(&diags), vec![]);
    assert_eq!(
        checker.ctx.expr_type(call),
        Some(checker.store.builtins.string)
    );
}
