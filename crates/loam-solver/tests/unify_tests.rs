mod common;

use common::Fixture;
use loam_solver::unify::{apply_bindings, class_arg_bindings, extract_bindings, GenericsBindings};
use loam_solver::Bounds;

#[test]
fn class_arguments_bind_fixed() {
    let f = Fixture::new();
    let env = f.env();
    let t = f.interner.intern("T");
    let usage = f.types.named_with(f.box_class, [f.store.builtins.string]);

    let bindings = class_arg_bindings(&env, usage);
    let binding = bindings.get(t).expect("T bound");
    assert_eq!(binding.ty, f.store.builtins.string);
    assert!(binding.fixed);
}

#[test]
fn apply_substitutes_placeholders_recursively() {
    let f = Fixture::new();
    let env = f.env();
    let usage = f.types.named_with(f.box_class, [f.store.builtins.string]);
    let bindings = class_arg_bindings(&env, usage);

    assert_eq!(
        apply_bindings(&env, &bindings, f.t_placeholder),
        f.store.builtins.string
    );
    let nested = f.types.named_with(f.box_class, [f.t_placeholder]);
    assert_eq!(apply_bindings(&env, &bindings, nested), usage);
}

#[test]
fn extraction_learns_bindings_from_an_argument() {
    let f = Fixture::new();
    let env = f.env();
    let t = f.interner.intern("T");
    let usage = f.types.named_with(f.box_class, [f.ty(f.dog)]);
    let decl = f.types.named_with(f.box_class, [f.t_placeholder]);

    let mut out = GenericsBindings::new();
    assert!(extract_bindings(&env, usage, decl, &mut out, false));
    assert_eq!(out.get(t).expect("T learned").ty, f.ty(f.dog));
}

#[test]
fn fixed_binding_rejects_an_incompatible_candidate() {
    let f = Fixture::new();
    let env = f.env();
    let t = f.interner.intern("T");

    let mut out = GenericsBindings::new();
    out.bind_unchecked(t, f.store.builtins.string, true);
    let usage = f.types.named_with(f.box_class, [f.ty(f.dog)]);
    let decl = f.types.named_with(f.box_class, [f.t_placeholder]);
    assert!(!extract_bindings(&env, usage, decl, &mut out, false));
}

#[test]
fn open_bindings_widen_by_lub() {
    let f = Fixture::new();
    let env = f.env();
    let t = f.interner.intern("T");

    let mut bindings = GenericsBindings::new();
    assert!(bindings.bind(&env, t, &Bounds::new(), f.ty(f.dog), false));
    assert!(bindings.bind(&env, t, &Bounds::new(), f.ty(f.cat), false));
    assert_eq!(bindings.get(t).expect("T bound").ty, f.ty(f.animal));
}
