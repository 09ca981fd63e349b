mod common;

use common::Fixture;
use loam_solver::{is_assignable_to, is_raw_usage, PrimitiveKind, TypeInterner};

#[test]
fn subclass_flows_to_superclass_and_interface() {
    let f = Fixture::new();
    let env = f.env();
    let (dog, animal, pet) = (f.ty(f.dog), f.ty(f.animal), f.ty(f.pet));

    assert!(is_assignable_to(&env, dog, animal));
    assert!(is_assignable_to(&env, dog, pet));
    assert!(is_assignable_to(&env, dog, f.store.builtins.object));
    assert!(!is_assignable_to(&env, animal, dog));
}

#[test]
fn sibling_classes_are_unrelated() {
    let f = Fixture::new();
    let env = f.env();
    assert!(!is_assignable_to(&env, f.ty(f.cat), f.ty(f.dog)));
    assert!(!is_assignable_to(&env, f.ty(f.dog), f.ty(f.cat)));
}

#[test]
fn numeric_widening_is_one_directional() {
    let f = Fixture::new();
    let env = f.env();
    let int = f.types.primitive(PrimitiveKind::Int);
    let long = f.types.primitive(PrimitiveKind::Long);
    let byte = f.types.primitive(PrimitiveKind::Byte);

    assert!(is_assignable_to(&env, int, long));
    assert!(is_assignable_to(&env, byte, int));
    assert!(!is_assignable_to(&env, long, int));
    assert!(!is_assignable_to(&env, int, byte));
}

#[test]
fn boxing_reaches_the_wrapper_and_object() {
    let f = Fixture::new();
    let env = f.env();
    let int = f.types.primitive(PrimitiveKind::Int);
    let integer = f.store.builtins.wrapper(PrimitiveKind::Int);

    assert!(is_assignable_to(&env, int, integer));
    assert!(is_assignable_to(&env, int, f.store.builtins.object));
    assert!(is_assignable_to(&env, integer, int));
}

#[test]
fn unknown_flows_both_ways() {
    let f = Fixture::new();
    let env = f.env();
    let dog = f.ty(f.dog);

    assert!(is_assignable_to(&env, TypeInterner::UNKNOWN, dog));
    assert!(is_assignable_to(&env, dog, TypeInterner::UNKNOWN));
}

#[test]
fn reference_arrays_are_covariant_primitive_arrays_exact() {
    let f = Fixture::new();
    let env = f.env();
    let dogs = f.types.array_of(f.ty(f.dog));
    let animals = f.types.array_of(f.ty(f.animal));
    let ints = f.types.array_of(f.types.primitive(PrimitiveKind::Int));
    let longs = f.types.array_of(f.types.primitive(PrimitiveKind::Long));

    assert!(is_assignable_to(&env, dogs, animals));
    assert!(!is_assignable_to(&env, animals, dogs));
    assert!(is_assignable_to(&env, ints, ints));
    assert!(!is_assignable_to(&env, ints, longs));
}

#[test]
fn bare_generic_class_is_a_raw_usage() {
    let f = Fixture::new();
    let env = f.env();
    let raw = f.types.named(f.box_class);
    let applied = f
        .types
        .named_with(f.box_class, [f.store.builtins.string]);

    assert!(is_raw_usage(&env, raw));
    assert!(!is_raw_usage(&env, applied));
    assert!(!is_raw_usage(&env, f.ty(f.dog)));
}
