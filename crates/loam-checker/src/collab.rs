//! External collaborator contracts.
//!
//! Three narrow synchronous interfaces the engine consumes but does not
//! implement: compile-time constant evaluation, closure signature hints,
//! and extension loading. Each has a default implementation so the
//! checker runs stand-alone.

use crate::ext::CheckerExtension;
use loam_hir::{ExprId, ExprKind, Module, UnOp};
use loam_solver::{MethodInfo, TypeId};

/// A compile-time constant value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Long(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    Char(char),
    Null,
}

/// Evaluates a constant expression synchronously, or fails. Failures are
/// ordinary "could not evaluate" outcomes, never fatal.
pub trait ConstantEvaluator {
    fn evaluate(&self, module: &Module, expr: ExprId) -> Result<ConstValue, String>;
}

/// The default evaluator handles literals and unary negation; anything
/// richer (a real mini-compilation) is supplied by the embedder.
pub struct LiteralConstantEvaluator;

impl ConstantEvaluator for LiteralConstantEvaluator {
    fn evaluate(&self, module: &Module, expr: ExprId) -> Result<ConstValue, String> {
        match &module.arena.expr(expr).kind {
            ExprKind::NullLit => Ok(ConstValue::Null),
            ExprKind::BoolLit(v) => Ok(ConstValue::Bool(*v)),
            ExprKind::IntLit(v) => Ok(ConstValue::Int(*v)),
            ExprKind::LongLit(v) => Ok(ConstValue::Long(*v)),
            ExprKind::DoubleLit(v) => Ok(ConstValue::Double(*v)),
            ExprKind::CharLit(v) => Ok(ConstValue::Char(*v)),
            ExprKind::StringLit(_) => Err("string literal interning not available here".into()),
            ExprKind::Unary {
                op: UnOp::Neg,
                operand,
            } => match self.evaluate(module, *operand)? {
                ConstValue::Int(v) => Ok(ConstValue::Int(-v)),
                ConstValue::Long(v) => Ok(ConstValue::Long(-v)),
                ConstValue::Double(v) => Ok(ConstValue::Double(-v)),
                other => Err(format!("cannot negate {other:?}")),
            },
            _ => Err("not a compile-time constant".into()),
        }
    }
}

/// Supplies candidate parameter-type signatures for a closure argument
/// of a given target method (the declared-hint inference path).
pub trait ClosureSignatureHintProvider {
    fn signatures(
        &self,
        method: &MethodInfo,
        arg_types: &[TypeId],
        closure: ExprId,
    ) -> Vec<Vec<TypeId>>;
}

pub struct NoHints;

impl ClosureSignatureHintProvider for NoHints {
    fn signatures(&self, _: &MethodInfo, _: &[TypeId], _: ExprId) -> Vec<Vec<TypeId>> {
        Vec::new()
    }
}

/// Locates extension-hook implementations by identifier. The compilation
/// and loading mechanism behind it is out of scope.
pub trait ExtensionLoader {
    fn load(&self, id: &str) -> Vec<Box<dyn CheckerExtension>>;
}

pub struct NoExtensions;

impl ExtensionLoader for NoExtensions {
    fn load(&self, _: &str) -> Vec<Box<dyn CheckerExtension>> {
        Vec::new()
    }
}
