//! The program graph the Loam engine checks.
//!
//! The front-end (lexer/parser) is a separate component; this crate
//! defines the already-built graph it hands to the checker: typed arenas
//! of expressions and statements addressed by stable ids, declaration
//! structures for classes and methods, and syntactic type references
//! that the checker lowers against its symbol table.
//!
//! Per-node *inferred* type information is not stored here — the checker
//! owns side tables keyed by `ExprId` so the graph itself stays immutable
//! during a pass.

pub mod build;
pub mod node;

pub use build::HirBuilder;
pub use node::{
    BinOp, ClassDecl, ClassKind, ClosureParam, Expr, ExprId, ExprKind, FieldDecl, HirArena,
    MethodDecl, Module, ParamDecl, PropertyDecl, Stmt, StmtId, StmtKind, SwitchCase, TypeParamRef,
    TypeRef, TypeRefArg, UnOp, Visibility,
};
