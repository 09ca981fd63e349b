//! Convenience builder for constructing program graphs directly.
//!
//! Used by tests and by front-end glue. Every allocated node gets a
//! distinct synthetic source position so diagnostic deduplication
//! behaves the same as with real positions.

use crate::node::*;
use loam_common::{Atom, Interner, SourcePos, Span};
use std::sync::Arc;

pub struct HirBuilder {
    pub interner: Arc<Interner>,
    pub module: Module,
    next_line: u32,
}

impl HirBuilder {
    pub fn new(interner: Arc<Interner>) -> Self {
        Self {
            interner,
            module: Module::default(),
            next_line: 1,
        }
    }

    pub fn atom(&self, text: &str) -> Atom {
        self.interner.intern(text)
    }

    fn next_pos(&mut self) -> SourcePos {
        let pos = SourcePos::new(self.next_line, 1);
        self.next_line += 1;
        pos
    }

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        let pos = self.next_pos();
        self.module.arena.alloc_expr(Expr {
            kind,
            span: Span::DUMMY,
            pos,
        })
    }

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let pos = self.next_pos();
        self.module.arena.alloc_stmt(Stmt {
            kind,
            span: Span::DUMMY,
            pos,
        })
    }

    // Type references

    pub fn tr(&self, name: &str) -> TypeRef {
        TypeRef::plain(self.atom(name))
    }

    pub fn tr_generic(&self, name: &str, args: Vec<TypeRef>) -> TypeRef {
        TypeRef::generic(
            self.atom(name),
            args.into_iter().map(TypeRefArg::Type).collect(),
        )
    }

    // Expressions

    pub fn null(&mut self) -> ExprId {
        self.expr(ExprKind::NullLit)
    }

    pub fn bool_lit(&mut self, value: bool) -> ExprId {
        self.expr(ExprKind::BoolLit(value))
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.expr(ExprKind::IntLit(value))
    }

    pub fn long(&mut self, value: i64) -> ExprId {
        self.expr(ExprKind::LongLit(value))
    }

    pub fn double(&mut self, value: f64) -> ExprId {
        self.expr(ExprKind::DoubleLit(value))
    }

    pub fn string(&mut self, text: &str) -> ExprId {
        let atom = self.atom(text);
        self.expr(ExprKind::StringLit(atom))
    }

    pub fn gstring(&mut self, parts: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::GStringLit { parts })
    }

    pub fn char_lit(&mut self, value: char) -> ExprId {
        self.expr(ExprKind::CharLit(value))
    }

    pub fn list(&mut self, elements: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::ListLit(elements))
    }

    pub fn map(&mut self, entries: Vec<(ExprId, ExprId)>) -> ExprId {
        self.expr(ExprKind::MapLit(entries))
    }

    pub fn var(&mut self, name: &str) -> ExprId {
        let atom = self.atom(name);
        self.expr(ExprKind::Var(atom))
    }

    pub fn class_ref(&mut self, name: &str) -> ExprId {
        let tr = self.tr(name);
        self.expr(ExprKind::ClassRef(tr))
    }

    pub fn prop(&mut self, object: ExprId, name: &str) -> ExprId {
        let name = self.atom(name);
        self.expr(ExprKind::Property {
            object,
            name,
            safe: false,
        })
    }

    pub fn attr(&mut self, object: ExprId, name: &str) -> ExprId {
        let name = self.atom(name);
        self.expr(ExprKind::Attribute { object, name })
    }

    pub fn call(&mut self, receiver: Option<ExprId>, name: &str, args: Vec<ExprId>) -> ExprId {
        let name = self.atom(name);
        self.expr(ExprKind::Call {
            receiver,
            name,
            args,
            safe: false,
        })
    }

    pub fn new_object(&mut self, class: TypeRef, args: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::New { class, args })
    }

    pub fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.expr(ExprKind::Binary { op, lhs, rhs })
    }

    pub fn assign(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.binary(BinOp::Assign, lhs, rhs)
    }

    pub fn ternary(&mut self, cond: ExprId, then: ExprId, other: ExprId) -> ExprId {
        self.expr(ExprKind::Ternary { cond, then, other })
    }

    pub fn elvis(&mut self, value: ExprId, fallback: ExprId) -> ExprId {
        self.expr(ExprKind::Elvis { value, fallback })
    }

    pub fn cast(&mut self, target: TypeRef, value: ExprId) -> ExprId {
        self.expr(ExprKind::Cast { target, value })
    }

    pub fn instance_of(&mut self, value: ExprId, target: TypeRef, negated: bool) -> ExprId {
        self.expr(ExprKind::InstanceOf {
            value,
            target,
            negated,
        })
    }

    pub fn closure(&mut self, params: Vec<ClosureParam>, body: Vec<StmtId>) -> ExprId {
        self.expr(ExprKind::Closure { params, body })
    }

    pub fn closure_param(&self, name: &str, ty: Option<TypeRef>) -> ClosureParam {
        ClosureParam {
            name: self.atom(name),
            ty,
        }
    }

    // Statements

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn var_decl(&mut self, name: &str, declared: Option<TypeRef>, init: Option<ExprId>) -> StmtId {
        let name = self.atom(name);
        self.stmt(StmtKind::VarDecl {
            name,
            declared,
            init,
        })
    }

    pub fn if_stmt(
        &mut self,
        cond: ExprId,
        then_block: Vec<StmtId>,
        else_block: Option<Vec<StmtId>>,
    ) -> StmtId {
        self.stmt(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    pub fn while_stmt(&mut self, cond: ExprId, body: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::While { cond, body })
    }

    pub fn switch_stmt(&mut self, subject: ExprId, cases: Vec<SwitchCase>) -> StmtId {
        self.stmt(StmtKind::Switch { subject, cases })
    }

    pub fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return(value))
    }

    // Declarations

    pub fn param(&self, name: &str, ty: Option<TypeRef>) -> ParamDecl {
        ParamDecl {
            name: self.atom(name),
            ty,
            default: None,
        }
    }

    pub fn method(
        &mut self,
        name: &str,
        params: Vec<ParamDecl>,
        ret: Option<TypeRef>,
        body: Option<Vec<StmtId>>,
    ) -> MethodDecl {
        MethodDecl {
            name: self.atom(name),
            type_params: Vec::new(),
            params,
            ret,
            body,
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_varargs: false,
            span: Span::DUMMY,
            pos: self.next_pos(),
        }
    }

    pub fn class(&mut self, name: &str) -> ClassDecl {
        ClassDecl {
            name: self.atom(name),
            package: None,
            kind: ClassKind::Class,
            is_abstract: false,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            ctors: Vec::new(),
            span: Span::DUMMY,
            pos: self.next_pos(),
        }
    }

    pub fn push_class(&mut self, class: ClassDecl) {
        self.module.classes.push(class);
    }

    pub fn push_script(&mut self, stmt: StmtId) {
        self.module.script.push(stmt);
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_allocates_distinct_positions() {
        let interner = Arc::new(Interner::new());
        let mut b = HirBuilder::new(interner);
        let a = b.int(1);
        let c = b.int(2);
        assert_ne!(
            b.module.arena.expr(a).pos,
            b.module.arena.expr(c).pos
        );
    }
}
