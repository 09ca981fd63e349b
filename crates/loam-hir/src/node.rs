//! Node definitions for the program graph.

use loam_common::{Atom, SourcePos, Span};

/// Index of an expression in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// Index of a statement in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

/// A syntactic type reference, resolved against the class store by the
/// checker. `dims` is the array nesting depth (`int[][]` has dims 2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    pub name: Atom,
    pub args: Vec<TypeRefArg>,
    pub dims: u8,
}

impl TypeRef {
    pub fn plain(name: Atom) -> Self {
        Self {
            name,
            args: Vec::new(),
            dims: 0,
        }
    }

    pub fn generic(name: Atom, args: Vec<TypeRefArg>) -> Self {
        Self { name, args, dims: 0 }
    }

    pub fn array(mut self, dims: u8) -> Self {
        self.dims = dims;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRefArg {
    Type(TypeRef),
    /// `?`, `? extends T`, or `? super T`.
    Wildcard {
        upper: Option<Box<TypeRef>>,
        lower: Option<Box<TypeRef>>,
    },
}

/// A generics parameter declaration (`<T extends Number>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParamRef {
    pub name: Atom,
    pub upper: Vec<TypeRef>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Assign,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureParam {
    pub name: Atom,
    pub ty: Option<TypeRef>,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    NullLit,
    BoolLit(bool),
    IntLit(i64),
    LongLit(i64),
    /// `float`/`double` literals; the text is kept so precision checks can
    /// consult the constant evaluator.
    DoubleLit(f64),
    BigDecimalLit(Box<str>),
    StringLit(Atom),
    /// Dynamic string with embedded expressions (`"a ${b} c"`).
    GStringLit { parts: Vec<ExprId> },
    CharLit(char),
    ListLit(Vec<ExprId>),
    MapLit(Vec<(ExprId, ExprId)>),
    /// Variable reference; may also name a class (static receiver).
    Var(Atom),
    /// Explicit class reference receiver for static member access.
    ClassRef(TypeRef),
    /// Property access `o.name`; `safe` for `o?.name`. Resolves fields,
    /// declared properties, and synthesized accessors.
    Property {
        object: ExprId,
        name: Atom,
        safe: bool,
    },
    /// Attribute access `o.@name`: fields only, accessors bypassed.
    Attribute { object: ExprId, name: Atom },
    /// Method call. A `receiver` of `None` means an implicit-this or
    /// script-scope call.
    Call {
        receiver: Option<ExprId>,
        name: Atom,
        args: Vec<ExprId>,
        safe: bool,
    },
    /// Constructor call `new C(args)`.
    New { class: TypeRef, args: Vec<ExprId> },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary { op: UnOp, operand: ExprId },
    Ternary {
        cond: ExprId,
        then: ExprId,
        other: ExprId,
    },
    /// `a ?: b`.
    Elvis { value: ExprId, fallback: ExprId },
    Cast { target: TypeRef, value: ExprId },
    InstanceOf {
        value: ExprId,
        target: TypeRef,
        negated: bool,
    },
    Closure {
        params: Vec<ClosureParam>,
        body: Vec<StmtId>,
    },
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub pos: SourcePos,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    /// Case values; empty for the `default` branch.
    pub values: Vec<ExprId>,
    pub body: Vec<StmtId>,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Expr(ExprId),
    /// `T x = init` or `def x = init`.
    VarDecl {
        name: Atom,
        declared: Option<TypeRef>,
        init: Option<ExprId>,
    },
    If {
        cond: ExprId,
        then_block: Vec<StmtId>,
        else_block: Option<Vec<StmtId>>,
    },
    While { cond: ExprId, body: Vec<StmtId> },
    Switch {
        subject: ExprId,
        cases: Vec<SwitchCase>,
    },
    Return(Option<ExprId>),
    Block(Vec<StmtId>),
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub pos: SourcePos,
}

#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub name: Atom,
    pub ty: Option<TypeRef>,
    /// Default value expression; trailing defaulted parameters make the
    /// symbol resolver synthesize reduced-arity candidates.
    pub default: Option<ExprId>,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: Atom,
    pub type_params: Vec<TypeParamRef>,
    pub params: Vec<ParamDecl>,
    /// `None` means an undeclared (`def`) return type, inferred on demand.
    pub ret: Option<TypeRef>,
    pub body: Option<Vec<StmtId>>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_varargs: bool,
    pub span: Span,
    pub pos: SourcePos,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: Atom,
    pub ty: Option<TypeRef>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub init: Option<ExprId>,
}

/// A declared property: a field with synthesized accessors unless the
/// class declares explicit ones.
#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub name: Atom,
    pub ty: Option<TypeRef>,
    pub is_static: bool,
    pub init: Option<ExprId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: Atom,
    pub package: Option<Atom>,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub type_params: Vec<TypeParamRef>,
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub fields: Vec<FieldDecl>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
    pub ctors: Vec<MethodDecl>,
    pub span: Span,
    pub pos: SourcePos,
}

/// One compilation unit: class declarations plus optional script-level
/// statements (checked as an implicit run method).
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub classes: Vec<ClassDecl>,
    pub script: Vec<StmtId>,
    pub arena: HirArena,
}

/// Typed arenas for expressions and statements.
#[derive(Clone, Debug, Default)]
pub struct HirArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl HirArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}
