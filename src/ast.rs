use std::fmt;
use std::rc::Rc;

use crate::diagnostics::Position;

/// Static type of an Aud expression or declaration.
///
/// `Null` is internal: it is the type of the `null` literal and of the
/// elements of an empty list literal. It never appears in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    Void,
    Bool,
    Int,
    Float,
    Str,
    Folder,
    File,
    Audio,
    List(Box<TypeSignature>),
    Null,
}

impl TypeSignature {
    /// Composite types are handles with reference semantics and may hold
    /// `null`.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            TypeSignature::Folder
                | TypeSignature::File
                | TypeSignature::Audio
                | TypeSignature::List(_)
        )
    }

    /// Whether a value of type `actual` may be bound where `self` is
    /// declared. Types must match exactly; composites also accept `null`.
    pub fn accepts(&self, actual: &TypeSignature) -> bool {
        if self == actual {
            return true;
        }
        match (self, actual) {
            (declared, TypeSignature::Null) if declared.is_composite() => true,
            (TypeSignature::List(declared), TypeSignature::List(actual)) => {
                declared.accepts(actual)
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Void => write!(f, "void"),
            TypeSignature::Bool => write!(f, "bool"),
            TypeSignature::Int => write!(f, "int"),
            TypeSignature::Float => write!(f, "float"),
            TypeSignature::Str => write!(f, "string"),
            TypeSignature::Folder => write!(f, "Folder"),
            TypeSignature::File => write!(f, "File"),
            TypeSignature::Audio => write!(f, "Audio"),
            TypeSignature::List(element) => write!(f, "List<{element}>"),
            TypeSignature::Null => write!(f, "null"),
        }
    }
}

/// Signature of a callable: parameter types and return type.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTypeSignature {
    pub params: Vec<TypeSignature>,
    pub return_type: TypeSignature,
}

impl FunctionTypeSignature {
    pub fn new(params: Vec<TypeSignature>, return_type: TypeSignature) -> Self {
        Self {
            params,
            return_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Less
                | BinaryOp::LessEq
                | BinaryOp::Greater
                | BinaryOp::GreaterEq
        )
    }
}

/// Domain constructor named in source (`Folder(..)`, `File(..)`,
/// `Audio(..)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorType {
    Folder,
    File,
    Audio,
}

impl CtorType {
    pub fn name(self) -> &'static str {
        match self {
            CtorType::Folder => "Folder",
            CtorType::File => "File",
            CtorType::Audio => "Audio",
        }
    }

    pub fn signature(self) -> TypeSignature {
        match self {
            CtorType::Folder => TypeSignature::Folder,
            CtorType::File => TypeSignature::File,
            CtorType::Audio => TypeSignature::Audio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit {
        value: i64,
        position: Position,
    },
    FloatLit {
        value: f64,
        position: Position,
    },
    StringLit {
        value: String,
        position: Position,
    },
    BoolLit {
        value: bool,
        position: Position,
    },
    NullLit {
        position: Position,
    },
    Ident {
        name: String,
        position: Position,
    },
    /// Unary minus.
    Negate {
        operand: Box<Expr>,
        position: Position,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: Position,
    },
    /// Free function call `name(args)`.
    Call {
        name: String,
        args: Vec<Expr>,
        position: Position,
    },
    /// `target.name` (attribute read) or `target.name(args)` (method
    /// call), depending on whether `args` is present.
    Member {
        target: Box<Expr>,
        name: String,
        args: Option<Vec<Expr>>,
        position: Position,
    },
    Ctor {
        ctor: CtorType,
        args: Vec<Expr>,
        position: Position,
    },
    ListLit {
        items: Vec<Expr>,
        position: Position,
    },
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::IntLit { position, .. }
            | Expr::FloatLit { position, .. }
            | Expr::StringLit { position, .. }
            | Expr::BoolLit { position, .. }
            | Expr::NullLit { position }
            | Expr::Ident { position, .. }
            | Expr::Negate { position, .. }
            | Expr::Binary { position, .. }
            | Expr::Call { position, .. }
            | Expr::Member { position, .. }
            | Expr::Ctor { position, .. }
            | Expr::ListLit { position, .. } => *position,
        }
    }
}

/// Left-hand side of an assignment. Member targets parse but are always
/// rejected by the type checker (attributes are read-only).
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name {
        name: String,
        position: Position,
    },
    Member {
        target: Box<Expr>,
        name: String,
        position: Position,
    },
}

impl AssignTarget {
    pub fn position(&self) -> Position {
        match self {
            AssignTarget::Name { position, .. } | AssignTarget::Member { position, .. } => {
                *position
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeSignature,
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub return_type: TypeSignature,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl {
        ty: TypeSignature,
        name: String,
        init: Expr,
        position: Position,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        position: Position,
    },
    If {
        condition: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
        position: Position,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        position: Position,
    },
    Expr {
        expr: Expr,
        position: Position,
    },
    Return {
        value: Option<Expr>,
        position: Position,
    },
    /// Only valid at top level; the parser rejects nested definitions.
    FuncDef(Rc<FuncDef>),
}

impl Stmt {
    pub fn position(&self) -> Position {
        match self {
            Stmt::VarDecl { position, .. }
            | Stmt::Assign { position, .. }
            | Stmt::If { position, .. }
            | Stmt::While { position, .. }
            | Stmt::Expr { position, .. }
            | Stmt::Return { position, .. } => *position,
            Stmt::FuncDef(def) => def.position,
        }
    }
}

/// A parsed program: top-level statements and function definitions in
/// source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
