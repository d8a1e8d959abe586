use crate::diagnostics::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Keywords
    Func,
    Void,
    IntKw,
    FloatKw,
    BoolKw,
    StringKw,
    Folder,
    File,
    Audio,
    List,
    If,
    Else,
    While,
    Return,
    True,
    False,
    Null,

    // Operators
    Assign,    // =
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Eq,        // ==
    NotEq,     // !=
    Less,      // <
    LessEq,    // <=
    Greater,   // >
    GreaterEq, // >=
    And,       // &&
    Or,        // ||

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "func" => TokenKind::Func,
            "void" => TokenKind::Void,
            "int" => TokenKind::IntKw,
            "float" => TokenKind::FloatKw,
            "bool" => TokenKind::BoolKw,
            "string" => TokenKind::StringKw,
            "Folder" => TokenKind::Folder,
            "File" => TokenKind::File,
            "Audio" => TokenKind::Audio,
            "List" => TokenKind::List,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "return" => TokenKind::Return,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// Type keywords that can open a variable declaration.
    pub fn starts_type(&self) -> bool {
        matches!(
            self,
            TokenKind::IntKw
                | TokenKind::FloatKw
                | TokenKind::BoolKw
                | TokenKind::StringKw
                | TokenKind::Folder
                | TokenKind::File
                | TokenKind::Audio
                | TokenKind::List
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}
