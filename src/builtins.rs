use crate::ast::{FunctionTypeSignature, TypeSignature};

/// The fixed set of built-in functions. Dispatch lives in the
/// interpreter; signatures live here so the type checker sees the same
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Input,
    Btos,
    Stoi,
    Itos,
    Stof,
    Ftos,
    Itof,
    Ftoi,
    Atof,
    Ftoa,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Input => "input",
            Self::Btos => "btos",
            Self::Stoi => "stoi",
            Self::Itos => "itos",
            Self::Stof => "stof",
            Self::Ftos => "ftos",
            Self::Itof => "itof",
            Self::Ftoi => "ftoi",
            Self::Atof => "atof",
            Self::Ftoa => "ftoa",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "print" => Self::Print,
            "input" => Self::Input,
            "btos" => Self::Btos,
            "stoi" => Self::Stoi,
            "itos" => Self::Itos,
            "stof" => Self::Stof,
            "ftos" => Self::Ftos,
            "itof" => Self::Itof,
            "ftoi" => Self::Ftoi,
            "atof" => Self::Atof,
            "ftoa" => Self::Ftoa,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn signature(self) -> FunctionTypeSignature {
        use TypeSignature::*;
        match self {
            Self::Print => FunctionTypeSignature::new(vec![Str], Void),
            Self::Input => FunctionTypeSignature::new(vec![], Str),
            Self::Btos => FunctionTypeSignature::new(vec![Bool], Str),
            Self::Stoi => FunctionTypeSignature::new(vec![Str], Int),
            Self::Itos => FunctionTypeSignature::new(vec![Int], Str),
            Self::Stof => FunctionTypeSignature::new(vec![Str], Float),
            Self::Ftos => FunctionTypeSignature::new(vec![Float], Str),
            Self::Itof => FunctionTypeSignature::new(vec![Int], Float),
            Self::Ftoi => FunctionTypeSignature::new(vec![Float], Int),
            Self::Atof => FunctionTypeSignature::new(vec![Audio], File),
            Self::Ftoa => FunctionTypeSignature::new(vec![File], Audio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for builtin in [
            Builtin::Print,
            Builtin::Input,
            Builtin::Btos,
            Builtin::Stoi,
            Builtin::Itos,
            Builtin::Stof,
            Builtin::Ftos,
            Builtin::Itof,
            Builtin::Ftoi,
            Builtin::Atof,
            Builtin::Ftoa,
        ] {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(Builtin::from_name("explode"), None);
    }
}
