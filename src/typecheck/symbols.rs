use std::collections::HashMap;

use crate::ast::{FunctionTypeSignature, TypeSignature};
use crate::diagnostics::Position;

/// Lexical scope stack for the type checker. Declarations go into the
/// innermost frame; lookup walks outward. Same-frame redeclaration is an
/// error at the caller's discretion (the checker reports it).
pub struct SymbolTable {
    frames: Vec<HashMap<String, (TypeSignature, Position)>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the outermost frame");
        self.frames.pop();
    }

    /// Declares in the current frame. `false` when the name is already
    /// present in that frame (shadowing an outer frame is fine).
    pub fn declare(&mut self, name: &str, ty: TypeSignature, position: Position) -> bool {
        let frame = self.frames.last_mut().expect("frame stack is never empty");
        if frame.contains_key(name) {
            return false;
        }
        frame.insert(name.to_string(), (ty, position));
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeSignature> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).map(|(ty, _)| ty))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of a readable attribute on a domain value. `Audio` sees `File`
/// attributes as well.
pub fn attribute_type(receiver: &TypeSignature, name: &str) -> Option<TypeSignature> {
    match receiver {
        TypeSignature::File => file_attribute(name),
        TypeSignature::Audio => match name {
            "length" => Some(TypeSignature::Int),
            "bitrate" => Some(TypeSignature::Int),
            "title" => Some(TypeSignature::Str),
            _ => file_attribute(name),
        },
        TypeSignature::Folder => match name {
            "is_root" => Some(TypeSignature::Bool),
            "name" => Some(TypeSignature::Str),
            "files" => Some(TypeSignature::List(Box::new(TypeSignature::File))),
            "subfolders" => Some(TypeSignature::List(Box::new(TypeSignature::Folder))),
            _ => None,
        },
        _ => None,
    }
}

fn file_attribute(name: &str) -> Option<TypeSignature> {
    match name {
        "filename" => Some(TypeSignature::Str),
        "parent" => Some(TypeSignature::Folder),
        _ => None,
    }
}

/// Signature of a method on a domain value. `List` methods are
/// parametrized by the receiver's element type; `Audio` falls back to
/// `File` methods.
pub fn method_signature(receiver: &TypeSignature, name: &str) -> Option<FunctionTypeSignature> {
    use TypeSignature::*;
    match receiver {
        List(element) => {
            let element = (**element).clone();
            match name {
                "len" => Some(FunctionTypeSignature::new(vec![], Int)),
                "get" => Some(FunctionTypeSignature::new(vec![Int], element)),
                "set" => Some(FunctionTypeSignature::new(vec![Int, element], Void)),
                _ => None,
            }
        }
        File => file_method(name),
        Audio => match name {
            "cut" => Some(FunctionTypeSignature::new(vec![Int, Int], Void)),
            "concat" => Some(FunctionTypeSignature::new(vec![Audio], Void)),
            "change_title" => Some(FunctionTypeSignature::new(vec![Str], Void)),
            "change_format" => Some(FunctionTypeSignature::new(vec![Str], Void)),
            "change_volume" => Some(FunctionTypeSignature::new(vec![Float], Void)),
            _ => file_method(name),
        },
        Folder => match name {
            "get_file" => Some(FunctionTypeSignature::new(vec![Str], File)),
            "add_file" => Some(FunctionTypeSignature::new(vec![File], Void)),
            "remove_file" => Some(FunctionTypeSignature::new(vec![Str], Void)),
            "get_subfolder" => Some(FunctionTypeSignature::new(vec![Str], Folder)),
            "list_audio" => Some(FunctionTypeSignature::new(
                vec![],
                List(Box::new(Audio)),
            )),
            _ => None,
        },
        _ => None,
    }
}

fn file_method(name: &str) -> Option<FunctionTypeSignature> {
    use TypeSignature::*;
    match name {
        "move" => Some(FunctionTypeSignature::new(vec![Folder], Void)),
        "delete" => Some(FunctionTypeSignature::new(vec![], Void)),
        "change_filename" => Some(FunctionTypeSignature::new(vec![Str], Void)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_in_nested_frame_is_allowed() {
        let mut table = SymbolTable::new();
        assert!(table.declare("x", TypeSignature::Int, Position::new(1, 1)));
        table.push_frame();
        assert!(table.declare("x", TypeSignature::Str, Position::new(2, 1)));
        assert_eq!(table.lookup("x"), Some(&TypeSignature::Str));
        table.pop_frame();
        assert_eq!(table.lookup("x"), Some(&TypeSignature::Int));
    }

    #[test]
    fn same_frame_redeclaration_is_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.declare("x", TypeSignature::Int, Position::new(1, 1)));
        assert!(!table.declare("x", TypeSignature::Int, Position::new(1, 9)));
    }

    #[test]
    fn audio_inherits_file_members() {
        assert_eq!(
            attribute_type(&TypeSignature::Audio, "filename"),
            Some(TypeSignature::Str)
        );
        assert!(method_signature(&TypeSignature::Audio, "move").is_some());
        assert!(method_signature(&TypeSignature::File, "cut").is_none());
    }

    #[test]
    fn list_methods_follow_element_type() {
        let list = TypeSignature::List(Box::new(TypeSignature::Str));
        let get = method_signature(&list, "get").expect("get must exist");
        assert_eq!(get.return_type, TypeSignature::Str);
        let set = method_signature(&list, "set").expect("set must exist");
        assert_eq!(set.params, vec![TypeSignature::Int, TypeSignature::Str]);
    }
}
