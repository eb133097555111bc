//! Native enumeration tags
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! The native library grows these enumerations with every release, so they
//! are modelled as open newtypes over the raw tag rather than closed Rust
//! enums. Tags unknown to this crate still round-trip unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::raw::c_int;

macro_rules! native_tag {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub c_int);

        impl $name {
            $($(#[$vmeta])* pub const $variant: $name = $name($value);)*

            /// Raw native tag
            pub fn raw(self) -> c_int {
                self.0
            }

            /// Static name for tags known at build time
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($label),)*
                    _ => None,
                }
            }
        }

        impl From<c_int> for $name {
            fn from(raw: c_int) -> Self {
                $name(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(label) => write!(f, "{}", label),
                    None => write!(f, "{}({})", stringify!($name), self.0),
                }
            }
        }
    };
}

native_tag! {
    /// Kind of a cursor (`enum CXCursorKind`)
    CursorKind {
        UNEXPOSED_DECL = 1 => "UnexposedDecl",
        STRUCT_DECL = 2 => "StructDecl",
        UNION_DECL = 3 => "UnionDecl",
        CLASS_DECL = 4 => "ClassDecl",
        ENUM_DECL = 5 => "EnumDecl",
        FIELD_DECL = 6 => "FieldDecl",
        ENUM_CONSTANT_DECL = 7 => "EnumConstantDecl",
        FUNCTION_DECL = 8 => "FunctionDecl",
        VAR_DECL = 9 => "VarDecl",
        PARM_DECL = 10 => "ParmDecl",
        TYPEDEF_DECL = 20 => "TypedefDecl",
        CXX_METHOD = 21 => "CXXMethod",
        NAMESPACE = 22 => "Namespace",
        LINKAGE_SPEC = 23 => "LinkageSpec",
        CONSTRUCTOR = 24 => "Constructor",
        DESTRUCTOR = 25 => "Destructor",
        CONVERSION_FUNCTION = 26 => "ConversionFunction",
        TEMPLATE_TYPE_PARAMETER = 27 => "TemplateTypeParameter",
        NON_TYPE_TEMPLATE_PARAMETER = 28 => "NonTypeTemplateParameter",
        TEMPLATE_TEMPLATE_PARAMETER = 29 => "TemplateTemplateParameter",
        FUNCTION_TEMPLATE = 30 => "FunctionTemplate",
        CLASS_TEMPLATE = 31 => "ClassTemplate",
        CLASS_TEMPLATE_PARTIAL_SPECIALIZATION = 32 => "ClassTemplatePartialSpecialization",
        NAMESPACE_ALIAS = 33 => "NamespaceAlias",
        USING_DIRECTIVE = 34 => "UsingDirective",
        USING_DECLARATION = 35 => "UsingDeclaration",
        TYPE_ALIAS_DECL = 36 => "TypeAliasDecl",
        CXX_ACCESS_SPECIFIER = 39 => "CXXAccessSpecifier",
        TYPE_REF = 43 => "TypeRef",
        CXX_BASE_SPECIFIER = 44 => "CXXBaseSpecifier",
        TEMPLATE_REF = 45 => "TemplateRef",
        NAMESPACE_REF = 46 => "NamespaceRef",
        MEMBER_REF = 47 => "MemberRef",
        LABEL_REF = 48 => "LabelRef",
        OVERLOADED_DECL_REF = 49 => "OverloadedDeclRef",
        VARIABLE_REF = 50 => "VariableRef",
        /// Kind carried by `clang_getNullCursor()`
        INVALID_FILE = 70 => "InvalidFile",
        /// Sentinel returned by `clang_getTypeDeclaration` when no declaration exists
        NO_DECL_FOUND = 71 => "NoDeclFound",
        NOT_IMPLEMENTED = 72 => "NotImplemented",
        INVALID_CODE = 73 => "InvalidCode",
        UNEXPOSED_EXPR = 100 => "UnexposedExpr",
        DECL_REF_EXPR = 101 => "DeclRefExpr",
        MEMBER_REF_EXPR = 102 => "MemberRefExpr",
        CALL_EXPR = 103 => "CallExpr",
        BLOCK_EXPR = 105 => "BlockExpr",
        INTEGER_LITERAL = 106 => "IntegerLiteral",
        FLOATING_LITERAL = 107 => "FloatingLiteral",
        IMAGINARY_LITERAL = 108 => "ImaginaryLiteral",
        STRING_LITERAL = 109 => "StringLiteral",
        CHARACTER_LITERAL = 110 => "CharacterLiteral",
        PAREN_EXPR = 111 => "ParenExpr",
        UNARY_OPERATOR = 112 => "UnaryOperator",
        ARRAY_SUBSCRIPT_EXPR = 113 => "ArraySubscriptExpr",
        BINARY_OPERATOR = 114 => "BinaryOperator",
        COMPOUND_ASSIGN_OPERATOR = 115 => "CompoundAssignOperator",
        CONDITIONAL_OPERATOR = 116 => "ConditionalOperator",
        CSTYLE_CAST_EXPR = 117 => "CStyleCastExpr",
        COMPOUND_LITERAL_EXPR = 118 => "CompoundLiteralExpr",
        INIT_LIST_EXPR = 119 => "InitListExpr",
        UNEXPOSED_STMT = 200 => "UnexposedStmt",
        LABEL_STMT = 201 => "LabelStmt",
        COMPOUND_STMT = 202 => "CompoundStmt",
        CASE_STMT = 203 => "CaseStmt",
        DEFAULT_STMT = 204 => "DefaultStmt",
        IF_STMT = 205 => "IfStmt",
        SWITCH_STMT = 206 => "SwitchStmt",
        WHILE_STMT = 207 => "WhileStmt",
        DO_STMT = 208 => "DoStmt",
        FOR_STMT = 209 => "ForStmt",
        GOTO_STMT = 210 => "GotoStmt",
        INDIRECT_GOTO_STMT = 211 => "IndirectGotoStmt",
        CONTINUE_STMT = 212 => "ContinueStmt",
        BREAK_STMT = 213 => "BreakStmt",
        RETURN_STMT = 214 => "ReturnStmt",
        TRANSLATION_UNIT = 300 => "TranslationUnit",
        UNEXPOSED_ATTR = 400 => "UnexposedAttr",
        PREPROCESSING_DIRECTIVE = 500 => "PreprocessingDirective",
        MACRO_DEFINITION = 501 => "MacroDefinition",
        MACRO_EXPANSION = 502 => "MacroExpansion",
        INCLUSION_DIRECTIVE = 503 => "InclusionDirective",
    }
}

native_tag! {
    /// Kind of a type (`enum CXTypeKind`)
    TypeKind {
        INVALID = 0 => "Invalid",
        UNEXPOSED = 1 => "Unexposed",
        VOID = 2 => "Void",
        BOOL = 3 => "Bool",
        CHAR_U = 4 => "Char_U",
        UCHAR = 5 => "UChar",
        CHAR16 = 6 => "Char16",
        CHAR32 = 7 => "Char32",
        USHORT = 8 => "UShort",
        UINT = 9 => "UInt",
        ULONG = 10 => "ULong",
        ULONGLONG = 11 => "ULongLong",
        UINT128 = 12 => "UInt128",
        CHAR_S = 13 => "Char_S",
        SCHAR = 14 => "SChar",
        WCHAR = 15 => "WChar",
        SHORT = 16 => "Short",
        INT = 17 => "Int",
        LONG = 18 => "Long",
        LONGLONG = 19 => "LongLong",
        INT128 = 20 => "Int128",
        FLOAT = 21 => "Float",
        DOUBLE = 22 => "Double",
        LONG_DOUBLE = 23 => "LongDouble",
        NULL_PTR = 24 => "NullPtr",
        OVERLOAD = 25 => "Overload",
        DEPENDENT = 26 => "Dependent",
        COMPLEX = 100 => "Complex",
        POINTER = 101 => "Pointer",
        BLOCK_POINTER = 102 => "BlockPointer",
        LVALUE_REFERENCE = 103 => "LValueReference",
        RVALUE_REFERENCE = 104 => "RValueReference",
        RECORD = 105 => "Record",
        ENUM = 106 => "Enum",
        TYPEDEF = 107 => "Typedef",
        FUNCTION_NO_PROTO = 110 => "FunctionNoProto",
        FUNCTION_PROTO = 111 => "FunctionProto",
        CONSTANT_ARRAY = 112 => "ConstantArray",
        VECTOR = 113 => "Vector",
        INCOMPLETE_ARRAY = 114 => "IncompleteArray",
        VARIABLE_ARRAY = 115 => "VariableArray",
        DEPENDENT_SIZED_ARRAY = 116 => "DependentSizedArray",
        MEMBER_POINTER = 117 => "MemberPointer",
        AUTO = 118 => "Auto",
        ELABORATED = 119 => "Elaborated",
    }
}

native_tag! {
    /// Kind of a lexical token (`enum CXTokenKind`)
    TokenKind {
        PUNCTUATION = 0 => "Punctuation",
        KEYWORD = 1 => "Keyword",
        IDENTIFIER = 2 => "Identifier",
        LITERAL = 3 => "Literal",
        COMMENT = 4 => "Comment",
    }
}

native_tag! {
    /// Severity of a diagnostic (`enum CXDiagnosticSeverity`)
    Severity {
        IGNORED = 0 => "ignored",
        NOTE = 1 => "note",
        WARNING = 2 => "warning",
        ERROR = 3 => "error",
        FATAL = 4 => "fatal",
    }
}

native_tag! {
    /// Status returned by the error-code-reporting entry points (`enum CXErrorCode`)
    ErrorCode {
        SUCCESS = 0 => "Success",
        FAILURE = 1 => "Failure",
        CRASHED = 2 => "Crashed",
        INVALID_ARGUMENTS = 3 => "InvalidArguments",
        AST_READ_ERROR = 4 => "ASTReadError",
    }
}

impl CursorKind {
    /// Whether the tag falls in the native "invalid" band (`CXCursor_FirstInvalid..=CXCursor_LastInvalid`)
    pub fn is_invalid_tag(self) -> bool {
        (70..100).contains(&self.0)
    }
}

impl Severity {
    /// Whether the diagnostic prevents a usable result
    pub fn is_error(self) -> bool {
        self >= Severity::ERROR
    }
}
