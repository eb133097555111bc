//! Toy C front end backing the stub
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Understands just enough C to produce realistic trees for tests: global
//! variables, function prototypes and definitions with parameters, and
//! function bodies made of `return` and expression statements over
//! identifiers, integer literals, calls and the four arithmetic operators.
//! Anything else produces a clang-style diagnostic and recovers at the next
//! `;` or `}`.

use clangbind_ffi::{CursorKind, Severity, TokenKind, TypeKind};
use std::collections::HashMap;

const TYPE_KEYWORDS: &[&str] = &["void", "char", "short", "int", "long", "float", "double"];
const OTHER_KEYWORDS: &[&str] = &[
    "return", "if", "else", "while", "for", "struct", "const", "static", "unsigned", "signed",
];

/// One lexical token
#[derive(Debug, Clone)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub start: u32,
    pub end: u32,
}

/// One node of the parsed tree
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: CursorKind,
    pub spelling: Vec<u8>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub ty: usize,
    pub referenced: Option<usize>,
    pub has_body: bool,
    pub location: u32,
    pub start: u32,
    pub end: u32,
}

/// One entry of the per-unit type table; index 0 is the invalid type
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub spelling: String,
    pub pointee: Option<usize>,
    pub result: Option<usize>,
}

/// One diagnostic
#[derive(Debug, Clone)]
pub struct DiagInfo {
    pub severity: Severity,
    pub message: String,
    pub offset: u32,
}

/// Everything the stub knows about a parsed source
#[derive(Debug, Clone, Default)]
pub struct Syntax {
    pub source: Vec<u8>,
    pub lexemes: Vec<Lexeme>,
    pub nodes: Vec<Node>,
    pub types: Vec<TypeInfo>,
    pub diagnostics: Vec<DiagInfo>,
}

impl Syntax {
    /// Lex and parse `source`, naming the root after `filename`
    pub fn parse(filename: &str, source: &[u8]) -> Syntax {
        let lexemes = lex(source);
        let mut parser = Parser {
            source,
            lexemes: &lexemes,
            pos: 0,
            syntax: Syntax {
                source: source.to_vec(),
                lexemes: Vec::new(),
                nodes: Vec::new(),
                types: vec![TypeInfo {
                    kind: TypeKind::INVALID,
                    spelling: String::new(),
                    pointee: None,
                    result: None,
                }],
                diagnostics: Vec::new(),
            },
            interned: HashMap::new(),
            scopes: vec![HashMap::new()],
        };
        parser.push_node(None, CursorKind::TRANSLATION_UNIT, filename.as_bytes(), 0, 0, 0);
        parser.syntax.nodes[0].end = source.len() as u32;
        parser.translation_unit();

        let mut syntax = parser.syntax;
        syntax.lexemes = lexemes;
        syntax
    }

    /// 1-based line and column for a byte offset
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        let offset = (offset as usize).min(self.source.len());
        let before = &self.source[..offset];
        let line = before.iter().filter(|b| **b == b'\n').count() as u32 + 1;
        let line_start = before.iter().rposition(|b| *b == b'\n').map(|p| p + 1).unwrap_or(0);
        (line, (offset - line_start) as u32 + 1)
    }

    /// Byte offset for a 1-based line and column, clamped to the source
    pub fn offset_of(&self, line: u32, column: u32) -> u32 {
        let mut current = 1;
        let mut line_start = 0usize;
        if line > 1 {
            for (i, b) in self.source.iter().enumerate() {
                if *b == b'\n' {
                    current += 1;
                    if current == line {
                        line_start = i + 1;
                        break;
                    }
                }
            }
        }
        let offset = line_start + column.saturating_sub(1) as usize;
        offset.min(self.source.len()) as u32
    }

    /// Deepest node whose extent contains `offset`
    pub fn node_at(&self, offset: u32) -> usize {
        let mut current = 0;
        'descend: loop {
            for child in &self.nodes[current].children {
                let node = &self.nodes[*child];
                if node.start <= offset && offset < node.end {
                    current = *child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Defining declaration of the entity `node` declares or names
    pub fn definition_of(&self, node: usize) -> Option<usize> {
        let target = self.nodes[node].referenced?;
        let decl = &self.nodes[target];
        match decl.kind {
            CursorKind::FUNCTION_DECL if decl.has_body => Some(target),
            CursorKind::FUNCTION_DECL => self.nodes.iter().position(|n| {
                n.kind == CursorKind::FUNCTION_DECL && n.has_body && n.spelling == decl.spelling
            }),
            CursorKind::VAR_DECL | CursorKind::PARM_DECL => Some(target),
            _ => None,
        }
    }

    /// Text of a token
    pub fn token_text(&self, lexeme: &Lexeme) -> &[u8] {
        &self.source[lexeme.start as usize..lexeme.end as usize]
    }
}

fn lex(source: &[u8]) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut i = 0;
    while i < source.len() {
        let c = source[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if source[i..].starts_with(b"//") {
            while i < source.len() && source[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if source[i..].starts_with(b"/*") {
            i += 2;
            while i < source.len() && !source[i..].starts_with(b"*/") {
                i += 1;
            }
            i = (i + 2).min(source.len());
            continue;
        }

        let start = i;
        let kind = if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 {
            while i < source.len() && (source[i].is_ascii_alphanumeric() || source[i] == b'_' || source[i] >= 0x80) {
                i += 1;
            }
            let word = &source[start..i];
            let is_keyword = TYPE_KEYWORDS
                .iter()
                .chain(OTHER_KEYWORDS.iter())
                .any(|k| k.as_bytes() == word);
            if is_keyword {
                TokenKind::KEYWORD
            } else {
                TokenKind::IDENTIFIER
            }
        } else if c.is_ascii_digit() {
            while i < source.len() && source[i].is_ascii_alphanumeric() {
                i += 1;
            }
            TokenKind::LITERAL
        } else if c == b'"' {
            i += 1;
            while i < source.len() && source[i] != b'"' && source[i] != b'\n' {
                i += 1;
            }
            i = (i + 1).min(source.len());
            TokenKind::LITERAL
        } else {
            i += 1;
            TokenKind::PUNCTUATION
        };
        lexemes.push(Lexeme {
            kind,
            start: start as u32,
            end: i as u32,
        });
    }
    lexemes
}

struct Parser<'a> {
    source: &'a [u8],
    lexemes: &'a [Lexeme],
    pos: usize,
    syntax: Syntax,
    interned: HashMap<String, usize>,
    scopes: Vec<HashMap<Vec<u8>, usize>>,
}

impl<'a> Parser<'a> {
    fn translation_unit(&mut self) {
        while self.pos < self.lexemes.len() {
            let before = self.pos;
            if self.external_declaration().is_none() {
                self.recover();
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
    }

    fn external_declaration(&mut self) -> Option<()> {
        let base = self.type_specifier()?;
        let (ty, name, name_at) = self.declarator(base)?;

        if self.peek_is(b"(") {
            return self.function(ty, name, name_at);
        }

        let node = self.push_node(Some(0), CursorKind::VAR_DECL, &name, name_at, self.start_of_decl(), name_at);
        self.syntax.nodes[node].ty = ty;
        self.syntax.nodes[node].referenced = Some(node);
        self.declare(name, node);
        if self.eat(b"=") {
            self.expression(node)?;
        }
        self.expect_semicolon("expected ';' after top level declarator")?;
        self.finish(node);
        Some(())
    }

    fn function(&mut self, result: usize, name: Vec<u8>, name_at: u32) -> Option<()> {
        let start = self.start_of_decl();
        let node = self.push_node(Some(0), CursorKind::FUNCTION_DECL, &name, name_at, start, name_at);
        self.syntax.nodes[node].referenced = Some(node);
        self.declare(name, node);
        self.eat(b"(");

        let mut params = Vec::new();
        self.scopes.push(HashMap::new());
        if self.peek_word(b"void") && self.peek_is_at(1, b")") {
            self.pos += 1;
        }
        while !self.peek_is(b")") {
            let param_start = self.current_start();
            let base = match self.type_specifier() {
                Some(base) => base,
                None => {
                    self.scopes.pop();
                    return None;
                }
            };
            let mut ty = base;
            while self.eat(b"*") {
                ty = self.pointer_to(ty);
            }
            let (param_name, param_at) = match self.peek_kind() {
                Some(TokenKind::IDENTIFIER) => {
                    let lexeme = &self.lexemes[self.pos];
                    self.pos += 1;
                    (self.text(lexeme).to_vec(), lexeme.start)
                }
                _ => (Vec::new(), param_start),
            };
            let param = self.push_node(Some(node), CursorKind::PARM_DECL, &param_name, param_at, param_start, param_at);
            self.syntax.nodes[param].ty = ty;
            self.syntax.nodes[param].referenced = Some(param);
            self.finish(param);
            if !param_name.is_empty() {
                self.declare(param_name, param);
            }
            params.push(ty);
            if !self.eat(b",") {
                break;
            }
        }
        if !self.eat(b")") {
            self.scopes.pop();
            self.error_here("expected ')'");
            return None;
        }

        let function_type = self.function_type(result, &params);
        self.syntax.nodes[node].ty = function_type;

        if self.eat(b";") {
            self.scopes.pop();
            self.finish(node);
            return Some(());
        }
        if !self.peek_is(b"{") {
            self.scopes.pop();
            self.error_here("expected function body after function declarator");
            return None;
        }

        self.syntax.nodes[node].has_body = true;
        let returns = self.compound(node);
        self.scopes.pop();
        let returns = returns?;
        if !returns && self.syntax.types[result].kind != TypeKind::VOID {
            let close = self.syntax.nodes[node].end.saturating_sub(1);
            self.syntax.diagnostics.push(DiagInfo {
                severity: Severity::WARNING,
                message: "non-void function does not return a value".to_string(),
                offset: close,
            });
        }
        Some(())
    }

    /// Parses `{ ... }` under `parent`; reports whether a `return` was seen
    fn compound(&mut self, parent: usize) -> Option<bool> {
        let open = self.current_start();
        let block = self.push_node(Some(parent), CursorKind::COMPOUND_STMT, b"", open, open, open);
        self.eat(b"{");
        let mut returns = false;
        loop {
            if self.pos >= self.lexemes.len() {
                self.error_at(self.source.len() as u32, "expected '}'");
                self.finish_at(block, self.source.len() as u32);
                self.finish_at(parent, self.source.len() as u32);
                return None;
            }
            if self.eat(b"}") {
                break;
            }
            let before = self.pos;
            match self.statement(block) {
                Some(r) => returns |= r,
                None => self.recover_statement(),
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.finish(block);
        self.finish(parent);
        Some(returns)
    }

    fn statement(&mut self, parent: usize) -> Option<bool> {
        if self.peek_is(b"{") {
            return self.compound(parent);
        }
        if self.peek_word(b"return") {
            let at = self.current_start();
            self.pos += 1;
            let stmt = self.push_node(Some(parent), CursorKind::RETURN_STMT, b"", at, at, at);
            if !self.peek_is(b";") {
                self.expression(stmt)?;
            }
            self.expect_semicolon("expected ';' after return statement")?;
            self.finish(stmt);
            return Some(true);
        }
        self.expression(parent)?;
        self.expect_semicolon("expected ';' after expression")?;
        Some(false)
    }

    fn expression(&mut self, parent: usize) -> Option<usize> {
        let start = self.current_start();
        let mut lhs = self.primary(parent)?;
        while self.peek_operator().is_some() {
            let op_at = self.current_start();
            self.pos += 1;
            let binary = self.push_node(Some(parent), CursorKind::BINARY_OPERATOR, b"", op_at, start, op_at);
            self.reparent(lhs, binary);
            self.primary(binary)?;
            let ty = self.syntax.nodes[lhs].ty;
            self.syntax.nodes[binary].ty = ty;
            self.finish(binary);
            lhs = binary;
        }
        Some(lhs)
    }

    fn primary(&mut self, parent: usize) -> Option<usize> {
        let lexeme = match self.lexemes.get(self.pos) {
            Some(lexeme) => lexeme.clone(),
            None => {
                self.error_at(self.source.len() as u32, "expected expression");
                return None;
            }
        };
        match lexeme.kind {
            TokenKind::LITERAL => {
                self.pos += 1;
                let node = self.push_node(Some(parent), CursorKind::INTEGER_LITERAL, b"", lexeme.start, lexeme.start, lexeme.start);
                self.syntax.nodes[node].ty = self.builtin("int");
                self.finish(node);
                Some(node)
            }
            TokenKind::IDENTIFIER => {
                self.pos += 1;
                let name = self.text(&lexeme).to_vec();
                let target = match self.lookup(&name) {
                    Some(target) => target,
                    None => {
                        let message = format!(
                            "use of undeclared identifier '{}'",
                            String::from_utf8_lossy(&name)
                        );
                        self.error_at(lexeme.start, &message);
                        return None;
                    }
                };
                if self.peek_is(b"(") {
                    return self.call(parent, name, target, lexeme.start);
                }
                let node = self.push_node(Some(parent), CursorKind::DECL_REF_EXPR, &name, lexeme.start, lexeme.start, lexeme.start);
                self.syntax.nodes[node].referenced = Some(target);
                self.syntax.nodes[node].ty = self.syntax.nodes[target].ty;
                self.finish(node);
                Some(node)
            }
            TokenKind::PUNCTUATION if self.text(&lexeme) == b"(" => {
                self.pos += 1;
                let node = self.push_node(Some(parent), CursorKind::PAREN_EXPR, b"", lexeme.start, lexeme.start, lexeme.start);
                let inner = self.expression(node)?;
                if !self.eat(b")") {
                    self.error_here("expected ')'");
                    return None;
                }
                self.syntax.nodes[node].ty = self.syntax.nodes[inner].ty;
                self.finish(node);
                Some(node)
            }
            _ => {
                self.error_at(lexeme.start, "expected expression");
                None
            }
        }
    }

    fn call(&mut self, parent: usize, name: Vec<u8>, target: usize, at: u32) -> Option<usize> {
        let node = self.push_node(Some(parent), CursorKind::CALL_EXPR, &name, at, at, at);
        self.syntax.nodes[node].referenced = Some(target);
        let callee_type = self.syntax.nodes[target].ty;
        self.syntax.nodes[node].ty = self.syntax.types[callee_type].result.unwrap_or(0);

        let callee = self.push_node(Some(node), CursorKind::DECL_REF_EXPR, &name, at, at, at);
        self.syntax.nodes[callee].referenced = Some(target);
        self.syntax.nodes[callee].ty = callee_type;
        self.syntax.nodes[callee].end = at + name.len() as u32;

        self.eat(b"(");
        while !self.peek_is(b")") {
            self.expression(node)?;
            if !self.eat(b",") {
                break;
            }
        }
        if !self.eat(b")") {
            self.error_here("expected ')'");
            return None;
        }
        self.finish(node);
        Some(node)
    }

    fn type_specifier(&mut self) -> Option<usize> {
        let lexeme = match self.lexemes.get(self.pos) {
            Some(lexeme) => lexeme.clone(),
            None => {
                self.error_at(self.source.len() as u32, "expected a type");
                return None;
            }
        };
        let word = self.text(&lexeme).to_vec();
        if let Some(keyword) = TYPE_KEYWORDS.iter().find(|k| k.as_bytes() == word.as_slice()) {
            self.pos += 1;
            return Some(self.builtin(keyword));
        }
        let message = if lexeme.kind == TokenKind::IDENTIFIER {
            format!("unknown type name '{}'", String::from_utf8_lossy(&word))
        } else {
            "expected identifier or '('".to_string()
        };
        self.error_at(lexeme.start, &message);
        None
    }

    fn declarator(&mut self, base: usize) -> Option<(usize, Vec<u8>, u32)> {
        let mut ty = base;
        while self.eat(b"*") {
            ty = self.pointer_to(ty);
        }
        match self.lexemes.get(self.pos) {
            Some(lexeme) if lexeme.kind == TokenKind::IDENTIFIER => {
                let lexeme = lexeme.clone();
                self.pos += 1;
                Some((ty, self.text(&lexeme).to_vec(), lexeme.start))
            }
            Some(lexeme) => {
                let at = lexeme.start;
                self.error_at(at, "expected identifier or '('");
                None
            }
            None => {
                self.error_at(self.source.len() as u32, "expected identifier or '('");
                None
            }
        }
    }

    fn builtin(&mut self, keyword: &str) -> usize {
        let kind = match keyword {
            "void" => TypeKind::VOID,
            "char" => TypeKind::CHAR_S,
            "short" => TypeKind::SHORT,
            "long" => TypeKind::LONG,
            "float" => TypeKind::FLOAT,
            "double" => TypeKind::DOUBLE,
            _ => TypeKind::INT,
        };
        self.intern(keyword.to_string(), kind, None, None)
    }

    fn pointer_to(&mut self, pointee: usize) -> usize {
        let spelling = format!("{} *", self.syntax.types[pointee].spelling);
        self.intern(spelling, TypeKind::POINTER, Some(pointee), None)
    }

    fn function_type(&mut self, result: usize, params: &[usize]) -> usize {
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params
                .iter()
                .map(|p| self.syntax.types[*p].spelling.clone())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let spelling = format!("{} ({})", self.syntax.types[result].spelling, params);
        self.intern(spelling, TypeKind::FUNCTION_PROTO, None, Some(result))
    }

    fn intern(&mut self, spelling: String, kind: TypeKind, pointee: Option<usize>, result: Option<usize>) -> usize {
        if let Some(existing) = self.interned.get(&spelling) {
            return *existing;
        }
        self.syntax.types.push(TypeInfo {
            kind,
            spelling: spelling.clone(),
            pointee,
            result,
        });
        let id = self.syntax.types.len() - 1;
        self.interned.insert(spelling, id);
        id
    }

    fn push_node(&mut self, parent: Option<usize>, kind: CursorKind, spelling: &[u8], location: u32, start: u32, end: u32) -> usize {
        self.syntax.nodes.push(Node {
            kind,
            spelling: spelling.to_vec(),
            parent,
            children: Vec::new(),
            ty: 0,
            referenced: None,
            has_body: false,
            location,
            start,
            end,
        });
        let id = self.syntax.nodes.len() - 1;
        if let Some(parent) = parent {
            self.syntax.nodes[parent].children.push(id);
        }
        id
    }

    fn reparent(&mut self, node: usize, new_parent: usize) {
        if let Some(old) = self.syntax.nodes[node].parent {
            self.syntax.nodes[old].children.retain(|c| *c != node);
        }
        self.syntax.nodes[node].parent = Some(new_parent);
        self.syntax.nodes[new_parent].children.insert(0, node);
    }

    /// Extends `node` to cover the previous token
    fn finish(&mut self, node: usize) {
        let end = self
            .pos
            .checked_sub(1)
            .and_then(|p| self.lexemes.get(p))
            .map(|l| l.end)
            .unwrap_or(0);
        self.finish_at(node, end);
    }

    fn finish_at(&mut self, node: usize, end: u32) {
        if end > self.syntax.nodes[node].end {
            self.syntax.nodes[node].end = end;
        }
    }

    fn declare(&mut self, name: Vec<u8>, node: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, node);
        }
    }

    fn lookup(&self, name: &[u8]) -> Option<usize> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    /// Start offset of the declaration whose type specifier began the current statement
    fn start_of_decl(&self) -> u32 {
        let mut p = self.pos.saturating_sub(1);
        while p > 0 {
            let text = self.text(&self.lexemes[p - 1]);
            if text == b";" || text == b"}" || text == b"{" {
                break;
            }
            p -= 1;
        }
        self.lexemes.get(p).map(|l| l.start).unwrap_or(0)
    }

    fn current_start(&self) -> u32 {
        self.lexemes
            .get(self.pos)
            .map(|l| l.start)
            .unwrap_or(self.source.len() as u32)
    }

    fn text(&self, lexeme: &Lexeme) -> &'a [u8] {
        &self.source[lexeme.start as usize..lexeme.end as usize]
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.lexemes.get(self.pos).map(|l| l.kind)
    }

    fn peek_is(&self, punct: &[u8]) -> bool {
        self.peek_is_at(0, punct)
    }

    fn peek_is_at(&self, ahead: usize, punct: &[u8]) -> bool {
        self.lexemes
            .get(self.pos + ahead)
            .map(|l| self.text(l) == punct)
            .unwrap_or(false)
    }

    fn peek_word(&self, word: &[u8]) -> bool {
        self.peek_is(word)
    }

    fn peek_operator(&self) -> Option<u8> {
        let lexeme = self.lexemes.get(self.pos)?;
        match self.text(lexeme) {
            [op @ (b'+' | b'-' | b'*' | b'/')] => Some(*op),
            _ => None,
        }
    }

    fn eat(&mut self, punct: &[u8]) -> bool {
        if self.peek_is(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_semicolon(&mut self, message: &str) -> Option<()> {
        if self.eat(b";") {
            Some(())
        } else {
            // clang points just past the previous token
            let at = self
                .pos
                .checked_sub(1)
                .and_then(|p| self.lexemes.get(p))
                .map(|l| l.end)
                .unwrap_or(0);
            self.error_at(at, message);
            None
        }
    }

    fn error_here(&mut self, message: &str) {
        let at = self.current_start();
        self.error_at(at, message);
    }

    fn error_at(&mut self, offset: u32, message: &str) {
        self.syntax.diagnostics.push(DiagInfo {
            severity: Severity::ERROR,
            message: message.to_string(),
            offset,
        });
    }

    /// Skips to just past the next top-level `;` or `}`
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(lexeme) = self.lexemes.get(self.pos) {
            let text = self.text(lexeme);
            self.pos += 1;
            match text {
                b"{" => depth += 1,
                b"}" if depth <= 1 => return,
                b"}" => depth -= 1,
                b";" if depth == 0 => return,
                _ => {}
            }
        }
    }

    /// Skips to just past the next `;` in the current block, or stops before its `}`
    fn recover_statement(&mut self) {
        while let Some(lexeme) = self.lexemes.get(self.pos) {
            let text = self.text(lexeme);
            if text == b"}" {
                return;
            }
            self.pos += 1;
            if text == b";" {
                return;
            }
        }
    }
}
