use crate::{
    tokenizer::{tokenize, Token},
    types::{IrDocument, IrField, IrObject, IrValue},
};

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::str::FromStr;
use vehicle_wire_schema::{
    error::{FieldPath, Result, WireError},
    utils::{quote, unquote},
};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap();
    static ref SIGNED_SPECIAL: Regex = Regex::new(r"^[-+](inf|NaN)$").unwrap();
    static ref COLON: Regex = Regex::new(r"^:$").unwrap();
    static ref SEMICOLON: Regex = Regex::new(r"^;$").unwrap();
    static ref COMMA: Regex = Regex::new(r"^,$").unwrap();
    static ref LEFT_BRACE: Regex = Regex::new(r"^\{$").unwrap();
    static ref RIGHT_BRACE: Regex = Regex::new(r"^\}$").unwrap();
    static ref LEFT_BRACKET: Regex = Regex::new(r"^\[$").unwrap();
    static ref RIGHT_BRACKET: Regex = Regex::new(r"^\]$").unwrap();
    static ref END_OF_FILE: Regex = Regex::new(r"^$").unwrap();
}

/// Deepest object nesting a document may have. Registered schemas nest a few
/// levels and may not recurse.
pub const MAX_NESTING: usize = 64;

/// Parses IR text of the form
///
/// ```text
/// VehicleState {
///   vehicle_id: "ADV_2025_001";
///   sensor_data: [
///     { type: LIDAR; max_range: 200.0; },
///   ];
/// }
/// ```
///
/// Only the syntax is checked here; field names and kinds are checked against
/// a schema by the transcoder.
pub fn parse_document(text: &str) -> Result<IrDocument> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        index:  0,
        depth:  0,
    };

    let name = parser.current().text.clone();
    parser.expect(&IDENTIFIER, "message type name", &FieldPath::root())?;
    let root = parser.parse_object(&FieldPath::root())?;
    parser.expect(&END_OF_FILE, "end of input", &FieldPath::root())?;

    Ok(IrDocument::new(&name, root))
}

impl FromStr for IrDocument {
    type Err = WireError;

    fn from_str(text: &str) -> Result<IrDocument> {
        parse_document(text)
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    index:  usize,
    depth:  usize,
}

impl<'t> Parser<'t> {
    fn current(&self) -> &'t Token {
        // The tokenizer always ends the stream with an end-of-input token
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    fn eat(&mut self, test: &Regex) -> bool {
        if test.is_match(&self.current().text) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, token: &Token, path: &FieldPath, message: String) -> WireError {
        WireError::IrParse {
            path: path.clone(),
            line: token.line,
            column: token.column,
            message,
        }
    }

    fn expect(&mut self, test: &Regex, expected: &str, path: &FieldPath) -> Result<()> {
        if self.eat(test) {
            return Ok(());
        }
        let token = self.current();
        Err(self.error(token, path, format!("Expected {} but found {}", expected, describe(token))))
    }

    fn parse_object(&mut self, path: &FieldPath) -> Result<IrObject> {
        let open = self.current();
        self.expect(&LEFT_BRACE, "\"{\"", path)?;
        if self.depth == MAX_NESTING {
            return Err(self.error(open, path, format!("Nesting too deep (limit {})", MAX_NESTING)));
        }
        self.depth += 1;
        let object = self.parse_fields(open, path)?;
        self.depth -= 1;
        Ok(object)
    }

    fn parse_fields(&mut self, open: &Token, path: &FieldPath) -> Result<IrObject> {
        let mut object = IrObject::new();
        let mut seen = HashSet::new();

        while !self.eat(&RIGHT_BRACE) {
            let token = self.current();
            if token.is_eof() {
                return Err(self.error(
                    open,
                    path,
                    format!("Unterminated object opened at line {}", open.line),
                ));
            }
            self.expect(&IDENTIFIER, "field name", path)?;

            let field_path = path.child(&token.text);
            if !seen.insert(token.text.as_str()) {
                return Err(self.error(
                    token,
                    &field_path,
                    format!("Duplicate field {}", quote(&token.text)),
                ));
            }

            self.expect(&COLON, "\":\"", &field_path)?;
            let value = self.parse_value(path, &token.text)?;
            self.expect(&SEMICOLON, "\";\"", &field_path)?;

            object.fields.push(IrField {
                name: token.text.clone(),
                value,
                line: token.line,
                column: token.column,
            });
        }

        Ok(object)
    }

    fn parse_value(&mut self, parent: &FieldPath, name: &str) -> Result<IrValue> {
        let path = parent.child(name);
        let token = self.current();

        if token.text.starts_with('"') {
            self.index += 1;
            return match unquote(&token.text) {
                Some(text) => Ok(IrValue::Text(text)),
                None => Err(self.error(token, &path, format!("Unterminated string literal {}", token.text))),
            };
        }

        if LEFT_BRACE.is_match(&token.text) {
            return Ok(IrValue::Object(self.parse_object(&path)?));
        }

        if self.eat(&LEFT_BRACKET) {
            let mut items = Vec::new();
            loop {
                if self.eat(&RIGHT_BRACKET) {
                    break;
                }
                if self.current().is_eof() {
                    return Err(self.error(
                        token,
                        &path,
                        format!("Unterminated list opened at line {}", token.line),
                    ));
                }
                items.push(self.parse_object(&parent.element(name, items.len()))?);
                if !self.eat(&COMMA) {
                    self.expect(&RIGHT_BRACKET, "\",\" or \"]\"", &path)?;
                    break;
                }
            }
            return Ok(IrValue::List(items));
        }

        if is_atom(&token.text) {
            self.index += 1;
            return Ok(IrValue::Atom(token.text.clone()));
        }

        let message = if token.is_eof() {
            "Unexpected end of input".to_owned()
        } else {
            format!("Invalid literal {}", quote(&token.text))
        };
        Err(self.error(token, &path, message))
    }
}

/// Decimal numbers, identifiers (booleans, enum labels, `inf`, `NaN`) and
/// signed `inf`/`NaN`.
fn is_atom(text: &str) -> bool {
    NUMBER.is_match(text) || IDENTIFIER.is_match(text) || SIGNED_SPECIAL.is_match(text)
}

fn describe(token: &Token) -> String {
    if token.is_eof() {
        "end of input".to_owned()
    } else {
        quote(&token.text)
    }
}
