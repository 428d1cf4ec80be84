//! Parser for type names as written in source: `uint8[3] memory`,
//! `mapping(address => bytes32)`, `function (uint256) external returns (bool)`,
//! `S[] storage` for a registered struct `S`.

use num_bigint::BigUint;
use thiserror::Error;

use super::{
    DataLocation, FunctionKind, FunctionType, StateMutability, Type, TypeRef, TypeRegistry,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTypeError {
    #[error("Unexpected end of type name, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("Unexpected '{found}' at offset {offset}, expected {expected}")]
    UnexpectedToken {
        offset: usize,
        found: String,
        expected: &'static str,
    },

    #[error("Invalid size in '{0}'")]
    InvalidSize(String),

    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Data location given for value type '{0}'")]
    LocationOnValueType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(String),
    Punct(&'static str),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Token::Word(w) | Token::Number(w) => w,
            Token::Punct(p) => p,
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseTypeError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let mut word = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((offset, Token::Word(word)));
        } else if c.is_ascii_digit() {
            let mut number = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() {
                    number.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((offset, Token::Number(number)));
        } else {
            chars.next();
            let punct = match c {
                '(' => "(",
                ')' => ")",
                '[' => "[",
                ']' => "]",
                ',' => ",",
                '=' if chars.next_if(|&(_, c)| c == '>').is_some() => "=>",
                other => {
                    return Err(ParseTypeError::UnexpectedToken {
                        offset,
                        found: other.to_string(),
                        expected: "a type name",
                    });
                }
            };
            tokens.push((offset, Token::Punct(punct)));
        }
    }
    Ok(tokens)
}

/// Parses type names, resolving user-defined names through a registry.
pub struct TypeParser<'r> {
    reg: &'r TypeRegistry,
    default_location: DataLocation,
}

struct Cursor {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self, expected: &'static str) -> Result<Token, ParseTypeError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(_, t)| t.clone())
            .ok_or(ParseTypeError::UnexpectedEnd(expected))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &'static str) -> Result<(), ParseTypeError> {
        if self.eat(punct) {
            return Ok(());
        }
        Err(self.unexpected(punct))
    }

    fn unexpected(&self, expected: &'static str) -> ParseTypeError {
        match self.tokens.get(self.pos) {
            Some((offset, token)) => ParseTypeError::UnexpectedToken {
                offset: *offset,
                found: token.text().to_string(),
                expected,
            },
            None => ParseTypeError::UnexpectedEnd(expected),
        }
    }
}

fn location_keyword(word: &str) -> Option<DataLocation> {
    match word {
        "storage" => Some(DataLocation::Storage),
        "memory" => Some(DataLocation::Memory),
        "calldata" => Some(DataLocation::CallData),
        _ => None,
    }
}

fn sized(word: &str, prefix: &str) -> Option<Result<u16, ParseTypeError>> {
    let digits = word.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(
        digits
            .parse::<u16>()
            .map_err(|_| ParseTypeError::InvalidSize(word.to_string())),
    )
}

impl<'r> TypeParser<'r> {
    /// Reference types without a location keyword end up in memory.
    pub fn new(reg: &'r TypeRegistry) -> Self {
        Self {
            reg,
            default_location: DataLocation::Memory,
        }
    }

    pub fn with_default_location(mut self, location: DataLocation) -> Self {
        self.default_location = location;
        self
    }

    /// Parse a single type name.
    pub fn parse(&self, input: &str) -> Result<TypeRef, ParseTypeError> {
        let mut cursor = Cursor {
            tokens: tokenize(input)?,
            pos: 0,
        };
        let ty = self.located(&mut cursor)?;
        match cursor.peek() {
            None => Ok(ty),
            Some(_) => Err(cursor.unexpected("end of input")),
        }
    }

    /// Parse a comma separated list of type names, e.g. `uint256,bytes`.
    pub fn parse_list(&self, input: &str) -> Result<Vec<TypeRef>, ParseTypeError> {
        let mut cursor = Cursor {
            tokens: tokenize(input)?,
            pos: 0,
        };
        let mut types = Vec::new();
        if cursor.peek().is_none() {
            return Ok(types);
        }
        loop {
            types.push(self.located(&mut cursor)?);
            if cursor.peek().is_none() {
                return Ok(types);
            }
            cursor.expect(",")?;
        }
    }

    fn located(&self, cursor: &mut Cursor) -> Result<TypeRef, ParseTypeError> {
        let ty = self.with_suffixes(cursor)?;
        let keyword = match cursor.peek() {
            Some(Token::Word(w)) => location_keyword(w),
            _ => None,
        };
        match keyword {
            Some(location) => {
                cursor.pos += 1;
                if !ty.is_reference() {
                    return Err(ParseTypeError::LocationOnValueType(ty.to_string()));
                }
                Ok(ty.with_location(location, true))
            }
            None if ty.is_reference() => Ok(ty.with_location(self.default_location, false)),
            None => Ok(ty),
        }
    }

    fn with_suffixes(&self, cursor: &mut Cursor) -> Result<TypeRef, ParseTypeError> {
        let mut ty = self.base(cursor)?;
        while cursor.eat("[") {
            let length = if cursor.eat("]") {
                None
            } else {
                let token = cursor.next("array length")?;
                let Token::Number(digits) = &token else {
                    cursor.pos -= 1;
                    return Err(cursor.unexpected("array length"));
                };
                let length = BigUint::parse_bytes(digits.as_bytes(), 10)
                    .ok_or_else(|| ParseTypeError::InvalidSize(digits.clone()))?;
                cursor.expect("]")?;
                Some(length)
            };
            ty = Type::array(self.default_location, ty, length);
        }
        Ok(ty)
    }

    fn base(&self, cursor: &mut Cursor) -> Result<TypeRef, ParseTypeError> {
        let token = cursor.next("a type name")?;
        let Token::Word(word) = token else {
            cursor.pos -= 1;
            return Err(cursor.unexpected("a type name"));
        };
        match word.as_str() {
            "address" => {
                if cursor.eat_word("payable") {
                    Ok(Type::address_payable())
                } else {
                    Ok(Type::address())
                }
            }
            "bool" => Ok(Type::boolean()),
            "string" => Ok(Type::string(self.default_location)),
            "bytes" => Ok(Type::bytes(self.default_location)),
            "byte" => Ok(Type::fixed_bytes(1)),
            "uint" => Ok(Type::uint256()),
            "int" => Ok(Type::int(256)),
            "mapping" => {
                cursor.expect("(")?;
                let key = self.with_suffixes(cursor)?;
                cursor.expect("=>")?;
                let value = self.with_suffixes(cursor)?;
                cursor.expect(")")?;
                Ok(Type::mapping(
                    key.with_location_if_reference(DataLocation::Memory),
                    value.with_location_if_reference(DataLocation::Storage),
                ))
            }
            "function" => self.function(cursor),
            _ => {
                if let Some(bits) = sized(&word, "uint") {
                    let bits = bits?;
                    return integer_bits(&word, bits).map(|b| Type::uint(b));
                }
                if let Some(bits) = sized(&word, "int") {
                    let bits = bits?;
                    return integer_bits(&word, bits).map(|b| Type::int(b));
                }
                if let Some(bytes) = sized(&word, "bytes") {
                    let bytes = bytes?;
                    if bytes == 0 || bytes > 32 {
                        return Err(ParseTypeError::InvalidSize(word));
                    }
                    return Ok(Type::fixed_bytes(bytes as u8));
                }
                self.reg
                    .named_type(&word, self.default_location)
                    .ok_or(ParseTypeError::UnknownType(word))
            }
        }
    }

    fn function(&self, cursor: &mut Cursor) -> Result<TypeRef, ParseTypeError> {
        let params = self.parameter_list(cursor)?;
        let mut kind = FunctionKind::Internal;
        let mut mutability = StateMutability::NonPayable;
        let mut returns = Vec::new();
        while let Some(Token::Word(word)) = cursor.peek().cloned() {
            if word == "internal" {
                kind = FunctionKind::Internal;
            } else if word == "external" {
                kind = FunctionKind::External;
            } else if let Some(m) = StateMutability::from_keyword(&word) {
                mutability = m;
            } else if word == "returns" {
                cursor.pos += 1;
                returns = self.parameter_list(cursor)?;
                break;
            } else {
                break;
            }
            cursor.pos += 1;
        }
        Ok(FunctionType::new(kind, params, returns, mutability).into_type())
    }

    fn parameter_list(&self, cursor: &mut Cursor) -> Result<Vec<TypeRef>, ParseTypeError> {
        cursor.expect("(")?;
        let mut params = Vec::new();
        if cursor.eat(")") {
            return Ok(params);
        }
        loop {
            params.push(self.located(cursor)?);
            if cursor.eat(")") {
                return Ok(params);
            }
            cursor.expect(",")?;
        }
    }
}

fn integer_bits(word: &str, bits: u16) -> Result<u16, ParseTypeError> {
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(ParseTypeError::InvalidSize(word.to_string()));
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elementary_types() {
        let reg = TypeRegistry::new();
        let parser = TypeParser::new(&reg);
        assert_eq!(parser.parse("uint").unwrap(), Type::uint256());
        assert_eq!(parser.parse("int24").unwrap(), Type::int(24));
        assert_eq!(parser.parse("bytes7").unwrap(), Type::fixed_bytes(7));
        assert_eq!(parser.parse("address payable").unwrap(), Type::address_payable());
        assert!(matches!(parser.parse("uint7"), Err(ParseTypeError::InvalidSize(_))));
        assert!(matches!(parser.parse("bytes33"), Err(ParseTypeError::InvalidSize(_))));
    }

    #[test]
    fn arrays_and_locations() {
        let reg = TypeRegistry::new();
        let parser = TypeParser::new(&reg);
        let ty = parser.parse("uint8[3][] calldata").unwrap();
        assert_eq!(ty.identifier(), "t_array$_t_array$_t_uint8_$3_calldata_ptr_$dyn_calldata_ptr");
        let mem = parser.parse("bytes").unwrap();
        assert_eq!(mem, Type::bytes(DataLocation::Memory));
        assert!(matches!(
            parser.parse("uint256 memory"),
            Err(ParseTypeError::LocationOnValueType(_))
        ));
    }

    #[test]
    fn mappings_and_functions() {
        let reg = TypeRegistry::new();
        let parser = TypeParser::new(&reg).with_default_location(DataLocation::Storage);
        let map = parser.parse("mapping(address => uint256[])").unwrap();
        assert_eq!(format!("{:#}", map), "mapping(address => uint256[] storage ref)");
        let f = parser
            .parse("function (uint256, bytes memory) external view returns (bool)")
            .unwrap();
        let f = f.as_function().cloned();
        assert_eq!(f.as_ref().map(|f| f.kind), Some(FunctionKind::External));
        assert_eq!(f.as_ref().map(|f| f.mutability), Some(StateMutability::View));
        assert_eq!(f.map(|f| f.returns.len()), Some(1));
    }

    #[test]
    fn user_types_and_lists() {
        let mut reg = TypeRegistry::new();
        let id = reg.declare_struct("S", Some("C")).unwrap();
        reg.define_struct(id, vec![("a".into(), Type::uint256())]).unwrap();
        let parser = TypeParser::new(&reg);
        let types = parser.parse_list("C.S memory, bool").unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(
            types.first().map(|t| t.identifier()),
            Some(format!("t_struct$_S_${}_memory_ptr", id))
        );
        assert!(matches!(parser.parse("T"), Err(ParseTypeError::UnknownType(_))));
        assert!(parser.parse_list("").unwrap().is_empty());
    }
}
