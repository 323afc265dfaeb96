//! Schema 描述解析器：声明式解析，绝不执行调用方文本
//!
//! 接受前端惯用的 `z.object({...})` 记法，但只作为数据语法解析（手写分词器 +
//! 递归下降），不触碰任何代码求值能力。支持的类型标签：string / number /
//! boolean / enum([...]) / array(...) / object({...})；链式修饰符：
//! .describe("...") / .optional() / .default(字面量)。
//! 顶层必须是 object（描述的是「对象形状」）。

use serde_json::{json, Map, Value};
use thiserror::Error;

/// 解析失败（上层统一降级为 schemaless，不向调用方传播）
#[derive(Error, Debug, PartialEq)]
pub enum SchemaParseError {
    #[error("Unexpected end of schema text")]
    UnexpectedEof,
    #[error("Unexpected token at offset {0}: {1}")]
    UnexpectedToken(usize, String),
    #[error("Unknown type tag: z.{0}")]
    UnknownType(String),
    #[error("Unknown modifier: .{0}")]
    UnknownModifier(String),
    #[error("Top-level schema must be z.object({{...}})")]
    TopLevelNotObject,
}

/// Schema 树节点（类型骨架）
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaNode {
    String,
    Number,
    Boolean,
    Enum(Vec<String>),
    Array(Box<Annotated>),
    Object(Vec<Field>),
}

/// 带修饰符的节点：描述、可选、默认值
#[derive(Clone, Debug, PartialEq)]
pub struct Annotated {
    pub node: SchemaNode,
    pub description: Option<String>,
    pub optional: bool,
    pub default: Option<Value>,
}

impl Annotated {
    fn new(node: SchemaNode) -> Self {
        Self {
            node,
            description: None,
            optional: false,
            default: None,
        }
    }

    /// 顶层对象的字段名列表（非对象时为空）
    pub fn top_level_field_names(&self) -> Vec<&str> {
        match &self.node {
            SchemaNode::Object(fields) => fields.iter().map(|f| f.name.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// 转为 JSON Schema（供结构化生成的 response_format 使用）
    pub fn to_json_schema(&self) -> Value {
        let mut schema = match &self.node {
            SchemaNode::String => json!({"type": "string"}),
            SchemaNode::Number => json!({"type": "number"}),
            SchemaNode::Boolean => json!({"type": "boolean"}),
            SchemaNode::Enum(variants) => json!({"type": "string", "enum": variants}),
            SchemaNode::Array(item) => json!({"type": "array", "items": item.to_json_schema()}),
            SchemaNode::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.ty.to_json_schema());
                    if !field.ty.optional && field.ty.default.is_none() {
                        required.push(Value::String(field.name.clone()));
                    }
                }
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false,
                })
            }
        };
        if let Some(ref desc) = self.description {
            schema["description"] = Value::String(desc.clone());
        }
        if let Some(ref default) = self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

/// 对象字段：名称 + 带修饰符的类型
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Annotated,
}

/// 解析 schema 描述文本；顶层必须为 object
pub fn parse_schema(text: &str) -> Result<Annotated, SchemaParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let root = parser.parse_type()?;
    parser.expect_eof()?;
    if !matches!(root.node, SchemaNode::Object(_)) {
        return Err(SchemaParseError::TopLevelNotObject);
    }
    Ok(root)
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, SchemaParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push((i, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Token::RParen));
                i += 1;
            }
            '{' => {
                tokens.push((i, Token::LBrace));
                i += 1;
            }
            '}' => {
                tokens.push((i, Token::RBrace));
                i += 1;
            }
            '[' => {
                tokens.push((i, Token::LBracket));
                i += 1;
            }
            ']' => {
                tokens.push((i, Token::RBracket));
                i += 1;
            }
            ',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            ':' => {
                tokens.push((i, Token::Colon));
                i += 1;
            }
            '.' => {
                tokens.push((i, Token::Dot));
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i;
                i += 1;
                let mut s = String::new();
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(SchemaParseError::UnexpectedEof);
                    };
                    if ch == '\\' {
                        let Some(&esc) = chars.get(i + 1) else {
                            return Err(SchemaParseError::UnexpectedEof);
                        };
                        s.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        i += 2;
                    } else if ch == quote {
                        i += 1;
                        break;
                    } else {
                        s.push(ch);
                        i += 1;
                    }
                }
                tokens.push((start, Token::Str(s)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                let mut s = String::new();
                s.push(c);
                i += 1;
                while let Some(&ch) = chars.get(i) {
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || ch == '+' || ch == '-' {
                        s.push(ch);
                        i += 1;
                    } else {
                        break;
                    }
                }
                let n: f64 = s
                    .parse()
                    .map_err(|_| SchemaParseError::UnexpectedToken(start, s.clone()))?;
                tokens.push((start, Token::Num(n)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut s = String::new();
                while let Some(&ch) = chars.get(i) {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        s.push(ch);
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push((
                    start,
                    match s.as_str() {
                        "true" => Token::True,
                        "false" => Token::False,
                        _ => Token::Ident(s),
                    },
                ));
            }
            other => {
                return Err(SchemaParseError::UnexpectedToken(i, other.to_string()));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<(usize, Token), SchemaParseError> {
        let t = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(SchemaParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, expected: Token) -> Result<(), SchemaParseError> {
        let (offset, t) = self.next()?;
        if t == expected {
            Ok(())
        } else {
            Err(SchemaParseError::UnexpectedToken(offset, format!("{:?}", t)))
        }
    }

    fn expect_ident(&mut self) -> Result<(usize, String), SchemaParseError> {
        let (offset, t) = self.next()?;
        match t {
            Token::Ident(s) => Ok((offset, s)),
            other => Err(SchemaParseError::UnexpectedToken(offset, format!("{:?}", other))),
        }
    }

    fn expect_str(&mut self) -> Result<String, SchemaParseError> {
        let (offset, t) = self.next()?;
        match t {
            Token::Str(s) => Ok(s),
            other => Err(SchemaParseError::UnexpectedToken(offset, format!("{:?}", other))),
        }
    }

    fn expect_eof(&self) -> Result<(), SchemaParseError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some((offset, t)) => Err(SchemaParseError::UnexpectedToken(
                *offset,
                format!("{:?}", t),
            )),
        }
    }

    /// type := 'z' '.' ctor 修饰符*
    fn parse_type(&mut self) -> Result<Annotated, SchemaParseError> {
        let (offset, head) = self.expect_ident()?;
        if head != "z" {
            return Err(SchemaParseError::UnexpectedToken(offset, head));
        }
        self.expect(Token::Dot)?;
        let (_, ctor) = self.expect_ident()?;

        let node = match ctor.as_str() {
            "string" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                SchemaNode::String
            }
            "number" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                SchemaNode::Number
            }
            "boolean" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                SchemaNode::Boolean
            }
            "enum" => {
                self.expect(Token::LParen)?;
                self.expect(Token::LBracket)?;
                let mut variants = Vec::new();
                loop {
                    if self.peek() == Some(&Token::RBracket) {
                        self.next()?;
                        break;
                    }
                    variants.push(self.expect_str()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.next()?;
                    }
                }
                self.expect(Token::RParen)?;
                SchemaNode::Enum(variants)
            }
            "array" => {
                self.expect(Token::LParen)?;
                let item = self.parse_type()?;
                self.expect(Token::RParen)?;
                SchemaNode::Array(Box::new(item))
            }
            "object" => {
                self.expect(Token::LParen)?;
                self.expect(Token::LBrace)?;
                let mut fields = Vec::new();
                loop {
                    if self.peek() == Some(&Token::RBrace) {
                        self.next()?;
                        break;
                    }
                    let name = match self.next()? {
                        (_, Token::Ident(s)) | (_, Token::Str(s)) => s,
                        (offset, other) => {
                            return Err(SchemaParseError::UnexpectedToken(
                                offset,
                                format!("{:?}", other),
                            ))
                        }
                    };
                    self.expect(Token::Colon)?;
                    let ty = self.parse_type()?;
                    fields.push(Field { name, ty });
                    if self.peek() == Some(&Token::Comma) {
                        self.next()?;
                    }
                }
                self.expect(Token::RParen)?;
                SchemaNode::Object(fields)
            }
            other => return Err(SchemaParseError::UnknownType(other.to_string())),
        };

        let mut annotated = Annotated::new(node);
        while self.peek() == Some(&Token::Dot) {
            self.next()?;
            let (_, modifier) = self.expect_ident()?;
            match modifier.as_str() {
                "describe" => {
                    self.expect(Token::LParen)?;
                    annotated.description = Some(self.expect_str()?);
                    self.expect(Token::RParen)?;
                }
                "optional" => {
                    self.expect(Token::LParen)?;
                    self.expect(Token::RParen)?;
                    annotated.optional = true;
                }
                "default" => {
                    self.expect(Token::LParen)?;
                    annotated.default = Some(self.parse_literal()?);
                    self.expect(Token::RParen)?;
                }
                other => return Err(SchemaParseError::UnknownModifier(other.to_string())),
            }
        }

        Ok(annotated)
    }

    /// default(...) 中的字面量：字符串 / 数字 / 布尔
    fn parse_literal(&mut self) -> Result<Value, SchemaParseError> {
        match self.next()? {
            (_, Token::Str(s)) => Ok(Value::String(s)),
            (offset, Token::Num(n)) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .ok_or(SchemaParseError::UnexpectedToken(offset, n.to_string())),
            (_, Token::True) => Ok(Value::Bool(true)),
            (_, Token::False) => Ok(Value::Bool(false)),
            (offset, other) => Err(SchemaParseError::UnexpectedToken(
                offset,
                format!("{:?}", other),
            )),
        }
    }
}
