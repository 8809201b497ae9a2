//! Recursive descent parser for command text.

use ringorm_proto::{Direction, Operator, Value};

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::Span;

/// Parser over a tokenized command.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
    placeholders: usize,
}

impl<'source> Parser<'source> {
    /// Tokenize `source` and prepare to parse it.
    pub fn new(source: &'source str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            source,
            placeholders: 0,
        })
    }

    /// Parse one complete command.
    pub fn parse_command(&mut self) -> Result<Command, ParseError> {
        let first = self.next_token()?;
        let statement = match first.token {
            Token::Select => Statement::Select(self.parse_select()?),
            Token::Insert => Statement::Insert(self.parse_insert()?),
            Token::Update => Statement::Update(self.parse_update()?),
            Token::Delete => Statement::Delete(self.parse_delete()?),
            other => {
                return Err(ParseError::new(
                    format!("expected SELECT, INSERT, UPDATE or DELETE, found {:?}", other),
                    first.span,
                ))
            }
        };

        self.eat(&Token::Semicolon);
        if let Some(tok) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected trailing {:?}", tok.token),
                tok.span,
            ));
        }

        Ok(Command {
            statement,
            placeholders: self.placeholders,
        })
    }

    fn parse_select(&mut self) -> Result<Select, ParseError> {
        let projection = self.parse_projection()?;
        self.expect_token(Token::From)?;
        let table = self.parse_table_name()?;

        let filter = if self.eat(&Token::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat(&Token::Group) {
            self.expect_token(Token::By)?;
            group_by = self.parse_column_list()?;
        }

        let mut order_by = Vec::new();
        if self.eat(&Token::Order) {
            self.expect_token(Token::By)?;
            loop {
                let column = self.parse_column_ref()?;
                let direction = if self.eat(&Token::Desc) {
                    Direction::Desc
                } else {
                    self.eat(&Token::Asc);
                    Direction::Asc
                };
                order_by.push((column, direction));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat(&Token::Limit) {
            Some(self.expect_count()?)
        } else {
            None
        };
        let offset = if self.eat(&Token::Offset) {
            Some(self.expect_count()?)
        } else {
            None
        };

        let allow_filtering = if self.eat(&Token::Allow) {
            self.expect_token(Token::Filtering)?;
            true
        } else {
            false
        };

        Ok(Select {
            table,
            projection,
            filter,
            group_by,
            order_by,
            limit,
            offset,
            allow_filtering,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection, ParseError> {
        if self.eat(&Token::Star) {
            return Ok(Projection::All);
        }
        if self.check(&Token::Count) && self.check_at(1, &Token::LParen) {
            self.next_token()?;
            self.expect_token(Token::LParen)?;
            self.expect_token(Token::Star)?;
            self.expect_token(Token::RParen)?;
            return Ok(Projection::Count);
        }

        let mut columns = Vec::new();
        let mut all = false;
        loop {
            let name = self.parse_column_ref()?;
            if name == "*" {
                all = true;
            } else {
                let alias = if self.eat(&Token::As) {
                    Some(self.expect_name()?.0)
                } else {
                    None
                };
                columns.push(ProjectedColumn { name, alias });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        if all {
            Ok(Projection::All)
        } else {
            Ok(Projection::Columns(columns))
        }
    }

    fn parse_insert(&mut self) -> Result<Insert, ParseError> {
        self.expect_token(Token::Into)?;
        let table = self.parse_table_name()?;

        self.expect_token(Token::LParen)?;
        let columns = self.parse_column_list()?;
        self.expect_token(Token::RParen)?;

        self.expect_token(Token::Values)?;
        self.expect_token(Token::LParen)?;
        let values = self.parse_operand_list()?;
        let close = self.expect_token(Token::RParen)?;

        if columns.len() != values.len() {
            return Err(ParseError::new(
                format!(
                    "{} columns but {} values in INSERT",
                    columns.len(),
                    values.len()
                ),
                close.span,
            ));
        }

        let mut if_not_exists = false;
        if self.eat(&Token::If) {
            self.expect_token(Token::Not)?;
            self.expect_token(Token::Exists)?;
            if_not_exists = true;
        } else if self.eat(&Token::On) {
            self.expect_token(Token::Conflict)?;
            self.expect_token(Token::Do)?;
            self.expect_token(Token::Nothing)?;
            if_not_exists = true;
        }

        let ttl = self.parse_ttl()?;

        Ok(Insert {
            table,
            columns,
            values,
            if_not_exists,
            ttl,
        })
    }

    fn parse_update(&mut self) -> Result<Update, ParseError> {
        let table = self.parse_table_name()?;
        let ttl = self.parse_ttl()?;
        self.expect_token(Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_column_ref()?;
            self.expect_token(Token::Eq)?;
            let operand = self.parse_operand()?;
            assignments.push((column, operand));
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let filter = if self.eat(&Token::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };
        let conditions = if self.eat(&Token::If) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(Update {
            table,
            ttl,
            assignments,
            filter,
            conditions,
        })
    }

    fn parse_delete(&mut self) -> Result<Delete, ParseError> {
        let columns = if self.check(&Token::From) {
            Vec::new()
        } else {
            self.parse_column_list()?
        };
        self.expect_token(Token::From)?;
        let table = self.parse_table_name()?;

        let filter = if self.eat(&Token::Where) {
            Some(self.parse_condition()?)
        } else {
            None
        };
        let conditions = if self.eat(&Token::If) {
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(Delete {
            table,
            columns,
            filter,
            conditions,
        })
    }

    fn parse_ttl(&mut self) -> Result<Option<u64>, ParseError> {
        if self.eat(&Token::Using) {
            self.expect_token(Token::Ttl)?;
            Ok(Some(self.expect_count()?))
        } else {
            Ok(None)
        }
    }

    /// Parse a boolean condition; AND binds tighter than OR.
    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        let mut terms = vec![self.parse_and_condition()?];
        while self.eat(&Token::Or) {
            terms.push(self.parse_and_condition()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::Or(terms)
        })
    }

    fn parse_and_condition(&mut self) -> Result<Condition, ParseError> {
        let mut terms = vec![self.parse_primary_condition()?];
        while self.eat(&Token::And) {
            terms.push(self.parse_primary_condition()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::And(terms)
        })
    }

    fn parse_primary_condition(&mut self) -> Result<Condition, ParseError> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_condition()?;
            self.expect_token(Token::RParen)?;
            return Ok(inner);
        }

        if self.eat(&Token::TokenFn) {
            self.expect_token(Token::LParen)?;
            let columns = self.parse_column_list()?;
            self.expect_token(Token::RParen)?;
            let operator = self.parse_comparison()?;
            self.expect_token(Token::TokenFn)?;
            self.expect_token(Token::LParen)?;
            let operands = self.parse_operand_list()?;
            self.expect_token(Token::RParen)?;
            return Ok(Condition::Token {
                columns,
                operator,
                operands,
            });
        }

        let column = self.parse_column_ref()?;
        let tok = self.next_token()?;
        match tok.token {
            Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge => {
                let operator = comparison_operator(&tok.token).ok_or_else(|| {
                    ParseError::new("expected comparison operator", tok.span)
                })?;
                Ok(Condition::Compare {
                    column,
                    operator,
                    operand: self.parse_operand()?,
                })
            }
            Token::Like => Ok(Condition::Compare {
                column,
                operator: Operator::Like,
                operand: self.parse_operand()?,
            }),
            Token::Contains => {
                let operator = if self.eat(&Token::Key) {
                    Operator::ContainsKey
                } else {
                    Operator::Contains
                };
                Ok(Condition::Compare {
                    column,
                    operator,
                    operand: self.parse_operand()?,
                })
            }
            Token::In => self.parse_in_list(column, false),
            Token::Not => {
                self.expect_token(Token::In)?;
                self.parse_in_list(column, true)
            }
            Token::Is => {
                let negated = self.eat(&Token::Not);
                self.expect_token(Token::Null)?;
                Ok(Condition::IsNull { column, negated })
            }
            other => Err(ParseError::new(
                format!("expected predicate operator, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn parse_in_list(&mut self, column: String, negated: bool) -> Result<Condition, ParseError> {
        self.expect_token(Token::LParen)?;
        let operands = if self.check(&Token::RParen) {
            Vec::new()
        } else {
            self.parse_operand_list()?
        };
        self.expect_token(Token::RParen)?;
        Ok(Condition::In {
            column,
            negated,
            operands,
        })
    }

    fn parse_comparison(&mut self) -> Result<Operator, ParseError> {
        let tok = self.next_token()?;
        comparison_operator(&tok.token).ok_or_else(|| {
            ParseError::new(
                format!("expected comparison operator, found {:?}", tok.token),
                tok.span,
            )
        })
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ParseError> {
        let mut operands = vec![self.parse_operand()?];
        while self.eat(&Token::Comma) {
            operands.push(self.parse_operand()?);
        }
        Ok(operands)
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        let tok = self.next_token()?;
        let value = match tok.token {
            Token::Param => {
                let index = self.placeholders;
                self.placeholders += 1;
                return Ok(Operand::Param(index));
            }
            Token::Int(n) => Value::Int(n),
            Token::Float(f) => Value::Float(f),
            Token::String(s) => Value::Text(s),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
            other => {
                return Err(ParseError::new(
                    format!("expected value or '?', found {:?}", other),
                    tok.span,
                ))
            }
        };
        Ok(Operand::Literal(value))
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut columns = vec![self.parse_column_ref()?];
        while self.eat(&Token::Comma) {
            columns.push(self.parse_column_ref()?);
        }
        Ok(columns)
    }

    /// Parse `name`, `qualifier.name` or `qualifier.*`, keeping the last segment.
    fn parse_column_ref(&mut self) -> Result<String, ParseError> {
        if self.eat(&Token::Star) {
            return Ok("*".to_string());
        }
        let (mut name, _) = self.expect_name()?;
        while self.eat(&Token::Dot) {
            if self.eat(&Token::Star) {
                return Ok("*".to_string());
            }
            name = self.expect_name()?.0;
        }
        Ok(name)
    }

    /// Table names drop any keyspace qualifier.
    fn parse_table_name(&mut self) -> Result<String, ParseError> {
        let (mut name, _) = self.expect_name()?;
        while self.eat(&Token::Dot) {
            name = self.expect_name()?.0;
        }
        Ok(name)
    }

    fn expect_name(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Ident(name) => Ok((name.to_ascii_lowercase(), tok.span)),
            Token::QuotedIdent(name) => Ok((name, tok.span)),
            ref other => match other.soft_keyword() {
                Some(name) => Ok((name.to_string(), tok.span)),
                None => Err(ParseError::new(
                    format!("expected identifier, found {:?}", other),
                    tok.span,
                )),
            },
        }
    }

    fn expect_count(&mut self) -> Result<u64, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Int(n) if n >= 0 => Ok(n as u64),
            other => Err(ParseError::new(
                format!("expected non-negative integer, found {:?}", other),
                tok.span,
            )),
        }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn check(&self, expected: &Token) -> bool {
        self.check_at(0, expected)
    }

    fn check_at(&self, ahead: usize, expected: &Token) -> bool {
        self.tokens
            .get(self.pos + ahead)
            .is_some_and(|t| std::mem::discriminant(&t.token) == std::mem::discriminant(expected))
    }

    /// Consume the next token if it matches.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.span,
            ))
        }
    }

    /// Get the next token or error if EOF.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or_else(|| {
            ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )
        })?;
        self.pos += 1;
        Ok(tok)
    }
}

fn comparison_operator(token: &Token) -> Option<Operator> {
    let op = match token {
        Token::Eq => Operator::Eq,
        Token::Ne => Operator::Ne,
        Token::Lt => Operator::Lt,
        Token::Le => Operator::Le,
        Token::Gt => Operator::Gt,
        Token::Ge => Operator::Ge,
        _ => return None,
    };
    Some(op)
}

/// Parse command text.
pub fn parse(source: &str) -> Result<Command, ParseError> {
    Parser::new(source)?.parse_command()
}
