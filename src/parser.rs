use crate::error::{DbError, Result};
use crate::table::Constraints;
use crate::tokenizer::{Token, TokenKind};
use crate::{ColumnDef, DataType, Value, ast::*, data_type::DEFAULT_VARCHAR_LENGTH};

/// Recursive-descent parser: one parse function per command keyword, one token
/// of lookahead, no error recovery.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let position = tokens.last().map_or(0, |t| t.position + t.text.chars().count());
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                position,
            });
        }
        Self {
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            TokenKind::Create => self.parse_create_table(),
            TokenKind::Drop => self.parse_drop_table(),
            TokenKind::Insert => self.parse_insert(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Update => self.parse_update(),
            TokenKind::Delete => self.parse_delete(),
            _ => Err(self.error("CREATE, DROP, INSERT, SELECT, UPDATE or DELETE")),
        }?;

        // Check we are at the end of the statement
        if !self.is_at_end() {
            return Err(self.error("end of input"));
        }

        Ok(statement)
    }

    //helpers
    fn current_token(&self) -> &TokenKind {
        &self.tokens[self.position].kind
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), TokenKind::Eof)
    }

    fn error(&self, expected: impl Into<String>) -> DbError {
        let token = &self.tokens[self.position];
        DbError::parse(expected, token.kind.to_string(), token.position)
    }

    /// Consumes `expected` if it is the current token.
    fn eat(&mut self, expected: &TokenKind) -> bool {
        if self.current_token() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, expected: TokenKind) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(expected.to_string()))
        }
    }

    fn consume_ident(&mut self) -> Result<String> {
        match self.current_token() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("identifier")),
        }
    }

    fn consume_number(&mut self) -> Result<i64> {
        match self.current_token() {
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(n)
            }
            _ => Err(self.error("integer")),
        }
    }

    /// Parses a comma-separated list of `item` inside parentheses.
    fn parse_parenthesized<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.consume(TokenKind::LeftParen)?;
        let mut items = vec![item(self)?];
        loop {
            match self.current_token() {
                TokenKind::RightParen => {
                    self.advance();
                    return Ok(items);
                }
                TokenKind::Comma => {
                    self.advance();
                    items.push(item(self)?);
                }
                _ => return Err(self.error("',' or ')'")),
            }
        }
    }

    fn parse_literal(&mut self) -> Result<Value> {
        let value = match self.current_token() {
            TokenKind::Number(n) => Value::Int(*n),
            TokenKind::String(s) => Value::Text(s.as_str().into()),
            TokenKind::True => Value::Bool(true),
            TokenKind::False => Value::Bool(false),
            TokenKind::Null => Value::Null,
            _ => return Err(self.error("literal")),
        };
        self.advance();
        Ok(value)
    }

    /// `name` or `table.name`
    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.consume_ident()?;
        if self.eat(&TokenKind::Dot) {
            let column = self.consume_ident()?;
            return Ok(ColumnRef::qualified(first, column));
        }
        Ok(ColumnRef::new(first))
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.eat(&TokenKind::As) {
            return self.consume_ident().map(Some);
        }
        Ok(None)
    }

    fn consume_data_type(&mut self) -> Result<DataType> {
        match self.current_token() {
            TokenKind::Int => {
                self.advance();
                Ok(DataType::Int)
            }
            TokenKind::Boolean => {
                self.advance();
                Ok(DataType::Boolean)
            }
            TokenKind::Varchar => {
                self.advance();
                if !self.eat(&TokenKind::LeftParen) {
                    return Ok(DataType::Varchar(DEFAULT_VARCHAR_LENGTH));
                }
                let length = match self.current_token() {
                    TokenKind::Number(n) if *n > 0 => *n as usize,
                    _ => return Err(self.error("positive VARCHAR length")),
                };
                self.advance();
                self.consume(TokenKind::RightParen)?;
                Ok(DataType::Varchar(length))
            }
            _ => Err(self.error("column type (INT, VARCHAR or BOOLEAN)")),
        }
    }

    fn parse_constraints(&mut self) -> Result<Constraints> {
        let mut constraints = Constraints::default();
        loop {
            match self.current_token() {
                TokenKind::Primary => {
                    self.advance();
                    self.consume(TokenKind::Key)?;
                    constraints.primary_key = true;
                }
                TokenKind::Unique => {
                    self.advance();
                    constraints.unique = true;
                }
                TokenKind::Not => {
                    self.advance();
                    self.consume(TokenKind::Null)?;
                    constraints.not_null = true;
                }
                _ => return Ok(constraints),
            }
        }
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.consume_ident()?;
        let data_type = self.consume_data_type()?;
        let constraints = self.parse_constraints()?;

        Ok(ColumnDef {
            name,
            data_type,
            constraints,
        })
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Create)?; // advance if CREATE
        self.consume(TokenKind::Table)?; // advance if TABLE
        let if_not_exists = if self.eat(&TokenKind::If) {
            self.consume(TokenKind::Not)?;
            self.consume(TokenKind::Exists)?;
            true
        } else {
            false
        };
        let name = self.consume_ident()?;
        let columns = self.parse_parenthesized(Self::parse_column_def)?;
        Ok(Statement::CreateTable(CreateTable {
            name,
            columns,
            if_not_exists,
        }))
    }

    fn parse_drop_table(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Drop)?;
        self.consume(TokenKind::Table)?;
        let name = self.consume_ident()?;
        Ok(Statement::DropTable(DropTable { name }))
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Insert)?;
        self.consume(TokenKind::Into)?;
        let table = self.consume_ident()?;

        let columns = if matches!(self.current_token(), TokenKind::LeftParen) {
            Some(self.parse_parenthesized(Self::consume_ident)?)
        } else {
            None
        };

        self.consume(TokenKind::Values)?;
        let values = self.parse_parenthesized(Self::parse_literal)?;

        Ok(Statement::InsertInto(InsertInto {
            table,
            columns,
            values,
        }))
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        match self.current_token() {
            TokenKind::Star => {
                self.advance();
                Ok(SelectItem::Star)
            }
            TokenKind::Count => {
                self.advance();
                self.consume(TokenKind::LeftParen)?;
                self.consume(TokenKind::Star)?;
                self.consume(TokenKind::RightParen)?;
                let alias = self.parse_alias()?;
                Ok(SelectItem::CountStar { alias })
            }
            TokenKind::Ident(_) => {
                let column = self.parse_column_ref()?;
                let alias = self.parse_alias()?;
                Ok(SelectItem::Column { column, alias })
            }
            _ => Err(self.error("'*', COUNT(*) or column name")),
        }
    }

    fn parse_join(&mut self) -> Result<Option<Join>> {
        match self.current_token() {
            TokenKind::Inner => {
                self.advance();
                self.consume(TokenKind::Join)?;
            }
            TokenKind::Join => self.advance(),
            _ => return Ok(None),
        }
        let table = self.consume_ident()?;
        self.consume(TokenKind::On)?;
        let left = self.parse_column_ref()?;
        self.consume(TokenKind::Equal)?;
        let right = self.parse_column_ref()?;
        Ok(Some(Join { table, left, right }))
    }

    fn parse_comparison_op(&mut self) -> Result<ComparisonOp> {
        let op = match self.current_token() {
            TokenKind::Equal => ComparisonOp::Eq,
            TokenKind::NotEqual => ComparisonOp::NotEq,
            TokenKind::Less => ComparisonOp::Lt,
            TokenKind::LessEqual => ComparisonOp::LtEq,
            TokenKind::Greater => ComparisonOp::Gt,
            TokenKind::GreaterEqual => ComparisonOp::GtEq,
            _ => return Err(self.error("comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let column = self.parse_column_ref()?;
        let op = self.parse_comparison_op()?;
        let value = self.parse_literal()?;
        Ok(Expr::Comparison { column, op, value })
    }

    /// `WHERE` followed by comparisons chained with `AND`.
    fn parse_where(&mut self) -> Result<Option<Expr>> {
        if !self.eat(&TokenKind::Where) {
            return Ok(None);
        }
        let mut expr = self.parse_comparison()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_comparison()?;
            expr = Expr::And {
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(Some(expr))
    }

    fn parse_order_by(&mut self) -> Result<Option<OrderByClause>> {
        if !self.eat(&TokenKind::Order) {
            return Ok(None);
        }
        self.consume(TokenKind::By)?;
        let column = self.parse_column_ref()?;
        let direction = if self.eat(&TokenKind::Desc) {
            SortDirection::Desc
        } else {
            self.eat(&TokenKind::Asc);
            SortDirection::Asc
        };
        Ok(Some(OrderByClause { column, direction }))
    }

    fn parse_limit(&mut self) -> Result<Option<usize>> {
        if !self.eat(&TokenKind::Limit) {
            return Ok(None);
        }
        let position = self.position;
        let n = self.consume_number()?;
        usize::try_from(n).map(Some).map_err(|_| {
            let token = &self.tokens[position];
            DbError::parse("non-negative integer", token.kind.to_string(), token.position)
        })
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Select)?;
        let mut items = vec![self.parse_select_item()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_select_item()?);
        }

        self.consume(TokenKind::From)?;
        let table = self.consume_ident()?;
        let join = self.parse_join()?;
        let where_clause = self.parse_where()?;
        let order_by = self.parse_order_by()?;
        let limit = self.parse_limit()?;

        Ok(Statement::Select(Select {
            items,
            table,
            join,
            where_clause,
            order_by,
            limit,
        }))
    }

    fn parse_assignment(&mut self) -> Result<(String, Value)> {
        let column = self.consume_ident()?;
        self.consume(TokenKind::Equal)?;
        let value = self.parse_literal()?;
        Ok((column, value))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Update)?;
        let table = self.consume_ident()?;
        self.consume(TokenKind::Set)?;
        let mut assignments = vec![self.parse_assignment()?];
        while self.eat(&TokenKind::Comma) {
            assignments.push(self.parse_assignment()?);
        }
        let where_clause = self.parse_where()?;
        Ok(Statement::Update(Update {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Delete)?;
        self.consume(TokenKind::From)?;
        let table = self.consume_ident()?;
        let where_clause = self.parse_where()?;
        Ok(Statement::Delete(Delete {
            table,
            where_clause,
        }))
    }
}
