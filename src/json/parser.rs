use super::{JsonError, Map, Value};

/// Deepest array/object nesting the parser accepts.
pub const MAX_DEPTH: usize = 128;

/// Parses one JSON document. Trailing non-whitespace is an error.
pub fn parse(input: &str) -> Result<Value, JsonError> {
    let mut parser = Parser {
        src: input,
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(parser.error("Extra data after value"));
    }
    Ok(value)
}

/// Parses a JSON document from raw bytes, such as a request body.
pub fn parse_slice(input: &[u8]) -> Result<Value, JsonError> {
    match std::str::from_utf8(input) {
        Ok(text) => parse(text),
        Err(err) => Err(JsonError {
            position: err.valid_up_to(),
            reason: "Invalid UTF-8",
        }),
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &'static str) -> JsonError {
        JsonError {
            position: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Value, JsonError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("Unexpected end of input")),
            Some(b'{') => self.nested(Self::parse_object),
            Some(b'[') => self.nested(Self::parse_array),
            Some(b'"') => self.parse_string().map(Value::String),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => Err(self.error("Unexpected character")),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, JsonError>,
    ) -> Result<Value, JsonError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("Maximum nesting depth exceeded"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_literal(&mut self, literal: &'static str, value: Value) -> Result<Value, JsonError> {
        let end = self.pos + literal.len();
        if end > self.bytes.len() {
            return Err(self.error("Unexpected end while parsing literal"));
        }
        if &self.bytes[self.pos..end] != literal.as_bytes() {
            return Err(self.error("Invalid literal"));
        }
        self.pos = end;
        Ok(value)
    }

    fn parse_string(&mut self) -> Result<String, JsonError> {
        if self.peek() != Some(b'"') {
            return Err(self.error("Expected '\"' at start of string"));
        }
        self.pos += 1;

        let mut out = String::with_capacity(64);
        let mut run_start = self.pos;
        while let Some(byte) = self.peek() {
            match byte {
                b'"' => {
                    out.push_str(&self.src[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.src[run_start..self.pos]);
                    self.pos += 1;
                    let escaped = match self.peek() {
                        None => return Err(self.error("Unexpected end in escape sequence")),
                        Some(b'"') => '"',
                        Some(b'\\') => '\\',
                        Some(b'/') => '/',
                        Some(b'b') => '\u{8}',
                        Some(b'f') => '\u{c}',
                        Some(b'n') => '\n',
                        Some(b'r') => '\r',
                        Some(b't') => '\t',
                        Some(b'u') => return Err(self.error("Unicode escapes are not supported")),
                        Some(_) => return Err(self.error("Invalid escape sequence")),
                    };
                    out.push(escaped);
                    self.pos += 1;
                    run_start = self.pos;
                }
                0x00..=0x1f => return Err(self.error("Unescaped control character in string")),
                _ => self.pos += 1,
            }
        }
        Err(self.error("Unterminated string"))
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
        self.pos - start
    }

    fn parse_number(&mut self) -> Result<Value, JsonError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                self.eat_digits();
            }
            _ => return Err(self.error("Invalid number")),
        }

        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.eat_digits() == 0 {
                return Err(self.error("Invalid number: expected digit after '.'"));
            }
        }

        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if self.eat_digits() == 0 {
                return Err(self.error("Invalid number: expected digit in exponent"));
            }
        }

        match self.src[start..self.pos].parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Value::Number(n)),
            _ => Err(self.error("Number out of range")),
        }
    }

    fn parse_array(&mut self) -> Result<Value, JsonError> {
        self.pos += 1;
        let mut items = Vec::with_capacity(16);

        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("Unexpected end in array")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(b',') => self.pos += 1,
                Some(_) => return Err(self.error("Expected ',' or ']' in array")),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Value, JsonError> {
        self.pos += 1;
        let mut map = Map::new();

        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }

        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.error("Expected string key in object"));
            }
            let key = self.parse_string()?;

            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(self.error("Expected ':' after key in object"));
            }
            self.pos += 1;

            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("Unexpected end in object")),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(b',') => self.pos += 1,
                Some(_) => return Err(self.error("Expected ',' or '}' in object")),
            }
        }
    }
}
