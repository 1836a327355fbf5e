use futures::future::BoxFuture;
use serde::Deserialize;

use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::traits::NativeTool;
use spotlight_core::types::{ToolContext, ToolOutcome};

// ── CalculatorTool ──────────────────────────────────────────────

pub struct CalculatorTool;

#[derive(Deserialize)]
struct CalculatorInput {
    expression: String,
}

impl NativeTool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }
    fn timeout_secs(&self) -> u64 {
        5
    }
    fn description(&self) -> &str {
        "Evaluate an arithmetic expression with + - * / % ^ and parentheses."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": { "type": "string", "description": "Expression, e.g. (1 + 2) * 3" }
            },
            "required": ["expression"]
        })
    }
    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolOutcome>> {
        Box::pin(async move {
            let p: CalculatorInput = serde_json::from_value(input)
                .map_err(|e| SpotlightError::ToolValidation(e.to_string()))?;
            let value = evaluate(&p.expression).map_err(SpotlightError::ToolValidation)?;
            let result = serde_json::json!({
                "expression": p.expression,
                "result": number_to_json(value),
            });
            Ok(ToolOutcome::success(result.to_string()))
        })
    }
}

fn number_to_json(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Value::from(value)
    }
}

/// Evaluate an arithmetic expression.
///
/// Grammar, lowest precedence first:
/// `expr := term (('+'|'-') term)*`,
/// `term := power (('*'|'/'|'%') power)*`,
/// `power := unary ('^' power)?`,
/// `unary := ('+'|'-') unary | atom`,
/// `atom := number | '(' expr ')'`.
pub fn evaluate(expression: &str) -> std::result::Result<f64, String> {
    let mut parser = Parser {
        chars: expression.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    if parser.chars.is_empty() {
        return Err("empty expression".into());
    }
    let value = parser.expr(0)?;
    if parser.pos != parser.chars.len() {
        return Err(format!(
            "unexpected '{}' at position {}",
            parser.chars[parser.pos], parser.pos
        ));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".into());
    }
    Ok(value)
}

const MAX_DEPTH: usize = 64;

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expr(&mut self, depth: usize) -> std::result::Result<f64, String> {
        let mut value = self.term(depth)?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term(depth)?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self, depth: usize) -> std::result::Result<f64, String> {
        let mut value = self.power(depth)?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.power(depth)?;
            if op != '*' && rhs == 0.0 {
                return Err("division by zero".into());
            }
            value = match op {
                '*' => value * rhs,
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn power(&mut self, depth: usize) -> std::result::Result<f64, String> {
        let base = self.unary(depth)?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exp = self.power(depth + 1)?;
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn unary(&mut self, depth: usize) -> std::result::Result<f64, String> {
        if depth > MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.unary(depth + 1)?)
            }
            Some('+') => {
                self.pos += 1;
                self.unary(depth + 1)
            }
            _ => self.atom(depth),
        }
    }

    fn atom(&mut self, depth: usize) -> std::result::Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.expr(depth + 1)?;
                if self.peek() != Some(')') {
                    return Err("missing closing parenthesis".into());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().collect();
                literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))
            }
            Some(c) => Err(format!("unexpected '{}' at position {}", c, self.pos)),
            None => Err("unexpected end of expression".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(evaluate("1+1").unwrap(), 2.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), 4.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("7 % 4").unwrap(), 3.0);
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 + abc").is_err());
        assert!(evaluate("1..2").is_err());
        assert!(evaluate(&"(".repeat(200)).is_err());
    }

    #[tokio::test]
    async fn test_calculator_tool_output() {
        let out = CalculatorTool
            .execute(
                serde_json::json!({"expression": "1+1"}),
                ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutcome::success(r#"{"expression":"1+1","result":2}"#)
        );
    }

    #[tokio::test]
    async fn test_calculator_rejects_missing_expression() {
        let err = CalculatorTool
            .execute(serde_json::json!({}), ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SpotlightError::ToolValidation(_)));
    }
}
