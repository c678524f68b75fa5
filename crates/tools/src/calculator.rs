//! Calculator tool: one arithmetic operation on two numbers.

use async_trait::async_trait;
use serde_json::{Value, json};
use toolchat_core::error::ToolError;
use toolchat_core::tool::Tool;

pub struct CalculatorTool;

/// The four supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operation {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "mul" => Some(Self::Mul),
            "div" => Some(Self::Div),
            _ => None,
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64, &'static str> {
        match self {
            Self::Add => Ok(a + b),
            Self::Sub => Ok(a - b),
            Self::Mul => Ok(a * b),
            Self::Div if b == 0.0 => Err("Division by zero is not allowed"),
            Self::Div => Ok(a / b),
        }
    }
}

/// Models sometimes send numbers as strings.
fn number_arg(arguments: &Value, key: &str) -> Result<f64, ToolError> {
    let value = match &arguments[key] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite());
    value.ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be a number")))
}

/// Integral results render as integers (`42`, not `42.0`).
fn to_json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform a basic arithmetic operation on two numbers. Supported operations: add, sub, mul, div."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "first_num": { "type": "number", "description": "The first operand" },
                "second_num": { "type": "number", "description": "The second operand" },
                "operation": {
                    "type": "string",
                    "enum": ["add", "sub", "mul", "div"],
                    "description": "The operation to apply"
                }
            },
            "required": ["first_num", "second_num", "operation"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let first = number_arg(&arguments, "first_num")?;
        let second = number_arg(&arguments, "second_num")?;
        let raw_op = arguments["operation"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation' argument".into()))?;

        let op = Operation::parse(raw_op).ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: format!("Unsupported operation '{raw_op}'"),
        })?;

        let result = op.apply(first, second).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: reason.into(),
        })?;
        if !result.is_finite() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: "result is not a finite number".into(),
            });
        }

        Ok(json!({ "result": to_json_number(result) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(args: Value) -> Result<Value, ToolError> {
        CalculatorTool.execute(args).await
    }

    #[tokio::test]
    async fn multiply() {
        let out = run(json!({"first_num": 6, "second_num": 7, "operation": "mul"})).await.unwrap();
        assert_eq!(out, json!({"result": 42}));
    }

    #[tokio::test]
    async fn fractional_result() {
        let out = run(json!({"first_num": 1, "second_num": 4, "operation": "div"})).await.unwrap();
        assert_eq!(out, json!({"result": 0.25}));
    }

    #[tokio::test]
    async fn add_and_sub() {
        let sum = run(json!({"first_num": 2.5, "second_num": 0.5, "operation": "add"})).await.unwrap();
        assert_eq!(sum, json!({"result": 3}));
        let diff = run(json!({"first_num": 3, "second_num": 10, "operation": "sub"})).await.unwrap();
        assert_eq!(diff, json!({"result": -7}));
    }

    #[tokio::test]
    async fn numeric_strings_accepted() {
        let out = run(json!({"first_num": "6", "second_num": " 7 ", "operation": "MUL"})).await.unwrap();
        assert_eq!(out, json!({"result": 42}));
    }

    #[tokio::test]
    async fn division_by_zero_is_an_error_not_a_panic() {
        let err = run(json!({"first_num": 10, "second_num": 0, "operation": "div"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Division by zero is not allowed"));
    }

    #[tokio::test]
    async fn unsupported_operation_is_named() {
        let err = run(json!({"first_num": 2, "second_num": 3, "operation": "pow"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported operation 'pow'"));
    }

    #[tokio::test]
    async fn overflow_is_an_error_not_null() {
        let err = run(json!({"first_num": 1e308, "second_num": 10, "operation": "mul"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("result is not a finite number"));

        let err = run(json!({"first_num": -1e308, "second_num": -1e308, "operation": "add"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn non_finite_string_operands_rejected() {
        let err = run(json!({"first_num": "inf", "second_num": 1, "operation": "add"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn missing_operand() {
        let err = run(json!({"second_num": 3, "operation": "add"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn tool_definition() {
        let def = CalculatorTool.to_definition();
        assert_eq!(def.name, "calculator");
        assert_eq!(def.parameters["required"].as_array().unwrap().len(), 3);
    }
}
